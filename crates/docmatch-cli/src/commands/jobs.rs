//! `status` and `jobs`. Read-only; no AI configuration needed.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use docmatch::{JobLifecycle, JobStatus};

use super::{open_database, print_json, resolve_config};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Args)]
pub struct StatusArgs {
    job_id: String,

    /// Keep polling until the job leaves `processing`
    #[arg(short, long)]
    follow: bool,
}

fn lifecycle(config_path: Option<&str>) -> anyhow::Result<JobLifecycle> {
    let config = resolve_config(config_path)?;
    let db = open_database(&config)?;
    Ok(JobLifecycle::new(Arc::new(db)))
}

pub async fn run_status(args: StatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let jobs = lifecycle(config_path)?;
    let mut job = jobs.get_by_id(&args.job_id)?;

    while args.follow && matches!(job.status, JobStatus::Pending | JobStatus::Processing) {
        eprintln!("{} is {}, checking again in {}s", job.id, job.status, POLL_INTERVAL.as_secs());
        tokio::time::sleep(POLL_INTERVAL).await;
        job = jobs.get_by_id(&args.job_id)?;
    }

    print_json(&job)
}

pub fn run_list(config_path: Option<&str>) -> anyhow::Result<()> {
    let jobs = lifecycle(config_path)?.get_all()?;
    if jobs.is_empty() {
        eprintln!("No jobs yet");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}  {:<10}  {}  {}{}",
            job.id,
            job.status.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.file_name,
            job.template_id
                .map(|t| format!("  [template {t}]"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
