//! `process` and `reprocess`.

use std::path::PathBuf;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use docmatch::{JobStatus, ProcessingJob, Upload};

use super::{build_pipeline, print_json};

#[derive(Args)]
pub struct ProcessArgs {
    /// Document to process (PDF or XLSX)
    #[arg(required = true)]
    input: PathBuf,

    /// Media type; guessed from the extension when omitted
    #[arg(long)]
    media_type: Option<String>,

    /// Template to match the extracted text against
    #[arg(short, long)]
    template: Option<String>,

    /// Print the job as soon as it is created instead of waiting for the result
    #[arg(long)]
    detach: bool,
}

#[derive(Args)]
pub struct ReprocessArgs {
    /// Completed job whose extracted text is reused
    job_id: String,

    /// Template to match against
    #[arg(short, long, required = true)]
    template: String,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path)?;
    let upload = Upload::from_path(&args.input, args.media_type.as_deref())?;
    tracing::info!(
        media_type = %upload.media_type,
        bytes = upload.bytes.len(),
        "Processing {}",
        upload.file_name
    );

    if args.detach {
        let mut events = pipeline.jobs().events().subscribe();
        let job = pipeline.submit(upload, args.template.as_deref())?;
        print_json(&job)?;
        // The run lives on this runtime; keep it alive until the job settles.
        loop {
            match events.recv().await {
                Ok(event) if event.job_id == job.id && event.status.is_terminal() => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
        return Ok(());
    }

    let job = match args.template.as_deref() {
        Some(template_id) => pipeline.process_with_template(upload, template_id).await?,
        None => pipeline.process(upload).await?,
    };
    finish(job)
}

pub async fn run_reprocess(args: ReprocessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path)?;
    let job = pipeline
        .reprocess_with_template(&args.job_id, &args.template)
        .await?;
    finish(job)
}

/// Prints the terminal job. A failed job is reported as a command failure.
fn finish(job: ProcessingJob) -> anyhow::Result<()> {
    print_json(&job)?;
    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "Job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
