//! Command line front end for docmatch.

mod commands;

use clap::{Parser, Subcommand};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use commands::{analyze, jobs, process, templates};

/// Extract text from documents and match it against templates
#[derive(Parser)]
#[command(name = "docmatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to config file (default: ./docmatch.json when present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a document, optionally matching it against a template
    Process(process::ProcessArgs),

    /// Match the text of a completed job against a template, as a new job
    Reprocess(process::ReprocessArgs),

    /// Show one job
    Status(jobs::StatusArgs),

    /// List all jobs, newest first
    Jobs,

    /// Manage templates
    Templates(templates::TemplatesArgs),

    /// Suggest a template structure for a sample document
    Analyze(analyze::AnalyzeArgs),
}

fn init_logging(verbose: u8, json: bool) -> anyhow::Result<()> {
    LogTracer::init()?;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},docmatch={default_level}")));

    // Logs go to stderr so stdout stays machine readable.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Reprocess(args) => process::run_reprocess(args, config_path).await,
        Commands::Status(args) => jobs::run_status(args, config_path).await,
        Commands::Jobs => jobs::run_list(config_path),
        Commands::Templates(args) => templates::run(args, config_path),
        Commands::Analyze(args) => analyze::run(args, config_path).await,
    }
}
