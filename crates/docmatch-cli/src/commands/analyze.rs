//! `analyze`: template suggestions for a sample document.

use std::path::PathBuf;

use clap::Args;

use docmatch::Upload;

use super::{build_pipeline, print_json};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Sample document (PDF, XLSX or image)
    input: PathBuf,

    /// Media type; guessed from the extension when omitted
    #[arg(long)]
    media_type: Option<String>,
}

pub async fn run(args: AnalyzeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path)?;
    let upload = Upload::from_path(&args.input, args.media_type.as_deref())?;
    let analysis = pipeline.analyze_sample(upload).await?;
    print_json(&analysis)
}
