//! `templates list` and `templates import`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};

use docmatch::job::{save_template, TemplateStore};
use docmatch::load_template_file;

use super::{open_database, print_json, resolve_config};

#[derive(Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List stored templates
    List {
        /// Print full definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a template from a JSON or YAML file; an existing id is replaced
    Import {
        file: PathBuf,
    },
}

pub fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = resolve_config(config_path)?;
    let db = open_database(&config)?;

    match args.command {
        TemplatesCommand::List { json } => {
            let templates = db.all_templates()?;
            if json {
                return print_json(&templates);
            }
            if templates.is_empty() {
                eprintln!("No templates stored");
            }
            for template in templates {
                println!(
                    "{}  {}  ({}, {} fields)",
                    template.id,
                    template.name,
                    template.doc_type,
                    template.fields.len()
                );
            }
            Ok(())
        }
        TemplatesCommand::Import { file } => {
            let template = load_template_file(&file)
                .with_context(|| format!("Failed to load template {}", file.display()))?;
            let saved = save_template(&db, template)?;
            log::info!("Imported template {} ({})", saved.id, saved.name);
            print_json(&saved)
        }
    }
}
