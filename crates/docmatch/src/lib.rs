pub mod ai;
pub mod confidence;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod matcher;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod secrets;
pub mod template;

pub use ai::{create_model, DocumentAnalyzer, LanguageModel, ScriptedModel};
pub use confidence::Confidence;
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{DocmatchError, Result};
pub use job::{JobLifecycle, JobStatus, ProcessingJob};
pub use matcher::{MatchOutcome, TemplateMatcher};
pub use pipeline::{Pipeline, PipelineSettings, TemplateAnalysis, Upload};
pub use template::{load_template_file, Template};
