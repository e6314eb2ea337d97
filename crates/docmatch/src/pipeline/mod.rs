//! Upload-to-job orchestration: detect, extract, match, persist.

pub mod config;
pub mod runner;
pub mod upload;

pub use config::PipelineSettings;
pub use runner::{Pipeline, TemplateAnalysis};
pub use upload::Upload;
