use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocmatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// The template matcher returned an error outcome.
    #[error("Template analysis failed: {0}")]
    TemplateAnalysis(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unsupported AI provider '{0}' (expected one of: openai, gemini)")]
    UnknownProvider(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process {format}: {cause}")]
    Extraction { format: String, cause: String },

    #[error("Upload contains no data")]
    EmptyUpload,

    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("Failed to extract content from file")]
    NoExtractableContent,

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn extraction(format: &str, cause: impl std::fmt::Display) -> Self {
        ProcessError::Extraction {
            format: format.to_string(),
            cause: cause.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Provider rate limited the request")]
    RateLimited,

    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),

    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {status} and cannot change state")]
    AlreadyTerminal { id: String, status: String },

    #[error("Job {id} cannot be reprocessed: {reason}")]
    SourceNotReusable { id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("Failed to parse template: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, DocmatchError>;
