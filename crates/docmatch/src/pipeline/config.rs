use crate::ai::analyzer::DEFAULT_MAX_INPUT_CHARS;
use crate::config::Config;

/// Limits the pipeline enforces, taken from the loaded config.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_upload_bytes: usize,
    pub max_input_chars: usize,
    pub ocr_languages: Vec<String>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.upload.max_bytes,
            max_input_chars: config.ai.max_input_chars,
            ocr_languages: config.ocr.languages.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            ocr_languages: vec!["eng".to_string()],
        }
    }
}
