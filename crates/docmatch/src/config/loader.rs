use std::path::Path;

use crate::config::schema::{Config, PROVIDER_GEMINI, PROVIDER_OPENAI};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let provider = config.ai.provider_key();
    if provider != PROVIDER_GEMINI && provider != PROVIDER_OPENAI {
        return Err(ConfigError::UnknownProvider(config.ai.provider.clone()));
    }

    if config.upload.max_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "upload.maxBytes must be positive".to_string(),
        });
    }

    if config.ai.max_input_chars == 0 || config.ai.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "ai.maxInputChars and ai.timeoutSecs must be positive".to_string(),
        });
    }

    Ok(())
}
