use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::secrets::{self, SecretError};

pub const PROVIDER_GEMINI: &str = "gemini";
pub const PROVIDER_OPENAI: &str = "openai";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: DatabaseConfig::default(),
            upload: UploadConfig::default(),
            ocr: OcrConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    dirs::home_dir()
        .map(|home| {
            home.join(".docmatch")
                .join("data")
                .join("docmatch.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| ".docmatch/data/docmatch.db".to_string())
}

impl DatabaseConfig {
    /// Path with a leading `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(secrets::expand_home(&self.path))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    /// Uploads larger than this are rejected before a job is created.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
        }
    }
}

/// Language model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    /// `gemini` or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name; defaults depend on the provider.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    /// Document text is cut to this many characters before prompting.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    /// Defaults to `GOOGLE_API_KEY` for gemini and `OPENAI_API_KEY` for openai.
    #[serde(default)]
    pub api_key_env_var: Option<String>,
    /// Overrides the provider endpoint (proxies, compatible servers).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    PROVIDER_GEMINI.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_max_input_chars() -> usize {
    4000
}

impl AiConfig {
    pub fn provider_key(&self) -> String {
        self.provider.trim().to_ascii_lowercase()
    }

    pub fn model_name(&self) -> String {
        if let Some(model) = self.model.as_deref().filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        match self.provider_key().as_str() {
            PROVIDER_OPENAI => "gpt-4".to_string(),
            _ => "gemini-2.0-flash".to_string(),
        }
    }

    pub fn api_key_env_var(&self) -> String {
        if let Some(name) = self.api_key_env_var.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.provider_key().as_str() {
            PROVIDER_OPENAI => "OPENAI_API_KEY".to_string(),
            _ => "GOOGLE_API_KEY".to_string(),
        }
    }

    pub fn resolve_api_key(&self) -> Result<SecretString, SecretError> {
        let env_var = self.api_key_env_var();
        secrets::resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            Some(&env_var),
        )
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_ai_timeout(),
            max_input_chars: default_max_input_chars(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
            base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload.max_bytes, 10_485_760);
        assert_eq!(config.ocr.languages, vec!["eng".to_string()]);
        assert_eq!(config.ai.provider, "gemini");
        assert_eq!(config.ai.max_input_chars, 4000);
        assert!(config.database.path.ends_with("docmatch.db"));
    }

    #[test]
    fn test_model_and_env_defaults_follow_provider() {
        let mut ai = AiConfig::default();
        assert_eq!(ai.model_name(), "gemini-2.0-flash");
        assert_eq!(ai.api_key_env_var(), "GOOGLE_API_KEY");

        ai.provider = "OpenAI".to_string();
        assert_eq!(ai.model_name(), "gpt-4");
        assert_eq!(ai.api_key_env_var(), "OPENAI_API_KEY");

        ai.model = Some("gpt-4o-mini".to_string());
        ai.api_key_env_var = Some("MY_KEY".to_string());
        assert_eq!(ai.model_name(), "gpt-4o-mini");
        assert_eq!(ai.api_key_env_var(), "MY_KEY");
    }

    #[test]
    fn test_direct_api_key_wins() {
        use secrecy::ExposeSecret;

        let ai = AiConfig {
            api_key: Some("inline".to_string()),
            ..Default::default()
        };
        assert_eq!(ai.resolve_api_key().unwrap().expose_secret(), "inline");
    }

    #[test]
    fn test_camel_case_keys() {
        let ai: AiConfig = serde_json::from_str(
            r#"{ "provider": "openai", "timeoutSecs": 5, "maxInputChars": 100, "apiKeyEnvVar": "K" }"#,
        )
        .unwrap();
        assert_eq!(ai.timeout_secs, 5);
        assert_eq!(ai.max_input_chars, 100);
        assert_eq!(ai.api_key_env_var.as_deref(), Some("K"));
    }
}
