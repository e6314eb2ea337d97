use std::sync::Arc;

use crate::ai::gemini::GeminiModel;
use crate::ai::openai::OpenAiModel;
use crate::ai::provider::LanguageModel;
use crate::config::schema::{AiConfig, PROVIDER_GEMINI, PROVIDER_OPENAI};
use crate::error::{ConfigError, Result};

/// Builds the configured provider. The API key is resolved here, once.
pub fn create_model(config: &AiConfig) -> Result<Arc<dyn LanguageModel>> {
    let provider = config.provider_key();
    if provider != PROVIDER_GEMINI && provider != PROVIDER_OPENAI {
        return Err(ConfigError::UnknownProvider(config.provider.clone()).into());
    }

    let api_key = config.resolve_api_key()?;
    let model = config.model_name();

    let model: Arc<dyn LanguageModel> = match provider.as_str() {
        PROVIDER_OPENAI => Arc::new(OpenAiModel::new(
            api_key,
            model,
            config.temperature,
            config.timeout_secs,
            config.base_url.clone(),
        )?),
        _ => Arc::new(GeminiModel::new(
            api_key,
            model,
            config.temperature,
            config.timeout_secs,
            config.base_url.clone(),
        )?),
    };

    log::info!("Using language model {}", model.name());
    Ok(model)
}
