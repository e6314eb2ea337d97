use async_trait::async_trait;

use crate::error::AnalysisError;

/// A chat-style language model: one system message, one user message, one reply.
///
/// Implementations hold no conversation state between calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider and model, for logs.
    fn name(&self) -> String;

    async fn invoke(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, AnalysisError>;
}

/// Maps a non-success provider response to an analysis error.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, AnalysisError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AnalysisError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnalysisError::Provider(format!("HTTP {}: {}", status, body)));
    }
    Ok(response)
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, AnalysisError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::Configuration(format!("failed to build HTTP client: {}", e)))
}
