use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ai::provider::{build_http_client, error_for_status, LanguageModel};
use crate::error::AnalysisError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent`.
pub struct GeminiModel {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiModel {
    pub fn new(
        api_key: SecretString,
        model: String,
        temperature: f32,
        timeout_secs: u64,
        base_url: Option<String>,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn build_request<'a>(system: &'a str, user: &'a str, temperature: f32) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: [Part { text: system }],
        },
        contents: [Content {
            role: Some("user"),
            parts: [Part { text: user }],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AnalysisError> {
        let request_body = build_request(system_prompt, user_prompt, self.temperature);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AnalysisError::Provider(e.without_url().to_string()))?;

        let generated: GenerateContentResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AnalysisError::Provider(format!("invalid response body: {}", e)))?;

        first_candidate_text(generated)
            .ok_or_else(|| AnalysisError::Provider("response contained no candidates".to_string()))
    }
}
