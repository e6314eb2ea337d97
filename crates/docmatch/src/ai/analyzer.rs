use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::prompts::{self, bounded_input, Prompt};
use crate::ai::provider::LanguageModel;
use crate::ai::response::parse_json_response;
use crate::error::AnalysisError;
use crate::template::Template;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 4000;

/// Structure the model found in a sample document, used to suggest a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub fields: Vec<DetectedField>,
    #[serde(default)]
    pub layout: DocumentLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub location: String,
    /// `high`, `medium` or `low` as reported by the model.
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub validation_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub structure: String,
}

/// Stateless adapter from documents and templates to model calls.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    model: Arc<dyn LanguageModel>,
    max_input_chars: usize,
}

impl DocumentAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>, max_input_chars: usize) -> Self {
        Self {
            model,
            max_input_chars,
        }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    /// Sends a prompt pair and returns the raw reply.
    pub async fn invoke(&self, system: &str, user: &str) -> Result<String, AnalysisError> {
        self.model.invoke(system, user).await
    }

    async fn invoke_json(&self, prompt: Prompt) -> Result<Value, AnalysisError> {
        let reply = self.invoke(&prompt.system, &prompt.user).await?;
        log::debug!("Model reply ({} chars)", reply.len());
        parse_json_response(&reply)
    }

    pub async fn analyze_document(
        &self,
        text: &str,
        doc_type: &str,
    ) -> Result<AnalyzedDocument, AnalysisError> {
        let text = bounded_input(text, self.max_input_chars);
        let value = self
            .invoke_json(prompts::document_analysis(&text, doc_type))
            .await?;

        serde_json::from_value(value).map_err(|e| {
            AnalysisError::MalformedResponse(format!("unexpected analysis structure: {}", e))
        })
    }

    /// Free-form extraction rules and hints derived from an analysis.
    pub async fn generate_field_suggestions(
        &self,
        analysis: &AnalyzedDocument,
    ) -> Result<Value, AnalysisError> {
        let analysis = serde_json::to_value(analysis)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        self.invoke_json(prompts::field_suggestions(&analysis)).await
    }

    /// The model's review of a template against sample extracted data.
    pub async fn validate_template(
        &self,
        template: &Template,
        sample: &Value,
    ) -> Result<Value, AnalysisError> {
        self.invoke_json(prompts::template_validation(template, sample))
            .await
    }

    /// Per-field extraction for `template`, as returned by the model.
    pub async fn analyze_with_template(
        &self,
        text: &str,
        template: &Template,
    ) -> Result<Value, AnalysisError> {
        let text = bounded_input(text, self.max_input_chars);
        self.invoke_json(prompts::template_extraction(template, &text))
            .await
    }
}
