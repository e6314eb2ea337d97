//! Language model adapter: provider clients, prompt construction and reply parsing.

pub mod analyzer;
pub mod factory;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod response;
pub mod scripted;

pub use analyzer::{AnalyzedDocument, DetectedField, DocumentAnalyzer, DocumentLayout};
pub use factory::create_model;
pub use provider::LanguageModel;
pub use response::parse_json_response;
pub use scripted::ScriptedModel;
