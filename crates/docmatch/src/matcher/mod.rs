//! Template matching: per-field extraction through the language model,
//! normalized into typed values with confidence and provenance.

pub mod coerce;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::ai::DocumentAnalyzer;
use crate::confidence::{self, Confidence};
use crate::error::AnalysisError;
use crate::template::{FieldDefinition, Template};

pub use coerce::FieldValue;

const NOT_RETURNED_NOTE: &str = "Field was not returned by the model";
const NOT_FOUND_NOTE: &str = "Value not found in document";

/// One field's resolved value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldExtraction {
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    pub location: Option<String>,
    pub notes: Option<String>,
    /// Additional structure returned for the field, e.g. line items.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldExtraction {
    fn missing() -> Self {
        Self {
            value: None,
            confidence: Some(Confidence::Low),
            location: None,
            notes: Some(NOT_RETURNED_NOTE.to_string()),
            extra: Map::new(),
        }
    }

    fn downgrade(&mut self, note: String) {
        self.confidence = Some(Confidence::Low);
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}; {}", existing, note),
            None => note,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub name: String,
    pub extraction: FieldExtraction,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    /// In template field order.
    #[serde(serialize_with = "serialize_fields")]
    pub extracted_data: Vec<FieldMatch>,
    pub template_used: String,
    pub template_version: DateTime<Utc>,
    pub analysis_date: DateTime<Utc>,
    pub confidence: Confidence,
}

impl MatchResult {
    pub fn field(&self, name: &str) -> Option<&FieldExtraction> {
        self.extracted_data
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.extraction)
    }
}

fn serialize_fields<S: Serializer>(fields: &[FieldMatch], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for field in fields {
        map.serialize_entry(&field.name, &field.extraction)?;
    }
    map.end()
}

/// Result of matching one document against one template.
///
/// A failed model call or an unusable reply does not raise; it becomes the
/// `error` variant so the caller can still record a terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchOutcome {
    Completed { result: MatchResult, metadata: Value },
    Error { error: String, metadata: Value },
}

impl MatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MatchOutcome::Completed { .. })
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Clone)]
pub struct TemplateMatcher {
    analyzer: DocumentAnalyzer,
}

impl TemplateMatcher {
    pub fn new(analyzer: DocumentAnalyzer) -> Self {
        Self { analyzer }
    }

    pub async fn match_document(
        &self,
        text: &str,
        metadata: &Value,
        template: &Template,
    ) -> MatchOutcome {
        let span = tracing::info_span!(
            "match_template",
            template_id = %template.id,
            model = %self.analyzer.model_name()
        );

        let resolved = self.extract_fields(text, template).instrument(span).await;

        match resolved {
            Ok(fields) => {
                let extracted = Value::Object(
                    fields
                        .iter()
                        .map(|f| {
                            let value = serde_json::to_value(&f.extraction).unwrap_or(Value::Null);
                            (f.name.clone(), value)
                        })
                        .collect(),
                );
                let confidence = confidence::aggregate(&extracted);
                log::info!(
                    "Matched {} fields against template '{}' (confidence {})",
                    fields.len(),
                    template.name,
                    confidence
                );

                MatchOutcome::Completed {
                    result: MatchResult {
                        extracted_data: fields,
                        template_used: template.id.clone(),
                        template_version: template.version(),
                        analysis_date: Utc::now(),
                        confidence,
                    },
                    metadata: merge_metadata(
                        metadata,
                        [
                            ("template_name", Value::from(template.name.as_str())),
                            ("template_type", Value::from(template.doc_type.as_str())),
                        ],
                    ),
                }
            }
            Err(e) => {
                log::warn!("Template analysis failed for '{}': {}", template.name, e);
                MatchOutcome::Error {
                    error: e.to_string(),
                    metadata: merge_metadata(
                        metadata,
                        [
                            ("template_id", Value::from(template.id.as_str())),
                            ("error_type", Value::from("analysis_error")),
                        ],
                    ),
                }
            }
        }
    }

    async fn extract_fields(
        &self,
        text: &str,
        template: &Template,
    ) -> Result<Vec<FieldMatch>, AnalysisError> {
        let raw = self.analyzer.analyze_with_template(text, template).await?;
        resolve_fields(&raw, template)
    }
}

fn merge_metadata<const N: usize>(base: &Value, entries: [(&str, Value); N]) -> Value {
    let mut map = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}

/// Maps the model reply onto the template's fields, in template order.
///
/// Accepted reply shapes: an object keyed by field name, the same object
/// under a `fields` key, or a `fields` array of objects carrying `name`.
pub fn resolve_fields(raw: &Value, template: &Template) -> Result<Vec<FieldMatch>, AnalysisError> {
    let entries = field_entries(raw)?;

    Ok(template
        .fields
        .iter()
        .map(|field| {
            let extraction = match lookup(&entries, &field.name) {
                Some(entry) => resolve_field(field, entry),
                None => {
                    log::debug!("Model did not return field '{}'", field.name);
                    FieldExtraction::missing()
                }
            };
            FieldMatch {
                name: field.name.clone(),
                extraction,
            }
        })
        .collect())
}

fn field_entries(raw: &Value) -> Result<Map<String, Value>, AnalysisError> {
    let Value::Object(map) = raw else {
        return Err(AnalysisError::MalformedResponse(
            "expected a JSON object keyed by field name".to_string(),
        ));
    };

    match map.get("fields") {
        Some(Value::Object(fields)) => Ok(fields.clone()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| {
                let mut entry = item.as_object()?.clone();
                let name = entry.remove("name")?.as_str()?.to_string();
                Some((name, Value::Object(entry)))
            })
            .collect()),
        _ => Ok(map.clone()),
    }
}

fn lookup<'a>(entries: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    entries.get(name).or_else(|| {
        let wanted = normalize_key(name);
        entries
            .iter()
            .find(|(key, _)| normalize_key(key) == wanted)
            .map(|(_, value)| value)
    })
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn resolve_field(field: &FieldDefinition, entry: &Value) -> FieldExtraction {
    let (raw_value, mut extraction) = split_entry(entry);

    if raw_value.is_null() {
        extraction.value = None;
        if extraction.notes.is_none() {
            extraction.notes = Some(NOT_FOUND_NOTE.to_string());
        }
        if extraction.confidence.is_none() {
            extraction.confidence = Some(Confidence::Low);
        }
        return extraction;
    }

    match coerce::coerce(field, &raw_value) {
        Ok(value) => extraction.value = Some(value),
        Err(reason) => {
            extraction.value = Some(FieldValue::Raw(raw_value.clone()));
            extraction.downgrade(format!("could not be read as {}: {}", field.field_type.as_str(), reason));
        }
    }

    if let Some(pattern) = field.validation_regex() {
        let text = coerce::scalar_text(&raw_value).unwrap_or_default();
        if !pattern.is_match(&text) {
            extraction.downgrade(format!("does not match validation pattern {}", pattern.as_str()));
        }
    }

    extraction
}

/// Splits a reply entry into its raw value and the surrounding annotations.
/// A bare scalar is taken as the value itself.
fn split_entry(entry: &Value) -> (Value, FieldExtraction) {
    let mut extraction = FieldExtraction {
        value: None,
        confidence: None,
        location: None,
        notes: None,
        extra: Map::new(),
    };

    let map = match entry {
        Value::Object(map) if map.contains_key("value") || map.contains_key("confidence") => map,
        other => return (other.clone(), extraction),
    };

    let mut raw_value = Value::Null;
    for (key, value) in map {
        match key.as_str() {
            "value" => raw_value = value.clone(),
            "confidence" => extraction.confidence = parse_confidence(value),
            "location" => extraction.location = text_of(value),
            "notes" => extraction.notes = text_of(value),
            _ => {
                extraction.extra.insert(key.clone(), value.clone());
            }
        }
    }
    (raw_value, extraction)
}

fn parse_confidence(value: &Value) -> Option<Confidence> {
    match value {
        Value::String(label) => label.parse().ok(),
        Value::Number(n) => n.as_f64().map(Confidence::from_score),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
