use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A named, ordered set of field definitions for one document category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Document category, e.g. `invoice`.
    #[serde(rename = "type")]
    pub doc_type: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_rules: Option<AiRules>,
    /// Allowed values for `selection` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Currency,
    Selection,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Currency => "currency",
            FieldType::Selection => "selection",
        }
    }
}

/// Hints passed to the model for locating a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiRules {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Regular expression an extracted value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Header,
    Body,
    Footer,
}

impl FieldDefinition {
    pub fn validation_pattern(&self) -> Option<&str> {
        self.ai_rules
            .as_ref()
            .and_then(|rules| rules.validation.as_deref())
            .filter(|p| !p.is_empty())
    }

    /// Compiled validation pattern. Invalid patterns are rejected by
    /// [`Template::validate`], so `None` here means "no rule".
    pub fn validation_regex(&self) -> Option<Regex> {
        self.validation_pattern().and_then(|p| Regex::new(p).ok())
    }
}

impl Template {
    /// Timestamp identifying the field schema revision a result was produced
    /// against: last modification, or creation if never modified.
    pub fn version(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.doc_type.trim().is_empty() {
            return Err(invalid("type must not be empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(invalid("at least one field is required".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("field names must not be empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field name '{}'", field.name)));
            }
            if field.field_type == FieldType::Selection && field.options.is_empty() {
                return Err(invalid(format!(
                    "selection field '{}' needs at least one option",
                    field.name
                )));
            }
            if let Some(pattern) = field.validation_pattern() {
                if let Err(e) = Regex::new(pattern) {
                    return Err(invalid(format!(
                        "field '{}' has an invalid validation pattern: {}",
                        field.name, e
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Loads and validates a template from a `.json`, `.yaml` or `.yml` file.
pub fn load_template_file<P: AsRef<Path>>(path: P) -> Result<Template, TemplateError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| TemplateError::Parse(format!("{}: {}", path.display(), e)))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let template: Template = if is_yaml {
        serde_yaml::from_str(&content)
            .map_err(|e| TemplateError::Parse(format!("{}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&content)
            .map_err(|e| TemplateError::Parse(format!("{}: {}", path.display(), e)))?
    };

    template.validate()?;
    Ok(template)
}
