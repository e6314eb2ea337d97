//! Prompt builders. Every builder is a pure function of its inputs.

use std::borrow::Cow;

use serde_json::{json, Value};

use crate::sanitize::sanitize_for_prompt;
use crate::template::Template;

/// Cuts `text` to at most `max_chars` characters, on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Document text as it goes into a prompt: at most `max_chars` characters,
/// with a visible marker and a debug log when anything was cut.
pub fn bounded_input(text: &str, max_chars: usize) -> Cow<'_, str> {
    let kept = truncate_chars(text, max_chars);
    if kept.len() == text.len() {
        return Cow::Borrowed(text);
    }

    let total = text.chars().count();
    log::debug!(
        "Truncating prompt input from {} to {} characters",
        total,
        max_chars
    );
    Cow::Owned(format!(
        "{}\n[truncated: first {} of {} characters shown]",
        kept, max_chars, total
    ))
}

pub struct Prompt {
    pub system: String,
    pub user: String,
}

const ANALYSIS_SYSTEM: &str = "You are an expert document analyzer. Analyze the provided document text and identify:
1. Document type and purpose
2. Key fields and their locations
3. Document structure and layout
4. Data relationships and hierarchies
5. Validation rules and patterns";

const ANALYSIS_SHAPE: &str = r#"{
  "documentType": "string",
  "purpose": "string",
  "fields": [{
    "name": "string",
    "type": "string",
    "location": "string",
    "importance": "high|medium|low",
    "relationships": ["field_names"],
    "validationRules": ["rules"]
  }],
  "layout": {
    "sections": ["header", "body", "footer"],
    "structure": "string"
  }
}"#;

pub fn document_analysis(text: &str, doc_type: &str) -> Prompt {
    Prompt {
        system: ANALYSIS_SYSTEM.to_string(),
        user: format!(
            "Analyze this document:\nType: {}\nContent:\n{}\n\nProvide analysis in JSON format with the following structure:\n{}",
            doc_type,
            sanitize_for_prompt(text),
            ANALYSIS_SHAPE
        ),
    }
}

pub fn field_suggestions(analysis: &Value) -> Prompt {
    Prompt {
        system: "You are an expert in document processing automation. Generate field extraction rules and suggestions based on the document analysis.".to_string(),
        user: format!(
            "Based on this analysis:\n{}\n\nGenerate detailed field processing rules including:\n1. AI detection strategies\n2. Validation patterns\n3. Data transformation rules\n4. Error handling suggestions\n5. Confidence scoring criteria\n\nProvide output in JSON format.",
            pretty(analysis)
        ),
    }
}

pub fn template_validation(template: &Template, sample: &Value) -> Prompt {
    Prompt {
        system: "You are a document validation expert. Validate the template configuration against sample data.".to_string(),
        user: format!(
            "Template configuration:\n{}\n\nSample data:\n{}\n\nValidate and provide:\n1. Configuration issues\n2. Missing fields\n3. Validation rule conflicts\n4. Processing efficiency suggestions\n5. Accuracy improvement recommendations\n\nProvide output in JSON format.",
            pretty(&template_description(template)),
            sanitize_for_prompt(&pretty(sample))
        ),
    }
}

/// Extraction instructions for one template. The reply must be a JSON object
/// keyed by field name.
pub fn template_extraction(template: &Template, text: &str) -> Prompt {
    let system = format!(
        "You are an expert document processor. Your task is to extract and structure information from documents according to a predefined template.

Template Details:
- Name: {name}
- Document Type: {doc_type}
- Fields: {fields}

Extract all fields specified in the template from the provided document text. For each field, provide:
1. \"value\": the extracted value
2. \"confidence\": the confidence level, one of high, medium or low
3. \"location\": where in the document the value was found (page number, section, etc.)
4. \"notes\": any notes or observations about the extraction

Respond with a single JSON object whose keys are the field names, for example:
{{\"field_name\": {{\"value\": \"...\", \"confidence\": \"high\", \"location\": \"page 1, header\", \"notes\": \"\"}}}}",
        name = template.name,
        doc_type = template.doc_type,
        fields = pretty(&template_description(template)["fields"]),
    );

    let user = format!(
        "Please process the following document according to the template \"{name}\" ({doc_type}):

Document Content:
{text}

Extract all fields from the template and return them in a structured JSON format. If a field cannot be found, set its value to null and explain why in the notes.",
        name = template.name,
        doc_type = template.doc_type,
        text = sanitize_for_prompt(text),
    );

    Prompt { system, user }
}

/// Field list as shown to the model: name, type, required flag, options and
/// extraction hints. Ids and timestamps are left out.
fn template_description(template: &Template) -> Value {
    let fields: Vec<Value> = template
        .fields
        .iter()
        .map(|field| {
            let mut entry = json!({
                "name": field.name,
                "type": field.field_type.as_str(),
                "required": field.required,
            });
            if !field.options.is_empty() {
                entry["options"] = json!(field.options);
            }
            if let Some(rules) = &field.ai_rules {
                if !rules.keywords.is_empty() {
                    entry["keywords"] = json!(rules.keywords);
                }
                if let Some(position) = rules.position {
                    entry["position"] = json!(position);
                }
                if let Some(validation) = &rules.validation {
                    entry["validation"] = json!(validation);
                }
            }
            entry
        })
        .collect();

    json!({
        "name": template.name,
        "type": template.doc_type,
        "fields": fields,
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
