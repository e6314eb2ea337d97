pub mod format;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod spreadsheet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProcessError;

pub use format::{detect, guess_media_type, ExtractorKind};

/// Flattened text plus format-specific facts for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

/// Diagnostic facts about an extracted document. Only the fields that make
/// sense for the source format are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    /// `pdf`, `excel` or `image`.
    #[serde(rename = "type")]
    pub doc_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,

    /// PDF document information dictionary (Author, Title, Producer, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sheets: Option<usize>,
}

impl ExtractionMetadata {
    pub fn of_type(doc_type: &str) -> Self {
        Self {
            doc_type: doc_type.to_string(),
            ..Default::default()
        }
    }
}

pub trait ContentExtractor: Send + Sync {
    fn kind(&self) -> ExtractorKind;
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ProcessError>;
}

/// Dispatches bytes to the extractor registered for their media type.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// PDF and spreadsheet extraction, used by the job pipeline.
    pub fn for_documents() -> Self {
        Self {
            extractors: vec![
                Box::new(pdf::PdfExtractor::new()),
                Box::new(spreadsheet::SpreadsheetExtractor::new()),
            ],
        }
    }

    /// Document extractors plus image OCR, used for template analysis.
    pub fn with_ocr(ocr_languages: &[String]) -> Self {
        let mut registry = Self::for_documents();
        let ocr = ocr::OcrEngine::new(ocr_languages);
        registry
            .extractors
            .push(Box::new(image::ImageExtractor::new(ocr)));
        registry
    }

    pub fn supports(&self, kind: ExtractorKind) -> bool {
        self.extractors.iter().any(|e| e.kind() == kind)
    }

    pub fn extract(&self, media_type: &str, bytes: &[u8]) -> Result<Extraction, ProcessError> {
        let kind = detect(media_type)?;

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.kind() == kind)
            .ok_or_else(|| ProcessError::UnsupportedFormat(media_type.to_string()))?;

        let _span = tracing::info_span!("extract", kind = kind.label(), bytes = bytes.len()).entered();
        extractor.extract(bytes)
    }
}
