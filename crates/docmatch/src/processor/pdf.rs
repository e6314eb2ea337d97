use lopdf::{Dictionary, Document, Object};
use serde_json::{Map, Value};

use crate::error::ProcessError;
use crate::processor::{ContentExtractor, Extraction, ExtractionMetadata, ExtractorKind};

const FORMAT: &str = "PDF";

/// Reads the text layer and document information of a PDF.
///
/// Image-only PDFs have no text layer and yield empty text; that is left for
/// later stages to judge.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for PdfExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let doc = Document::load_mem(bytes).map_err(|e| ProcessError::extraction(FORMAT, e))?;

        if doc.is_encrypted() {
            return Err(ProcessError::extraction(
                FORMAT,
                "document is password protected",
            ));
        }

        let pages = doc.get_pages();
        let mut text = String::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    if !page_text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                Err(e) => log::debug!("No text on page {}: {}", page_num, e),
            }
        }

        let mut info = document_info(&doc).unwrap_or_default();
        info.insert(
            "PDFFormatVersion".to_string(),
            Value::String(doc.version.clone()),
        );

        let mut metadata = ExtractionMetadata::of_type("pdf");
        metadata.page_count = Some(pages.len());
        metadata.info = Some(info);

        Ok(Extraction { text, metadata })
    }
}

fn document_info(doc: &Document) -> Option<Map<String, Value>> {
    let dict: &Dictionary = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    let mut info = Map::new();
    for (key, value) in dict.iter() {
        let key = String::from_utf8_lossy(key).into_owned();
        let value = match value {
            Object::String(bytes, _) => Value::String(decode_text_string(bytes)),
            Object::Name(name) => Value::String(String::from_utf8_lossy(name).into_owned()),
            Object::Integer(n) => Value::from(*n),
            Object::Real(n) => Value::from(*n as f64),
            Object::Boolean(b) => Value::Bool(*b),
            _ => continue,
        };
        info.insert(key, value);
    }
    Some(info)
}

/// Decodes a PDF text string: UTF-16BE when it starts with a byte order
/// mark, otherwise one byte per character.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
