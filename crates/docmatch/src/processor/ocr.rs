use std::io::Cursor;
use std::sync::Arc;

use crate::error::ProcessError;

/// Tesseract wrapper with a fixed language configuration.
#[derive(Clone)]
pub struct OcrEngine {
    languages: Arc<str>,
}

impl OcrEngine {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            languages: Arc::from(languages),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    pub fn recognize(&self, image_data: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", languages = %self.languages).entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::extraction("image", format!("Failed to load image: {}", e)))?;

        // leptess only reads encoded images, so normalise everything to PNG
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| {
                ProcessError::extraction("image", format!("Failed to convert image: {}", e))
            })?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::extraction("image", format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data).map_err(|e| {
            ProcessError::extraction("image", format!("Failed to set image for OCR: {}", e))
        })?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::extraction("image", format!("OCR failed: {}", e)))
    }
}
