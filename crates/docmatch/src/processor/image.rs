use crate::error::ProcessError;
use crate::processor::ocr::OcrEngine;
use crate::processor::{ContentExtractor, Extraction, ExtractionMetadata, ExtractorKind};

/// OCR over JPEG/PNG uploads. Produces plain text and `{type: "image"}`.
pub struct ImageExtractor {
    ocr: OcrEngine,
}

impl ImageExtractor {
    pub fn new(ocr: OcrEngine) -> Self {
        Self { ocr }
    }
}

impl ContentExtractor for ImageExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Image
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ProcessError> {
        let _span = tracing::info_span!("processor.image").entered();

        let text = self.ocr.recognize(bytes)?;
        Ok(Extraction {
            text,
            metadata: ExtractionMetadata::of_type("image"),
        })
    }
}
