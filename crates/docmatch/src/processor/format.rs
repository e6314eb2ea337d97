use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Extraction strategy selected for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Pdf,
    Spreadsheet,
    Image,
}

impl ExtractorKind {
    /// Name used in `Failed to process <format>` messages.
    pub fn label(&self) -> &'static str {
        match self {
            ExtractorKind::Pdf => "PDF",
            ExtractorKind::Spreadsheet => "Excel",
            ExtractorKind::Image => "image",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a declared media type to an extractor kind.
///
/// Parameters (`; charset=...`) and letter case are ignored. Anything outside
/// the allowlist is `UnsupportedFormat`.
pub fn detect(media_type: &str) -> Result<ExtractorKind, ProcessError> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        PDF_MEDIA_TYPE => Ok(ExtractorKind::Pdf),
        XLSX_MEDIA_TYPE => Ok(ExtractorKind::Spreadsheet),
        JPEG_MEDIA_TYPE | PNG_MEDIA_TYPE => Ok(ExtractorKind::Image),
        _ => Err(ProcessError::UnsupportedFormat(media_type.to_string())),
    }
}

/// Guesses a media type from a file name, for callers that have no declared type.
pub fn guess_media_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}
