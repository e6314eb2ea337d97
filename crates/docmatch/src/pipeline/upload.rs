use std::fmt;
use std::path::Path;

use crate::error::ProcessError;
use crate::processor::guess_media_type;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// An accepted file: name, declared media type and the full payload.
#[derive(Clone)]
pub struct Upload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk. Without an explicit media type one is guessed
    /// from the extension.
    pub fn from_path(path: &Path, media_type: Option<&str>) -> Result<Self, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        let media_type = media_type
            .map(str::to_string)
            .or_else(|| guess_media_type(path))
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self::new(file_name, media_type, bytes))
    }

    /// Preconditions checked before any job exists.
    pub fn validate(&self, max_bytes: usize) -> Result<(), ProcessError> {
        if self.bytes.is_empty() {
            return Err(ProcessError::EmptyUpload);
        }
        if self.bytes.len() > max_bytes {
            return Err(ProcessError::UploadTooLarge {
                size: self.bytes.len(),
                limit: max_bytes,
            });
        }
        Ok(())
    }
}
