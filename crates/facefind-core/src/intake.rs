//! Image intake: content-type filtering, data URL encoding and size probing.

use crate::types::ImageId;
use base64::{engine::general_purpose, Engine as _};
use image::{ImageError, ImageReader};
use std::io::Cursor;
use thiserror::Error;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("failed to decode {file_name}: {source}")]
    Decode {
        file_name: String,
        #[source]
        source: ImageError,
    },
}

/// An image accepted for processing. Immutable once created.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub id: ImageId,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// `data:` URL for inline display.
    pub data_url: String,
    /// Natural pixel dimensions, measured locally.
    pub width: u32,
    pub height: u32,
    /// Backend base URL in effect when the image was opened.
    pub backend_url: String,
}

/// Accepts files by declared content type and turns them into [`UploadedImage`]s.
#[derive(Debug, Clone)]
pub struct Intake {
    acceptable_types: Vec<String>,
}

impl Default for Intake {
    fn default() -> Self {
        Self::new([JPEG_CONTENT_TYPE])
    }
}

impl Intake {
    pub fn new<I, S>(acceptable_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            acceptable_types: acceptable_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        self.acceptable_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    /// Load a file.
    ///
    /// Returns `Ok(None)` when the declared content type is not acceptable;
    /// such files are ignored without any further work. Returns an error only
    /// when an acceptable file cannot be decoded far enough to measure it.
    pub fn load(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        backend_url: &str,
    ) -> Result<Option<UploadedImage>, IntakeError> {
        if !self.accepts(content_type) {
            tracing::debug!(file_name, content_type, "ignoring file with unsupported type");
            return Ok(None);
        }

        let data_url = data_url(content_type, &bytes);
        let (width, height) = measure(&bytes).map_err(|source| IntakeError::Decode {
            file_name: file_name.to_string(),
            source,
        })?;

        let image = UploadedImage {
            id: ImageId::next(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
            data_url,
            width,
            height,
            backend_url: backend_url.to_string(),
        };
        tracing::debug!(id = %image.id, file_name, width, height, "image loaded");
        Ok(Some(image))
    }
}

/// Encode bytes as a base64 `data:` URL.
pub fn data_url(content_type: &str, bytes: &[u8]) -> String {
    let b64 = general_purpose::STANDARD.encode(bytes);
    format!("data:{content_type};base64,{b64}")
}

/// Natural pixel dimensions, read from the image header.
pub fn measure(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_dimensions()
}
