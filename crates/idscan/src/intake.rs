//! Synchronous upload checks: extension, size, then content signature.

use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::sanitize::file_extension;

/// Extensions accepted at submission, in the order they are reported to callers.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Tiff,
    Bmp,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "tiff" | "tif" => Some(ImageKind::Tiff),
            "bmp" => Some(ImageKind::Bmp),
            _ => None,
        }
    }

    /// Leading byte patterns; any one of them identifies the format.
    pub fn signatures(&self) -> &'static [&'static [u8]] {
        match self {
            ImageKind::Jpeg => &[&[0xFF, 0xD8, 0xFF]],
            ImageKind::Png => &[&[0x89, 0x50, 0x4E, 0x47]],
            ImageKind::Tiff => &[&[0x49, 0x49, 0x2A, 0x00], &[0x4D, 0x4D, 0x00, 0x2A]],
            ImageKind::Bmp => &[&[0x42, 0x4D]],
        }
    }

    pub fn matches_signature(&self, content: &[u8]) -> bool {
        self.signatures().iter().any(|sig| content.starts_with(sig))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::Tiff => "TIFF",
            ImageKind::Bmp => "BMP",
        }
    }
}

pub fn size_in_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Validates an upload before any job is created.
///
/// Checks run extension first, then size, then signature, so an oversized
/// file with a bad extension is reported as the extension problem.
pub fn validate_upload(
    content: &[u8],
    filename: &str,
    max_bytes: u64,
) -> Result<ImageKind, IntakeError> {
    if filename.trim().is_empty() {
        return Err(IntakeError::MissingFilename);
    }

    let extension = file_extension(filename).unwrap_or_default();
    let kind =
        ImageKind::from_extension(&extension).ok_or_else(|| IntakeError::UnsupportedExtension {
            extension: extension.clone(),
            allowed: SUPPORTED_EXTENSIONS.join(", "),
        })?;

    let size = content.len() as u64;
    if size > max_bytes {
        return Err(IntakeError::TooLarge {
            size_mb: size_in_mb(size),
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    if content.is_empty() {
        return Err(IntakeError::Empty);
    }

    if !kind.matches_signature(content) {
        return Err(IntakeError::SignatureMismatch {
            expected: kind.display_name().to_string(),
        });
    }

    Ok(kind)
}
