use image::{ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Cursor;

use crate::config::ValidationConfig;
use crate::error::RejectReason;
use crate::model::ContentHash;

/// SHA-256 of the raw bytes, hex encoded.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ContentHash(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPhoto {
    pub hash: ContentHash,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Size, format, resolution, full decode and duplicate checks, applied in
/// that order.
#[derive(Debug, Clone)]
pub struct PhotoValidator {
    max_bytes: usize,
    formats: Vec<ImageFormat>,
    min_width: u32,
    min_height: u32,
}

impl PhotoValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        let formats = config
            .formats
            .iter()
            .filter_map(|name| {
                let format = ImageFormat::from_extension(name);
                if format.is_none() {
                    tracing::warn!(format = %name, "Ignoring unknown image format in config");
                }
                format
            })
            .collect();

        Self {
            max_bytes: config.max_bytes,
            formats,
            min_width: config.min_width,
            min_height: config.min_height,
        }
    }

    pub fn validate(
        &self,
        payload: &[u8],
        existing: &HashSet<ContentHash>,
    ) -> Result<ValidatedPhoto, RejectReason> {
        if payload.len() > self.max_bytes {
            return Err(RejectReason::TooLarge);
        }

        let reader = ImageReader::new(Cursor::new(payload))
            .with_guessed_format()
            .map_err(|_| RejectReason::BadFormat)?;
        let format = match reader.format() {
            Some(f) if self.formats.contains(&f) => f,
            _ => return Err(RejectReason::BadFormat),
        };

        // Header first so undersized photos skip the full decode
        let (width, height) = reader
            .into_dimensions()
            .map_err(|_| RejectReason::BadFormat)?;
        if width < self.min_width || height < self.min_height {
            return Err(RejectReason::TooSmall);
        }
        image::load_from_memory_with_format(payload, format).map_err(|_| RejectReason::BadFormat)?;

        let hash = content_hash(payload);
        if existing.contains(&hash) {
            return Err(RejectReason::Duplicate);
        }

        Ok(ValidatedPhoto {
            hash,
            format,
            width,
            height,
        })
    }
}
