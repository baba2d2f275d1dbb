//! Metadata extraction: raw file bytes to one [`FieldMap`] per image.
//!
//! | Source | Decoder |
//! |---|---|
//! | PNG `tEXt` / `iTXt` / `zTXt` | [`png_text::decode_png_text`] (flate2 for compressed chunks) |
//! | EXIF (JPEG, TIFF, PNG `eXIf`, WebP, HEIF) | [`exif_fields::read_exif_fields`] over `kamadak-exif` |
//!
//! Both run on every file; [`crate::metadata::merge_sources`] combines them
//! with PNG fields first. A failing EXIF parse never discards the PNG fields:
//! the failure is logged and recorded in [`Extraction::warnings`].

pub mod exif_fields;
pub mod png_text;

use crate::metadata::{self, FieldMap};
use std::path::Path;
use thiserror::Error;

pub use png_text::{INFLATE_FAILED_PLACEHOLDER, decode_png_text};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF parse error: {0}")]
    Exif(#[from] exif::Error),
}

/// Metadata recovered from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: FieldMap,
    /// Contained failures (e.g. a corrupt EXIF block) that did not stop extraction.
    pub warnings: Vec<String>,
}

/// Extract and merge all metadata from an in-memory file.
pub fn extract_metadata(data: &[u8]) -> Extraction {
    let png = decode_png_text(data);
    let mut warnings = Vec::new();

    let external = match exif_fields::read_exif_fields(data) {
        Ok(fields) => fields,
        Err(e) => {
            log::debug!("EXIF not readable: {e}");
            warnings.push(e.to_string());
            Vec::new()
        }
    };

    Extraction {
        fields: metadata::merge_sources(&png, &external),
        warnings,
    }
}

/// Read a file and extract its metadata.
pub fn extract_file(path: &Path) -> Result<Extraction, ExtractError> {
    let data = std::fs::read(path)?;
    Ok(extract_metadata(&data))
}
