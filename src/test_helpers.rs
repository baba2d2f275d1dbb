//! Shared test utilities for the metaname test suite.
//!
//! Provides byte-level PNG builders for the extractor tests and terse
//! constructors for rules, field maps, and image records used by the
//! matching, session, and export tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = build_png(&[png_chunk(b"tEXt", b"parameters\x001girl")]);
//! let img = image(0, "00001.png", &[("PNG:parameters", "1girl")]);
//! let rules = vec![rule(0, "1girl", "portrait")];
//! ```

use crate::metadata::FieldMap;
use crate::rules::{Rule, RuleId};
use crate::types::{ImageId, ImageRecord};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

// =========================================================================
// PNG byte builders
// =========================================================================

/// Frame one chunk: length, type, payload, and a zero CRC (never checked).
pub fn png_chunk(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(payload.len() + 12);
    chunk.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    chunk.extend_from_slice(kind);
    chunk.extend_from_slice(payload);
    chunk.extend_from_slice(&[0, 0, 0, 0]);
    chunk
}

/// Signature + 1×1 IHDR + the given chunks + IEND.
pub fn build_png(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut png = crate::extract::png_text::PNG_SIGNATURE.to_vec();
    let ihdr = [0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0];
    png.extend(png_chunk(b"IHDR", &ihdr));
    for chunk in chunks {
        png.extend_from_slice(chunk);
    }
    png.extend(png_chunk(b"IEND", &[]));
    png
}

/// Payload of an `iTXt` chunk. `text` is written as-is, so pass already
/// compressed bytes when `compressed` is set.
pub fn itxt_payload(
    keyword: &str,
    compressed: bool,
    lang: &str,
    translated: &str,
    text: &[u8],
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(keyword.as_bytes());
    payload.push(0);
    payload.push(u8::from(compressed));
    payload.push(0);
    payload.extend_from_slice(lang.as_bytes());
    payload.push(0);
    payload.extend_from_slice(translated.as_bytes());
    payload.push(0);
    payload.extend_from_slice(text);
    payload
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

// =========================================================================
// Domain constructors
// =========================================================================

pub fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Enabled rule, exact matching only.
pub fn rule(id: u64, keyword: &str, new_file_name: &str) -> Rule {
    Rule {
        id: RuleId(id),
        keyword: keyword.to_string(),
        new_file_name: new_file_name.to_string(),
        enabled: true,
        partial_match_enabled: false,
    }
}

/// Enabled rule that opts into partial matching.
pub fn partial_rule(id: u64, keyword: &str, new_file_name: &str) -> Rule {
    Rule {
        partial_match_enabled: true,
        ..rule(id, keyword, new_file_name)
    }
}

pub fn image(id: usize, file_name: &str, metadata: &[(&str, &str)]) -> ImageRecord {
    ImageRecord::new(ImageId(id), file_name, fields(metadata))
}
