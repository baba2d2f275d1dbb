//! PNG text-chunk decoder (`tEXt`, `iTXt`, `zTXt`).
//!
//! Walks the chunk stream and returns every text field as `PNG:<keyword>` →
//! text. Only the chunk framing is trusted: each chunk advances the cursor by
//! `12 + length` whether or not its payload parses, so one corrupt chunk never
//! desynchronizes the rest of the stream.
//!
//! Chunk layouts (after the 4-byte length and 4-byte type):
//!
//! ```text
//! tEXt  keyword 0 text
//! zTXt  keyword 0 method zlib(text)
//! iTXt  keyword 0 flag method language 0 translated-keyword 0 text-or-zlib(text)
//! ```
//!
//! A payload that fails to inflate produces [`INFLATE_FAILED_PLACEHOLDER`]
//! instead of dropping the field.

use crate::metadata::{FieldMap, PNG_PREFIX};
use flate2::read::ZlibDecoder;
use std::io::Read;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Value stored for a compressed text chunk whose payload cannot be inflated.
pub const INFLATE_FAILED_PLACEHOLDER: &str = "[compressed text could not be decompressed]";

/// Length + type + CRC.
const CHUNK_OVERHEAD: usize = 12;

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Decode all text chunks of a PNG byte buffer.
///
/// Returns an empty map if `data` does not start with the PNG signature.
/// Later chunks with the same keyword overwrite earlier ones.
pub fn decode_png_text(data: &[u8]) -> FieldMap {
    let mut fields = FieldMap::new();
    if !is_png(data) {
        return fields;
    }

    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= data.len() {
        let length = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let chunk_type = &data[offset + 4..offset + 8];
        if chunk_type == b"IEND" {
            break;
        }

        let start = offset + 8;
        let payload = start
            .checked_add(length)
            .and_then(|end| data.get(start..end));

        match payload {
            Some(payload) => {
                let decoded = match chunk_type {
                    b"tEXt" => parse_text(payload),
                    b"zTXt" => parse_ztxt(payload),
                    b"iTXt" => parse_itxt(payload),
                    _ => None,
                };
                if let Some((keyword, text)) = decoded {
                    fields.insert(format!("{PNG_PREFIX}{keyword}"), text);
                } else if is_text_chunk(chunk_type) {
                    log::debug!(
                        "skipping malformed {} chunk at offset {offset}",
                        String::from_utf8_lossy(chunk_type)
                    );
                }
            }
            None => {
                log::debug!("chunk at offset {offset} runs past end of data ({length} bytes)");
            }
        }

        offset = match offset.checked_add(CHUNK_OVERHEAD + length) {
            Some(next) => next,
            None => break,
        };
    }

    fields
}

fn is_text_chunk(chunk_type: &[u8]) -> bool {
    matches!(chunk_type, b"tEXt" | b"zTXt" | b"iTXt")
}

/// Split at the first NUL. Keyword must be non-empty.
fn split_keyword(payload: &[u8]) -> Option<(String, &[u8])> {
    let nul = payload.iter().position(|&b| b == 0)?;
    if nul == 0 {
        return None;
    }
    Some((decode_text(&payload[..nul]), &payload[nul + 1..]))
}

fn parse_text(payload: &[u8]) -> Option<(String, String)> {
    let (keyword, text) = split_keyword(payload)?;
    Some((keyword, decode_text(text)))
}

fn parse_ztxt(payload: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_keyword(payload)?;
    // rest[0] is the compression method; zlib is the only one defined
    let compressed = rest.get(1..)?;
    Some((keyword, inflate_text(compressed)))
}

fn parse_itxt(payload: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_keyword(payload)?;
    let compression_flag = *rest.first()?;
    // rest[1] is the compression method
    let after_method = rest.get(2..)?;

    let lang_end = after_method.iter().position(|&b| b == 0)?;
    let after_lang = &after_method[lang_end + 1..];
    let translated_end = after_lang.iter().position(|&b| b == 0)?;
    let text = &after_lang[translated_end + 1..];

    let value = if compression_flag != 0 {
        inflate_text(text)
    } else {
        decode_text(text)
    };
    Some((keyword, value))
}

fn inflate_text(compressed: &[u8]) -> String {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => decode_text(&out),
        Err(e) => {
            log::warn!("failed to inflate PNG text chunk: {e}");
            INFLATE_FAILED_PLACEHOLDER.to_string()
        }
    }
}

/// UTF-8, falling back to Latin-1 byte-for-byte.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{build_png, itxt_payload, png_chunk, zlib};

    #[test]
    fn non_png_returns_empty() {
        assert!(decode_png_text(b"GIF89a....").is_empty());
        assert!(decode_png_text(&[]).is_empty());
        assert!(decode_png_text(&PNG_SIGNATURE[..4]).is_empty());
    }

    #[test]
    fn signature_only_returns_empty() {
        assert!(decode_png_text(&PNG_SIGNATURE).is_empty());
    }

    #[test]
    fn decodes_text_chunk() {
        let png = build_png(&[png_chunk(b"tEXt", b"parameters\x001girl, standing")]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:parameters"), Some("1girl, standing"));
    }

    #[test]
    fn text_chunk_falls_back_to_latin1() {
        // 0xE9 alone is invalid UTF-8; Latin-1 'é'
        let png = build_png(&[png_chunk(b"tEXt", b"Comment\x00caf\xE9")]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:Comment"), Some("café"));
    }

    #[test]
    fn text_chunk_utf8_is_kept() {
        let png = build_png(&[png_chunk(b"tEXt", "Title\0猫".as_bytes())]);
        assert_eq!(decode_png_text(&png).get("PNG:Title"), Some("猫"));
    }

    #[test]
    fn decodes_ztxt_chunk() {
        let mut payload = b"prompt\x00\x00".to_vec();
        payload.extend(zlib(b"{\"3\": {\"class_type\": \"KSampler\"}}"));
        let png = build_png(&[png_chunk(b"zTXt", &payload)]);
        let fields = decode_png_text(&png);
        assert_eq!(
            fields.get("PNG:prompt"),
            Some("{\"3\": {\"class_type\": \"KSampler\"}}")
        );
    }

    #[test]
    fn decodes_uncompressed_itxt() {
        let png = build_png(&[png_chunk(
            b"iTXt",
            &itxt_payload("Description", false, "en", "Beschreibung", b"International text"),
        )]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:Description"), Some("International text"));
    }

    #[test]
    fn decodes_compressed_itxt() {
        let compressed = zlib("masterpiece, 猫".as_bytes());
        let png = build_png(&[png_chunk(
            b"iTXt",
            &itxt_payload("parameters", true, "", "", &compressed),
        )]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:parameters"), Some("masterpiece, 猫"));
    }

    #[test]
    fn bad_ztxt_yields_placeholder_and_parsing_continues() {
        let png = build_png(&[
            png_chunk(b"zTXt", b"broken\x00\x00not zlib data"),
            png_chunk(b"tEXt", b"after\x00still here"),
        ]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:broken"), Some(INFLATE_FAILED_PLACEHOLDER));
        assert_eq!(fields.get("PNG:after"), Some("still here"));
    }

    #[test]
    fn bad_compressed_itxt_yields_placeholder() {
        let png = build_png(&[png_chunk(
            b"iTXt",
            &itxt_payload("parameters", true, "", "", b"\x00\x01garbage"),
        )]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:parameters"), Some(INFLATE_FAILED_PLACEHOLDER));
    }

    #[test]
    fn malformed_chunk_is_skipped_without_desync() {
        let png = build_png(&[
            // no NUL separator: contributes nothing
            png_chunk(b"tEXt", b"no separator here"),
            // truncated iTXt header
            png_chunk(b"iTXt", b"key\x00"),
            png_chunk(b"tEXt", b"ok\x00fine"),
        ]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("PNG:ok"), Some("fine"));
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let png = build_png(&[
            png_chunk(b"gAMA", &[0, 0, 0xB1, 0x8F]),
            png_chunk(b"tEXt", b"Software\x00ComfyUI"),
        ]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:Software"), Some("ComfyUI"));
    }

    #[test]
    fn stops_at_iend() {
        let mut png = build_png(&[png_chunk(b"tEXt", b"before\x00yes")]);
        // build_png appends IEND; anything after it is ignored
        png.extend(png_chunk(b"tEXt", b"after\x00no"));
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:before"), Some("yes"));
        assert_eq!(fields.get("PNG:after"), None);
    }

    #[test]
    fn later_chunk_overwrites_same_keyword() {
        let png = build_png(&[
            png_chunk(b"tEXt", b"parameters\x00first"),
            png_chunk(b"tEXt", b"Software\x00x"),
            png_chunk(b"tEXt", b"parameters\x00second"),
        ]);
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:parameters"), Some("second"));
        let keys: Vec<&str> = fields.keys().collect();
        assert_eq!(keys, vec!["PNG:parameters", "PNG:Software"]);
    }

    #[test]
    fn truncated_chunk_ends_parse_gracefully() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(png_chunk(b"tEXt", b"a\x00b"));
        // declares 1000 bytes but the buffer ends
        png.extend_from_slice(&1000u32.to_be_bytes());
        png.extend_from_slice(b"tEXt");
        png.extend_from_slice(b"c\x00d");
        let fields = decode_png_text(&png);
        assert_eq!(fields.get("PNG:a"), Some("b"));
        assert_eq!(fields.get("PNG:c"), None);
    }
}
