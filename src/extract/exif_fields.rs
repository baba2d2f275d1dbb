//! Adapter over `kamadak-exif`: typed EXIF fields → [`MetadataValue`].
//!
//! The parser's own value enum is converted at this boundary so the rest of
//! the crate only sees the tagged union from [`crate::metadata`]:
//!
//! | EXIF type | MetadataValue |
//! |---|---|
//! | ASCII (date tags) | `Date` (falls back to `Text` if unparseable) |
//! | ASCII | `Text` |
//! | `UserComment` | `Text` decoded from its 8-byte charset header |
//! | BYTE / UNDEFINED | `Binary` |
//! | single SHORT/LONG/… | `Integer` |
//! | single RATIONAL/FLOAT | `Float` |
//! | multi-valued numerics | `Structured` (JSON array) |
//!
//! Only the primary image IFD is read; thumbnail IFD tags would duplicate it.

use super::ExtractError;
use crate::metadata::MetadataValue;
use chrono::{NaiveDate, TimeZone, Utc};
use exif::{Field, In, Tag, Value};
use std::io::Cursor;

/// Read all primary-IFD EXIF fields from an image buffer.
///
/// A file without EXIF data is not an error: it yields an empty list.
pub fn read_exif_fields(data: &[u8]) -> Result<Vec<(String, MetadataValue)>, ExtractError> {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(ExtractError::Exif(e)),
    };

    Ok(exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .map(|f| (f.tag.to_string(), convert_field(f)))
        .collect())
}

fn convert_field(field: &Field) -> MetadataValue {
    if field.tag == Tag::UserComment {
        if let Value::Undefined(bytes, _) = &field.value {
            return decode_user_comment(bytes);
        }
    }
    if is_date_tag(field.tag) {
        if let Value::Ascii(lines) = &field.value {
            if let Some(date) = lines.first().and_then(|l| parse_exif_date(l)) {
                return date;
            }
        }
    }
    convert_value(&field.value)
}

fn is_date_tag(tag: Tag) -> bool {
    tag == Tag::DateTime || tag == Tag::DateTimeOriginal || tag == Tag::DateTimeDigitized
}

fn convert_value(value: &Value) -> MetadataValue {
    match value {
        Value::Ascii(lines) => {
            let text: Vec<String> = lines
                .iter()
                .map(|l| String::from_utf8_lossy(l).trim_end_matches('\0').to_string())
                .collect();
            MetadataValue::Text(text.join("\n"))
        }
        Value::Byte(bytes) | Value::Undefined(bytes, _) => MetadataValue::Binary(bytes.clone()),
        Value::Short(v) => integers(v.iter().map(|&n| n as i64)),
        Value::Long(v) => integers(v.iter().map(|&n| n as i64)),
        Value::SByte(v) => integers(v.iter().map(|&n| n as i64)),
        Value::SShort(v) => integers(v.iter().map(|&n| n as i64)),
        Value::SLong(v) => integers(v.iter().map(|&n| n as i64)),
        Value::Rational(v) => floats(v.iter().map(|r| r.to_f64())),
        Value::SRational(v) => floats(v.iter().map(|r| r.to_f64())),
        Value::Float(v) => floats(v.iter().map(|&f| f as f64)),
        Value::Double(v) => floats(v.iter().copied()),
        _ => MetadataValue::Null,
    }
}

fn integers(values: impl Iterator<Item = i64>) -> MetadataValue {
    let values: Vec<i64> = values.collect();
    match values.as_slice() {
        [] => MetadataValue::Null,
        [single] => MetadataValue::Integer(*single),
        many => MetadataValue::Structured(serde_json::json!(many)),
    }
}

fn floats(values: impl Iterator<Item = f64>) -> MetadataValue {
    let values: Vec<f64> = values.collect();
    match values.as_slice() {
        [] => MetadataValue::Null,
        [single] => MetadataValue::Float(*single),
        many => MetadataValue::Structured(serde_json::json!(many)),
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS` as UTC.
fn parse_exif_date(ascii: &[u8]) -> Option<MetadataValue> {
    let dt = exif::DateTime::from_ascii(ascii).ok()?;
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)?;
    Some(MetadataValue::Date(Utc.from_utc_datetime(&naive)))
}

/// Decode an EXIF `UserComment`: 8-byte charset id followed by the text.
///
/// A1111-style JPEG/WebP exports put the whole generation prompt here,
/// usually as `UNICODE` (UTF-16).
fn decode_user_comment(bytes: &[u8]) -> MetadataValue {
    if bytes.len() < 8 {
        return MetadataValue::Binary(bytes.to_vec());
    }
    let (header, body) = bytes.split_at(8);
    let text = match header {
        b"UNICODE\0" => decode_utf16_guess(body),
        b"ASCII\0\0\0" | b"\0\0\0\0\0\0\0\0" => String::from_utf8_lossy(body).into_owned(),
        _ => return MetadataValue::Binary(bytes.to_vec()),
    };
    MetadataValue::Text(text.trim_end_matches('\0').trim_end().to_string())
}

/// UTF-16 with the byte order guessed from where the zero bytes fall.
///
/// Mostly-ASCII text in big-endian has its zero bytes at even offsets.
fn decode_utf16_guess(bytes: &[u8]) -> String {
    let even_zeros = bytes.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_zeros = bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
    let big_endian = even_zeros > odd_zeros;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
