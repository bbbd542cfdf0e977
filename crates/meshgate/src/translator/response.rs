// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Mesh read-attribute-response to wire payload.
//!
//! The raw response is a run of records: attribute id (LE u16), status
//! byte, and for successful records a data type byte plus the value. The
//! output is a map of `{attributeId: {"v": value}}` entries. Non-success
//! records are skipped entirely; an unrecognized data type truncates the
//! output at that record, closing open structures rather than failing.

use crate::cbor::CborWriter;
use crate::error::{Error, Result};
use crate::mesh::data_type;

/// Record status meaning success; everything else is skipped.
const STATUS_SUCCESS: u8 = 0x00;

/// Key under which the attribute value is nested.
const VALUE_KEY: &str = "v";

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.offset + len > self.data.len() {
            return Err(Error::Decode {
                reason: format!("attribute record truncated at offset {}", self.offset),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
}

/// Translate a read-attribute-response payload into `buf`, returning the
/// encoded length. Codec failures close open structures before
/// propagating so a partial map is never left dangling.
pub fn encode_read_response(payload: &[u8], buf: &mut [u8]) -> Result<usize> {
    let mut writer = CborWriter::new(buf);
    writer.map_open()?;
    let mut cursor = Cursor {
        data: payload,
        offset: 0,
    };

    while cursor.remaining() > 0 {
        match encode_next(&mut writer, &mut cursor) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                // Close what is open so a partial map is never sent as
                // success, then report the one failure.
                let _ = writer.brk();
                return Err(err);
            }
        }
    }

    writer.brk()?;
    Ok(writer.offset())
}

/// Consume one record. `Ok(false)` means an unknown type truncated the
/// walk; the writer is untouched for that record.
fn encode_next(writer: &mut CborWriter<'_>, cursor: &mut Cursor<'_>) -> Result<bool> {
    let attr = cursor.u16_le()?;
    let status = cursor.u8()?;
    if status != STATUS_SUCCESS {
        log::debug!(
            "[xlat] skipping attr {:#06x} with status {:#04x}",
            attr,
            status
        );
        return Ok(true);
    }
    let dtype = cursor.u8()?;
    let kept = encode_record(writer, attr, dtype, cursor)?;
    if !kept {
        // Everything after an unknown type is unreadable.
        log::warn!(
            "[xlat] unknown data type {:#04x} for attr {:#06x}, truncating",
            dtype,
            attr
        );
    }
    Ok(kept)
}

/// Encode one successful record. Returns `Ok(false)` for an unrecognized
/// data type, before anything is written for the record.
fn encode_record(
    writer: &mut CborWriter<'_>,
    attr: u16,
    dtype: u8,
    cursor: &mut Cursor<'_>,
) -> Result<bool> {
    // Recognize (and pull) the value before touching the writer so an
    // unknown type leaves the output untouched.
    let value = match read_value(dtype, cursor)? {
        Some(v) => v,
        None => return Ok(false),
    };

    writer.uint16(attr)?;
    writer.map_open()?;
    let body = write_value(writer, &value);
    if body.is_err() {
        let _ = writer.brk();
        return body.map(|_| true);
    }
    writer.brk()?;
    Ok(true)
}

/// A decoded attribute value, pending CBOR encoding.
enum Value<'a> {
    Bool(bool),
    Uint(u64),
    Int(i64),
    HalfBits(u16),
    Float(f32),
    Double(f64),
    Octets(&'a [u8]),
    Text(&'a str),
}

fn read_value<'a>(dtype: u8, cursor: &mut Cursor<'a>) -> Result<Option<Value<'a>>> {
    let value = match dtype {
        data_type::BOOL => Value::Bool(cursor.u8()? != 0),
        t @ 0x20..=0x27 => {
            // Unsigned, 1..=8 bytes little-endian.
            let width = (t - 0x20) as usize + 1;
            let raw = cursor.take(width)?;
            let mut bytes = [0u8; 8];
            bytes[..width].copy_from_slice(raw);
            Value::Uint(u64::from_le_bytes(bytes))
        }
        t @ 0x28..=0x2F => {
            // Signed, 1..=8 bytes little-endian, sign-extended.
            let width = (t - 0x28) as usize + 1;
            let raw = cursor.take(width)?;
            let fill = if raw[width - 1] & 0x80 != 0 { 0xFF } else { 0x00 };
            let mut bytes = [fill; 8];
            bytes[..width].copy_from_slice(raw);
            Value::Int(i64::from_le_bytes(bytes))
        }
        data_type::FLOAT16 => {
            let b = cursor.take(2)?;
            Value::HalfBits(u16::from_le_bytes([b[0], b[1]]))
        }
        data_type::FLOAT32 => {
            let b = cursor.take(4)?;
            Value::Float(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        }
        data_type::FLOAT64 => {
            let b = cursor.take(8)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(b);
            Value::Double(f64::from_le_bytes(bytes))
        }
        data_type::OCTET_STRING | data_type::CHAR_STRING => {
            let len = cursor.u8()?;
            // All-ones length is the "undefined / empty" sentinel.
            let raw = if len == 0xFF { &[][..] } else { cursor.take(len as usize)? };
            string_value(dtype == data_type::CHAR_STRING, raw)?
        }
        data_type::LONG_OCTET_STRING | data_type::LONG_CHAR_STRING => {
            let len = cursor.u16_le()?;
            let raw = if len == 0xFFFF {
                &[][..]
            } else {
                cursor.take(len as usize)?
            };
            string_value(dtype == data_type::LONG_CHAR_STRING, raw)?
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn string_value(text: bool, raw: &[u8]) -> Result<Value<'_>> {
    if text {
        let s = core::str::from_utf8(raw).map_err(|_| Error::Decode {
            reason: "character string is not utf-8".into(),
        })?;
        Ok(Value::Text(s))
    } else {
        Ok(Value::Octets(raw))
    }
}

fn write_value(writer: &mut CborWriter<'_>, value: &Value<'_>) -> Result<()> {
    writer.text(VALUE_KEY)?;
    match value {
        Value::Bool(b) => writer.boolean(*b),
        Value::Uint(v) => writer.uint64(*v),
        Value::Int(v) => writer.int64(*v),
        Value::HalfBits(bits) => writer.half_bits(*bits),
        Value::Float(v) => writer.float(*v),
        Value::Double(v) => writer.double(*v),
        Value::Octets(raw) => writer.bytes(raw),
        Value::Text(s) => writer.text(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let len = encode_read_response(payload, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_single_bool_record() {
        // attr 0x0000, success, BOOL, value 1
        let out = encode(&[0x00, 0x00, 0x00, 0x10, 0x01]);
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0xF5, 0xFF, 0xFF]);
    }

    #[test]
    fn test_u16_record_minimal_width() {
        // attr 0x0011, success, U16, value 0x0200
        let out = encode(&[0x11, 0x00, 0x00, 0x21, 0x00, 0x02]);
        assert_eq!(
            out,
            [0xBF, 0x11, 0xBF, 0x61, b'v', 0x19, 0x02, 0x00, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_signed_record_sign_extended() {
        // attr 0x0000, success, I16, value -100 (0x9C 0xFF)
        let out = encode(&[0x00, 0x00, 0x00, 0x29, 0x9C, 0xFF]);
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0x38, 0x63, 0xFF, 0xFF]);
    }

    #[test]
    fn test_half_float_passthrough() {
        // FLOAT16 value 1.0 = 0x3C00, little-endian on the mesh side
        let out = encode(&[0x00, 0x00, 0x00, 0x38, 0x00, 0x3C]);
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0xF9, 0x3C, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_string_forms_and_empty_sentinels() {
        // short char string "ok"
        let out = encode(&[0x00, 0x00, 0x00, 0x42, 0x02, b'o', b'k']);
        assert_eq!(
            out,
            [0xBF, 0x00, 0xBF, 0x61, b'v', 0x62, b'o', b'k', 0xFF, 0xFF]
        );
        // 0xFF length sentinel means empty
        let out = encode(&[0x00, 0x00, 0x00, 0x42, 0xFF]);
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0x60, 0xFF, 0xFF]);
        // long octet string with 2-byte length
        let out = encode(&[0x00, 0x00, 0x00, 0x43, 0x02, 0x00, 0xDE, 0xAD]);
        assert_eq!(
            out,
            [0xBF, 0x00, 0xBF, 0x61, b'v', 0x42, 0xDE, 0xAD, 0xFF, 0xFF]
        );
        // 0xFFFF sentinel means empty
        let out = encode(&[0x00, 0x00, 0x00, 0x44, 0xFF, 0xFF]);
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0x60, 0xFF, 0xFF]);
    }

    #[test]
    fn test_non_success_record_excluded() {
        // attr 0 unsupported (0x86), attr 1 success BOOL true
        let payload = [0x00, 0x00, 0x86, 0x01, 0x00, 0x00, 0x10, 0x01];
        let out = encode(&payload);
        assert_eq!(out, [0xBF, 0x01, 0xBF, 0x61, b'v', 0xF5, 0xFF, 0xFF]);
    }

    #[test]
    fn test_unknown_type_truncates_with_closed_map() {
        // record 0: BOOL true; record 1: type 0xEE (unknown)
        let payload = [
            0x00, 0x00, 0x00, 0x10, 0x01, // ok
            0x01, 0x00, 0x00, 0xEE, 0x99, // unknown type
        ];
        let out = encode(&payload);
        // Only record 0, and the map is properly closed.
        assert_eq!(out, [0xBF, 0x00, 0xBF, 0x61, b'v', 0xF5, 0xFF, 0xFF]);
    }

    #[test]
    fn test_truncated_record_is_decode_error() {
        let mut buf = [0u8; 64];
        let err = encode_read_response(&[0x00, 0x00, 0x00, 0x21, 0x01], &mut buf);
        assert!(matches!(err, Err(Error::Decode { .. })));
    }

    #[test]
    fn test_buffer_exhaustion_reports_error() {
        let mut buf = [0u8; 4];
        let err = encode_read_response(&[0x00, 0x00, 0x00, 0x10, 0x01], &mut buf);
        assert!(matches!(err, Err(Error::BufferFull { .. })));
    }
}
