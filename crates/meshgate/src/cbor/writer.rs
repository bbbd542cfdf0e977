// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Bounds-checked CBOR writer over a caller-provided buffer.
//!
//! Every write fails with `Error::BufferFull` once the buffer is exhausted.
//! The writer stays usable after a failure so callers can still attempt to
//! close open structures instead of aborting silently; the translator relies
//! on this when it has to truncate a partially built response.

use super::{
    f32_to_half_bits, BREAK, INFO_INDEFINITE, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGINT,
    MAJOR_TEXT, MAJOR_UINT,
};
use crate::error::{Error, Result};

/// One row of the minimal-width encoding rule.
///
/// The first row whose `limit` exceeds the magnitude decides the wire
/// width; magnitudes at or above every limit take the 8-byte form. The
/// boundary values (24, 256, 65536, 2^32) are exact-byte compatibility
/// requirements, not tuning knobs.
struct WidthRule {
    limit: u64,
    info: u8,
    bytes: usize,
}

/// Largest magnitude encoded inline in the head byte.
const INLINE_MAX: u64 = 23;

const WIDTH_RULES: &[WidthRule] = &[
    WidthRule {
        limit: 1 << 8,
        info: 24,
        bytes: 1,
    },
    WidthRule {
        limit: 1 << 16,
        info: 25,
        bytes: 2,
    },
    WidthRule {
        limit: 1 << 32,
        info: 26,
        bytes: 4,
    },
];

/// Generate per-width unsigned/signed entry points.
macro_rules! impl_write_uint {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> Result<()> {
            self.type_value(MAJOR_UINT, u64::from(value))
        }
    };
}

macro_rules! impl_write_int {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> Result<()> {
            let wide = i64::from(value);
            if wide < 0 {
                // Negative n is stored as the magnitude of -(n + 1).
                self.type_value(MAJOR_NEGINT, (-1 - wide) as u64)
            } else {
                self.type_value(MAJOR_UINT, wide as u64)
            }
        }
    };
}

/// CBOR writer over a fixed buffer.
pub struct CborWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> CborWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes written so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// Refuse a write up front so a failure never leaves a partial item
    /// in the buffer; callers still close open structures afterwards.
    fn ensure(&self, needed: usize) -> Result<()> {
        if self.offset + needed > self.buf.len() {
            return Err(Error::BufferFull {
                offset: self.offset,
            });
        }
        Ok(())
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        self.ensure(1)?;
        self.buf[self.offset] = byte;
        self.offset += 1;
        Ok(())
    }

    fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(data.len())?;
        self.buf[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Write a head byte plus minimal-width big-endian extension.
    fn type_value(&mut self, major: u8, value: u64) -> Result<()> {
        let tag = major << 5;
        if value <= INLINE_MAX {
            return self.put(tag | value as u8);
        }
        for rule in WIDTH_RULES {
            if value < rule.limit {
                self.ensure(1 + rule.bytes)?;
                self.put(tag | rule.info)?;
                let be = value.to_be_bytes();
                return self.put_slice(&be[8 - rule.bytes..]);
            }
        }
        self.ensure(9)?;
        self.put(tag | 27)?;
        self.put_slice(&value.to_be_bytes())
    }

    impl_write_uint!(uint8, u8);
    impl_write_uint!(uint16, u16);
    impl_write_uint!(uint32, u32);

    pub fn uint64(&mut self, value: u64) -> Result<()> {
        self.type_value(MAJOR_UINT, value)
    }

    impl_write_int!(int8, i8);
    impl_write_int!(int16, i16);
    impl_write_int!(int32, i32);

    pub fn int64(&mut self, value: i64) -> Result<()> {
        if value < 0 {
            self.type_value(MAJOR_NEGINT, (-1 - value) as u64)
        } else {
            self.type_value(MAJOR_UINT, value as u64)
        }
    }

    pub fn boolean(&mut self, value: bool) -> Result<()> {
        self.put(if value { 0xF5 } else { 0xF4 })
    }

    /// Definite-length text string. Length is inline below 24, else a
    /// 1-byte extension; anything longer than 255 bytes is refused.
    pub fn text(&mut self, value: &str) -> Result<()> {
        self.definite_string(MAJOR_TEXT, value.as_bytes())
    }

    /// Definite-length byte string, same length rules as [`Self::text`].
    pub fn bytes(&mut self, value: &[u8]) -> Result<()> {
        self.definite_string(MAJOR_BYTES, value)
    }

    fn definite_string(&mut self, major: u8, data: &[u8]) -> Result<()> {
        // The 1-byte length extension tops out at 255; longer input can
        // never fit this wire form, so it is the same class of refusal
        // as an exhausted buffer.
        if data.len() > 255 {
            return Err(Error::BufferFull {
                offset: self.offset,
            });
        }
        let header = if data.len() as u64 <= INLINE_MAX { 1 } else { 2 };
        self.ensure(header + data.len())?;
        self.type_value(major, data.len() as u64)?;
        self.put_slice(data)
    }

    /// Open an indefinite-length map; close with [`Self::brk`].
    pub fn map_open(&mut self) -> Result<()> {
        self.put((MAJOR_MAP << 5) | INFO_INDEFINITE)
    }

    /// Open an indefinite-length array; close with [`Self::brk`].
    pub fn array_open(&mut self) -> Result<()> {
        self.put((MAJOR_ARRAY << 5) | INFO_INDEFINITE)
    }

    /// Close the innermost open map or array.
    pub fn brk(&mut self) -> Result<()> {
        self.put(BREAK)
    }

    /// Half-precision float from f32 (converted round-to-nearest-even).
    pub fn half(&mut self, value: f32) -> Result<()> {
        self.half_bits(f32_to_half_bits(value))
    }

    /// Half-precision float from raw binary16 bits (pass-through for
    /// values already on the wire in half form).
    pub fn half_bits(&mut self, bits: u16) -> Result<()> {
        self.ensure(3)?;
        self.put(0xF9)?;
        self.put_slice(&bits.to_be_bytes())
    }

    pub fn float(&mut self, value: f32) -> Result<()> {
        self.ensure(5)?;
        self.put(0xFA)?;
        self.put_slice(&value.to_bits().to_be_bytes())
    }

    pub fn double(&mut self, value: f64) -> Result<()> {
        self.ensure(9)?;
        self.put(0xFB)?;
        self.put_slice(&value.to_bits().to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut CborWriter<'_>)) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let mut w = CborWriter::new(&mut buf);
        f(&mut w);
        let n = w.offset();
        buf[..n].to_vec()
    }

    #[test]
    fn test_uint_width_boundaries() {
        assert_eq!(written(|w| w.uint8(0).unwrap()), [0x00]);
        assert_eq!(written(|w| w.uint8(23).unwrap()), [0x17]);
        assert_eq!(written(|w| w.uint8(24).unwrap()), [0x18, 0x18]);
        assert_eq!(written(|w| w.uint8(255).unwrap()), [0x18, 0xFF]);
        assert_eq!(written(|w| w.uint16(256).unwrap()), [0x19, 0x01, 0x00]);
        assert_eq!(written(|w| w.uint16(65535).unwrap()), [0x19, 0xFF, 0xFF]);
        assert_eq!(
            written(|w| w.uint32(65536).unwrap()),
            [0x1A, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            written(|w| w.uint64(1 << 32).unwrap()),
            [0x1B, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_wide_entry_points_still_minimal() {
        // A u32 entry point with a small magnitude must not widen the wire form.
        assert_eq!(written(|w| w.uint32(5).unwrap()), [0x05]);
        assert_eq!(written(|w| w.uint64(300).unwrap()), [0x19, 0x01, 0x2C]);
    }

    #[test]
    fn test_negative_integers() {
        assert_eq!(written(|w| w.int8(-1).unwrap()), [0x20]);
        assert_eq!(written(|w| w.int8(-24).unwrap()), [0x37]);
        assert_eq!(written(|w| w.int8(-25).unwrap()), [0x38, 0x18]);
        assert_eq!(written(|w| w.int16(-256).unwrap()), [0x38, 0xFF]);
        assert_eq!(written(|w| w.int16(-257).unwrap()), [0x39, 0x01, 0x00]);
        assert_eq!(written(|w| w.int32(42).unwrap()), [0x18, 0x2A]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(written(|w| w.text("").unwrap()), [0x60]);
        assert_eq!(written(|w| w.text("v").unwrap()), [0x61, b'v']);
        assert_eq!(
            written(|w| w.bytes(&[0xDE, 0xAD]).unwrap()),
            [0x42, 0xDE, 0xAD]
        );
        // 24-byte string takes the 1-byte length extension
        let long = "abcdefghijklmnopqrstuvwx";
        let out = written(|w| w.text(long).unwrap());
        assert_eq!(out[0], 0x78);
        assert_eq!(out[1], 24);
    }

    #[test]
    fn test_overlong_string_refused() {
        let mut buf = [0u8; 512];
        let mut w = CborWriter::new(&mut buf);
        // 255 bytes is the 1-byte extension's ceiling; 256 is refused
        // without touching the buffer.
        let limit = vec![0u8; 255];
        w.bytes(&limit).unwrap();
        assert_eq!(w.offset(), 257);

        let mut w = CborWriter::new(&mut buf);
        let over = vec![0u8; 256];
        assert!(matches!(w.bytes(&over), Err(Error::BufferFull { offset: 0 })));
        assert_eq!(w.offset(), 0);
    }

    #[test]
    fn test_containers_and_simple() {
        assert_eq!(
            written(|w| {
                w.map_open().unwrap();
                w.uint8(1).unwrap();
                w.boolean(true).unwrap();
                w.brk().unwrap();
            }),
            [0xBF, 0x01, 0xF5, 0xFF]
        );
        assert_eq!(
            written(|w| {
                w.array_open().unwrap();
                w.boolean(false).unwrap();
                w.brk().unwrap();
            }),
            [0x9F, 0xF4, 0xFF]
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(written(|w| w.half(1.0).unwrap()), [0xF9, 0x3C, 0x00]);
        assert_eq!(
            written(|w| w.float(1.0).unwrap()),
            [0xFA, 0x3F, 0x80, 0x00, 0x00]
        );
        assert_eq!(
            written(|w| w.double(1.0).unwrap()),
            [0xFB, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_buffer_full_keeps_writer_usable() {
        let mut buf = [0u8; 2];
        let mut w = CborWriter::new(&mut buf);
        w.map_open().unwrap();
        // A 3-byte write cannot fit; offset must be untouched.
        assert!(matches!(
            w.uint16(0x1234),
            Err(Error::BufferFull { offset: 1 })
        ));
        // The caller can still close the open structure.
        w.brk().unwrap();
        assert_eq!(w.offset(), 2);
        assert_eq!(buf, [0xBF, 0xFF]);
    }
}
