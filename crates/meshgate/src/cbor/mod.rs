// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Restricted CBOR codec for CoAP payloads.
//!
//! Wire payloads are self-describing binary maps: a top-level map holding
//! unsigned/signed integers, booleans, byte/text strings, and half/single/
//! double floats, with container structures opened indefinite-length and
//! closed by an explicit break. Only the subset the gateway actually
//! exchanges is implemented; anything else is a decode error.
//!
//! Encoding is byte-exact: the minimal-width integer rule (inline below 24,
//! then 1/2/4/8-byte extensions at 256 / 65536 / 2^32) is pinned by golden
//! vectors in `tests/codec_vectors.rs`.

pub mod reader;
pub mod writer;

pub use reader::CborReader;
pub use writer::CborWriter;

/// Major type tags (shifted into the top 3 bits of the head byte).
pub(crate) const MAJOR_UINT: u8 = 0;
pub(crate) const MAJOR_NEGINT: u8 = 1;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_TEXT: u8 = 3;
pub(crate) const MAJOR_ARRAY: u8 = 4;
pub(crate) const MAJOR_MAP: u8 = 5;
pub(crate) const MAJOR_SIMPLE: u8 = 7;

/// Additional-info value marking an indefinite-length container.
pub(crate) const INFO_INDEFINITE: u8 = 31;

/// Break byte closing an indefinite-length container.
pub const BREAK: u8 = 0xFF;

/// Simple values (major type 7).
pub(crate) const SIMPLE_FALSE: u8 = 20;
pub(crate) const SIMPLE_TRUE: u8 = 21;

/// Convert an f32 to IEEE 754 binary16 bits, round-to-nearest-even.
///
/// Out-of-range magnitudes saturate to infinity; values below the smallest
/// half subnormal flush to signed zero.
pub(crate) fn f32_to_half_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mant = bits & 0x007F_FFFF;

    if exp == 255 {
        // Inf / NaN (NaN payload collapsed to a quiet NaN)
        return sign | 0x7C00 | u16::from(mant != 0) * 0x0200;
    }

    let unbiased = exp - 127;
    if unbiased > 15 {
        return sign | 0x7C00;
    }
    if unbiased >= -14 {
        let half_exp = ((unbiased + 15) as u16) << 10;
        let half_mant = (mant >> 13) as u16;
        let dropped = mant & 0x1FFF;
        let mut half = sign | half_exp | half_mant;
        if dropped > 0x1000 || (dropped == 0x1000 && half_mant & 1 == 1) {
            half += 1;
        }
        return half;
    }
    if unbiased < -24 {
        return sign;
    }

    // Subnormal half: shift the hidden-bit mantissa down, rounding.
    let full_mant = mant | 0x0080_0000;
    let shift = (-unbiased - 1) as u32;
    let half_mant = ((full_mant + (1 << (shift - 1))) >> shift) as u16;
    sign | half_mant
}
