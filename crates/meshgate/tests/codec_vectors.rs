// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Golden byte vectors for the attribute-response translation.
//!
//! Each case feeds a raw mesh read-attribute-response and pins the exact
//! CBOR bytes produced, covering every supported value type and the
//! boundary lengths of both string forms.

use meshgate::translator::response::encode_read_response;

fn translate(payload: &[u8]) -> Vec<u8> {
    let mut buf = [0u8; 1152];
    let len = encode_read_response(payload, &mut buf).expect("translation failed");
    buf[..len].to_vec()
}

/// `{attr: {"v": ...}}` wrapper around an expected value encoding.
fn wrapped(attr_bytes: &[u8], value_bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![0xBF];
    out.extend_from_slice(attr_bytes);
    out.push(0xBF);
    out.extend_from_slice(&[0x61, b'v']);
    out.extend_from_slice(value_bytes);
    out.extend_from_slice(&[0xFF, 0xFF]);
    out
}

#[test]
fn bool_values() {
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x10, 0x01]),
        wrapped(&[0x00], &[0xF5])
    );
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x10, 0x00]),
        wrapped(&[0x00], &[0xF4])
    );
}

#[test]
fn unsigned_widths_encode_minimal() {
    // U8 23 stays inline
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x20, 0x17]),
        wrapped(&[0x00], &[0x17])
    );
    // U8 24 takes the 1-byte extension
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x20, 0x18]),
        wrapped(&[0x00], &[0x18, 0x18])
    );
    // U16 256 takes the 2-byte extension
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x21, 0x00, 0x01]),
        wrapped(&[0x00], &[0x19, 0x01, 0x00])
    );
    // U32 65536 takes the 4-byte extension
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x23, 0x00, 0x00, 0x01, 0x00]),
        wrapped(&[0x00], &[0x1A, 0x00, 0x01, 0x00, 0x00])
    );
    // U32 small magnitude must not widen
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x23, 0x05, 0x00, 0x00, 0x00]),
        wrapped(&[0x00], &[0x05])
    );
    // U64 2^32 takes the 8-byte form
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x27, 0, 0, 0, 0, 1, 0, 0, 0]),
        wrapped(
            &[0x00],
            &[0x1B, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        )
    );
}

#[test]
fn signed_widths_sign_extend() {
    // I8 -1
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x28, 0xFF]),
        wrapped(&[0x00], &[0x20])
    );
    // I16 -100
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x29, 0x9C, 0xFF]),
        wrapped(&[0x00], &[0x38, 0x63])
    );
    // I32 positive passes through as uint
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x2B, 0x2A, 0x00, 0x00, 0x00]),
        wrapped(&[0x00], &[0x18, 0x2A])
    );
    // I64 minimum
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x2F, 0, 0, 0, 0, 0, 0, 0, 0x80]),
        wrapped(
            &[0x00],
            &[0x3B, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        )
    );
}

#[test]
fn float_forms() {
    // FLOAT16 1.0 (0x3C00 LE on the mesh) passes its bits through
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x38, 0x00, 0x3C]),
        wrapped(&[0x00], &[0xF9, 0x3C, 0x00])
    );
    // FLOAT32 1.0
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x39, 0x00, 0x00, 0x80, 0x3F]),
        wrapped(&[0x00], &[0xFA, 0x3F, 0x80, 0x00, 0x00])
    );
    // FLOAT64 1.0
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x3A, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F]),
        wrapped(
            &[0x00],
            &[0xFB, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        )
    );
}

#[test]
fn string_boundary_lengths() {
    // Zero-length short form
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x42, 0x00]),
        wrapped(&[0x00], &[0x60])
    );
    // 23 bytes: inline CBOR length
    let mut payload = vec![0x00, 0x00, 0x00, 0x42, 23];
    payload.extend_from_slice(&[b'a'; 23]);
    let mut value = vec![0x77];
    value.extend_from_slice(&[b'a'; 23]);
    assert_eq!(translate(&payload), wrapped(&[0x00], &value));

    // 24 bytes: 1-byte CBOR length extension
    let mut payload = vec![0x00, 0x00, 0x00, 0x42, 24];
    payload.extend_from_slice(&[b'a'; 24]);
    let mut value = vec![0x78, 24];
    value.extend_from_slice(&[b'a'; 24]);
    assert_eq!(translate(&payload), wrapped(&[0x00], &value));

    // Long form with a 2-byte mesh length prefix
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x43, 0x02, 0x00, 0xDE, 0xAD]),
        wrapped(&[0x00], &[0x42, 0xDE, 0xAD])
    );
}

#[test]
fn undefined_length_sentinels_mean_empty() {
    // 0xFF in the 1-byte form
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x42, 0xFF]),
        wrapped(&[0x00], &[0x60])
    );
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x41, 0xFF]),
        wrapped(&[0x00], &[0x40])
    );
    // 0xFFFF in the 2-byte form
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x44, 0xFF, 0xFF]),
        wrapped(&[0x00], &[0x60])
    );
    assert_eq!(
        translate(&[0x00, 0x00, 0x00, 0x43, 0xFF, 0xFF]),
        wrapped(&[0x00], &[0x40])
    );
}

#[test]
fn multi_record_payload() {
    // attr 0: U8 1; attr 0x11: BOOL true
    let payload = [
        0x00, 0x00, 0x00, 0x20, 0x01, // attr 0
        0x11, 0x00, 0x00, 0x10, 0x01, // attr 0x11
    ];
    let expected = [
        0xBF, // map
        0x00, 0xBF, 0x61, b'v', 0x01, 0xFF, // attr 0
        0x11, 0xBF, 0x61, b'v', 0xF5, 0xFF, // attr 0x11
        0xFF, // close
    ];
    assert_eq!(translate(&payload), expected);
}

#[test]
fn empty_payload_is_empty_map() {
    assert_eq!(translate(&[]), vec![0xBF, 0xFF]);
}
