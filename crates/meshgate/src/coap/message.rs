// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! CoAP message parsing and serialization (RFC 7252 subset).
//!
//! Covers the fixed header, token, delta-encoded options with the 13/14
//! extended forms, and the 0xFF payload marker. Option numbers beyond what
//! the gateway uses are carried opaquely.

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};
use std::fmt;

/// Protocol version carried in every header.
pub const VERSION: u8 = 1;

/// Observe registration option (RFC 7641).
pub const OPTION_OBSERVE: u16 = 6;
/// Uri-Path option: one length-prefixed path segment per occurrence.
pub const OPTION_URI_PATH: u16 = 11;
/// Content-Format option.
pub const OPTION_CONTENT_FORMAT: u16 = 12;

/// Content-Format id for CBOR payloads.
pub const CONTENT_FORMAT_CBOR: u8 = 60;
/// Content-Format id for application/link-format (.well-known/core).
pub const CONTENT_FORMAT_LINK: u8 = 40;

/// Message type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl MsgType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MsgType::Confirmable,
            1 => MsgType::NonConfirmable,
            2 => MsgType::Acknowledgement,
            _ => MsgType::Reset,
        }
    }

    fn bits(self) -> u8 {
        match self {
            MsgType::Confirmable => 0,
            MsgType::NonConfirmable => 1,
            MsgType::Acknowledgement => 2,
            MsgType::Reset => 3,
        }
    }
}

/// CoAP code: 3-bit class, 5-bit detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code(pub u8);

impl Code {
    pub const EMPTY: Code = Code(0x00);
    pub const GET: Code = Code(0x01);
    pub const POST: Code = Code(0x02);
    pub const PUT: Code = Code(0x03);
    pub const DELETE: Code = Code(0x04);
    /// 2.01 - command accepted.
    pub const CREATED: Code = Code(0x41);
    /// 2.05 - payload success.
    pub const CONTENT: Code = Code(0x45);
    /// 4.00
    pub const BAD_REQUEST: Code = Code(0x80);
    /// 4.04
    pub const NOT_FOUND: Code = Code(0x84);
    /// 4.05
    pub const METHOD_NOT_ALLOWED: Code = Code(0x85);
    /// 5.00
    pub const INTERNAL_ERROR: Code = Code(0xA0);
    /// 5.01
    pub const NOT_IMPLEMENTED: Code = Code(0xA1);
    /// 5.03
    pub const UNAVAILABLE: Code = Code(0xA3);
    /// 5.04 - a parked delayed response timed out.
    pub const GATEWAY_TIMEOUT: Code = Code(0xA4);

    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    pub fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    pub fn is_request(self) -> bool {
        self.class() == 0 && self.detail() != 0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

/// A parsed or under-construction CoAP message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub mtype: MsgType,
    pub code: Code,
    pub message_id: u16,
    pub token: Vec<u8>,
    /// (option number, value), kept sorted by number.
    pub options: Vec<(u16, Vec<u8>)>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(mtype: MsgType, code: Code, message_id: u16) -> Self {
        Self {
            mtype,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Build the matching response shell: piggybacked ACK for confirmable
    /// requests, NON otherwise. The token always mirrors the request.
    pub fn response_to(request: &Message, code: Code, message_id: u16) -> Self {
        let (mtype, mid) = match request.mtype {
            MsgType::Confirmable => (MsgType::Acknowledgement, request.message_id),
            _ => (MsgType::NonConfirmable, message_id),
        };
        let mut msg = Self::new(mtype, code, mid);
        msg.token = request.token.clone();
        msg
    }

    /// Empty ACK parking a confirmable request for a delayed answer.
    pub fn ack_empty(message_id: u16) -> Self {
        Self::new(MsgType::Acknowledgement, Code::EMPTY, message_id)
    }

    pub fn add_option(&mut self, number: u16, value: Vec<u8>) {
        let pos = self
            .options
            .iter()
            .position(|(n, _)| *n > number)
            .unwrap_or(self.options.len());
        self.options.insert(pos, (number, value));
    }

    /// Append Uri-Path options from a `/`-separated path.
    pub fn set_path(&mut self, path: &str) {
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.add_option(OPTION_URI_PATH, segment.as_bytes().to_vec());
        }
    }

    /// Uri-Path segments in order; non-UTF8 segments are dropped.
    pub fn path_segments(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|(n, _)| *n == OPTION_URI_PATH)
            .filter_map(|(_, v)| core::str::from_utf8(v).ok())
            .collect()
    }

    /// Observe option value, when present.
    pub fn observe(&self) -> Option<u32> {
        self.options
            .iter()
            .find(|(n, _)| *n == OPTION_OBSERVE)
            .map(|(_, v)| {
                let mut value = 0u32;
                for byte in v.iter().take(4) {
                    value = value << 8 | u32::from(*byte);
                }
                value
            })
    }

    /// Parse a datagram.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Protocol {
                reason: "datagram shorter than header".into(),
            });
        }
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(Error::Protocol {
                reason: format!("datagram of {} bytes exceeds limit", data.len()),
            });
        }
        let version = data[0] >> 6;
        if version != VERSION {
            return Err(Error::Protocol {
                reason: format!("unsupported version {}", version),
            });
        }
        let mtype = MsgType::from_bits(data[0] >> 4);
        let tkl = (data[0] & 0x0F) as usize;
        if tkl > 8 {
            return Err(Error::Protocol {
                reason: format!("token length {} out of range", tkl),
            });
        }
        let code = Code(data[1]);
        let message_id = u16::from_be_bytes([data[2], data[3]]);
        if data.len() < 4 + tkl {
            return Err(Error::Protocol {
                reason: "truncated token".into(),
            });
        }
        let token = data[4..4 + tkl].to_vec();

        let mut options = Vec::new();
        let mut offset = 4 + tkl;
        let mut number = 0u16;
        let mut payload = Vec::new();
        while offset < data.len() {
            let byte = data[offset];
            offset += 1;
            if byte == 0xFF {
                if offset == data.len() {
                    return Err(Error::Protocol {
                        reason: "payload marker with empty payload".into(),
                    });
                }
                payload = data[offset..].to_vec();
                break;
            }
            let delta = decode_nibble(byte >> 4, data, &mut offset)?;
            let length = decode_nibble(byte & 0x0F, data, &mut offset)? as usize;
            number = number.checked_add(delta).ok_or_else(|| Error::Protocol {
                reason: "option number overflow".into(),
            })?;
            if offset + length > data.len() {
                return Err(Error::Protocol {
                    reason: "truncated option value".into(),
                });
            }
            options.push((number, data[offset..offset + length].to_vec()));
            offset += length;
        }

        Ok(Self {
            mtype,
            code,
            message_id,
            token,
            options,
            payload,
        })
    }

    /// Serialize into a fresh buffer.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.token.len() > 8 {
            return Err(Error::Protocol {
                reason: "token longer than 8 bytes".into(),
            });
        }
        let mut out = Vec::with_capacity(4 + self.token.len() + self.payload.len() + 16);
        out.push(VERSION << 6 | self.mtype.bits() << 4 | self.token.len() as u8);
        out.push(self.code.0);
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&self.token);

        let mut previous = 0u16;
        for (number, value) in &self.options {
            let delta = number.checked_sub(previous).ok_or_else(|| Error::Protocol {
                reason: "options not sorted by number".into(),
            })?;
            encode_option(&mut out, delta, value);
            previous = *number;
        }

        if !self.payload.is_empty() {
            out.push(0xFF);
            out.extend_from_slice(&self.payload);
        }
        if out.len() > MAX_MESSAGE_SIZE {
            return Err(Error::Protocol {
                reason: format!("message of {} bytes exceeds limit", out.len()),
            });
        }
        Ok(out)
    }
}

/// Decode an option delta/length nibble with its extended forms.
fn decode_nibble(nibble: u8, data: &[u8], offset: &mut usize) -> Result<u16> {
    match nibble {
        0..=12 => Ok(u16::from(nibble)),
        13 => {
            let byte = *data.get(*offset).ok_or_else(|| Error::Protocol {
                reason: "truncated option extension".into(),
            })?;
            *offset += 1;
            Ok(u16::from(byte) + 13)
        }
        14 => {
            if *offset + 2 > data.len() {
                return Err(Error::Protocol {
                    reason: "truncated option extension".into(),
                });
            }
            let value = u16::from_be_bytes([data[*offset], data[*offset + 1]]);
            *offset += 2;
            value.checked_add(269).ok_or_else(|| Error::Protocol {
                reason: "option extension overflow".into(),
            })
        }
        _ => Err(Error::Protocol {
            reason: "reserved option nibble 15".into(),
        }),
    }
}

fn encode_nibble(value: u16) -> (u8, Option<Vec<u8>>) {
    match value {
        0..=12 => (value as u8, None),
        13..=268 => (13, Some(vec![(value - 13) as u8])),
        _ => (14, Some((value - 269).to_be_bytes().to_vec())),
    }
}

fn encode_option(out: &mut Vec<u8>, delta: u16, value: &[u8]) {
    let (delta_nibble, delta_ext) = encode_nibble(delta);
    let (len_nibble, len_ext) = encode_nibble(value.len() as u16);
    out.push(delta_nibble << 4 | len_nibble);
    if let Some(ext) = delta_ext {
        out.extend_from_slice(&ext);
    }
    if let Some(ext) = len_ext {
        out.extend_from_slice(&ext);
    }
    out.extend_from_slice(value);
}
