// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Bounds-checked CBOR reader over a borrowed buffer.
//!
//! The reader is initialized over a payload expected to carry a top-level
//! map and then pulls scalars in the order the caller knows them to appear.
//! Cursor overrun and major-type mismatch both surface as `Error::Decode`.

use super::{
    BREAK, INFO_INDEFINITE, MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGINT, MAJOR_SIMPLE, MAJOR_TEXT,
    MAJOR_UINT, SIMPLE_FALSE, SIMPLE_TRUE,
};
use crate::error::{Error, Result};

/// CBOR reader positioned inside a top-level map.
pub struct CborReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> CborReader<'a> {
    /// Initialize over `buf`, consuming the top-level map header.
    ///
    /// Both indefinite-length and small definite-length maps are accepted;
    /// pairs are read sequentially either way.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut reader = Self { buf, offset: 0 };
        let (major, _info, _value) = reader.head()?;
        if major != MAJOR_MAP {
            return Err(Error::Decode {
                reason: format!("expected top-level map, got major type {}", major),
            });
        }
        Ok(reader)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// True when the next byte is the break closing the current container.
    pub fn at_break(&self) -> bool {
        self.buf.get(self.offset) == Some(&BREAK)
    }

    /// Consume a break byte.
    pub fn skip_break(&mut self) -> Result<()> {
        if !self.at_break() {
            return Err(Error::Decode {
                reason: "expected break".into(),
            });
        }
        self.offset += 1;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.offset + len > self.buf.len() {
            return Err(Error::Decode {
                reason: format!("cursor overrun at offset {}", self.offset),
            });
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read one head byte plus its extension: (major, info, value).
    ///
    /// Indefinite containers report value 0 with info 31; reserved info
    /// values 28-30 are rejected.
    fn head(&mut self) -> Result<(u8, u8, u64)> {
        let byte = self.take(1)?[0];
        let major = byte >> 5;
        let info = byte & 0x1F;
        let value = match info {
            0..=23 => u64::from(info),
            24 => u64::from(self.take(1)?[0]),
            25 => {
                let b = self.take(2)?;
                u64::from(u16::from_be_bytes([b[0], b[1]]))
            }
            26 => {
                let b = self.take(4)?;
                u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            27 => {
                let b = self.take(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            INFO_INDEFINITE => 0,
            _ => {
                return Err(Error::Decode {
                    reason: format!("reserved additional info {}", info),
                })
            }
        };
        Ok((major, info, value))
    }

    /// Read an unsigned integer of any wire width.
    pub fn uint(&mut self) -> Result<u64> {
        let (major, _info, value) = self.head()?;
        if major != MAJOR_UINT {
            return Err(Error::Decode {
                reason: format!("expected unsigned integer, got major type {}", major),
            });
        }
        Ok(value)
    }

    /// Read a signed integer; negative magnitudes are stored as -(n+1).
    pub fn int(&mut self) -> Result<i64> {
        let (major, _info, value) = self.head()?;
        match major {
            MAJOR_UINT => i64::try_from(value).map_err(|_| Error::Decode {
                reason: "integer out of i64 range".into(),
            }),
            MAJOR_NEGINT => {
                let magnitude = i64::try_from(value).map_err(|_| Error::Decode {
                    reason: "integer out of i64 range".into(),
                })?;
                Ok(-1 - magnitude)
            }
            other => Err(Error::Decode {
                reason: format!("expected integer, got major type {}", other),
            }),
        }
    }

    /// Read a definite-length byte string.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let (major, info, len) = self.head()?;
        if major != MAJOR_BYTES || info == INFO_INDEFINITE {
            return Err(Error::Decode {
                reason: "expected definite-length byte string".into(),
            });
        }
        self.take(len as usize)
    }

    /// Read a definite-length text string.
    pub fn text(&mut self) -> Result<&'a str> {
        let (major, info, len) = self.head()?;
        if major != MAJOR_TEXT || info == INFO_INDEFINITE {
            return Err(Error::Decode {
                reason: "expected definite-length text string".into(),
            });
        }
        let raw = self.take(len as usize)?;
        core::str::from_utf8(raw).map_err(|_| Error::Decode {
            reason: "text string is not utf-8".into(),
        })
    }

    pub fn boolean(&mut self) -> Result<bool> {
        let (major, info, _value) = self.head()?;
        if major != MAJOR_SIMPLE {
            return Err(Error::Decode {
                reason: format!("expected boolean, got major type {}", major),
            });
        }
        match info {
            SIMPLE_FALSE => Ok(false),
            SIMPLE_TRUE => Ok(true),
            other => Err(Error::Decode {
                reason: format!("expected boolean, got simple value {}", other),
            }),
        }
    }
}
