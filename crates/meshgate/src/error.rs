// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Crate-wide error taxonomy.
//!
//! Every fault in the gateway maps to one of these variants, and every
//! translator-level failure ultimately surfaces to the wire as a single
//! CoAP status code. Nothing here is allowed to take the process down:
//! a failed exchange answers with a 5.00-class code and the loop moves on.

use std::fmt;
use std::io;

/// Gateway error.
#[derive(Debug)]
pub enum Error {
    /// CBOR cursor overrun or major-type mismatch while reading.
    Decode { reason: String },
    /// Output buffer exhausted while encoding.
    BufferFull { offset: usize },
    /// Malformed path, unsupported method, or oversized request.
    Protocol { reason: String },
    /// Unknown device, endpoint, cluster, command, or attribute.
    Lookup { reason: String },
    /// A bounded wait elapsed without an answer.
    Timeout,
    /// Registry, queue, or port table is full.
    Capacity { what: &'static str },
    /// Socket-level failure.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode { reason } => write!(f, "decode failed: {}", reason),
            Error::BufferFull { offset } => write!(f, "buffer full at offset {}", offset),
            Error::Protocol { reason } => write!(f, "protocol error: {}", reason),
            Error::Lookup { reason } => write!(f, "lookup failed: {}", reason),
            Error::Timeout => write!(f, "timed out"),
            Error::Capacity { what } => write!(f, "capacity exhausted: {}", what),
            Error::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
