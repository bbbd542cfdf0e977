// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Device-originated commands toward the wire side.
//!
//! Cluster-specific mesh commands are re-expressed as unsolicited POSTs to
//! the remembered outbound server: the path is synthesized from
//! endpoint/cluster/command, and the flat little-endian argument block is
//! decoded per the inbound format table into a binary map keyed by
//! argument index.

use super::tables;
use crate::cbor::CborWriter;
use crate::error::{Error, Result};
use crate::mesh::CommandFrame;
use std::net::SocketAddr;

/// Scratch size for notification payloads.
const NOTIFY_BUF_SIZE: usize = 128;

/// Single-slot memory for the outbound server address.
///
/// Set explicitly through the resource directory or inferred from the
/// first inbound unicast; never overwritten once set.
#[derive(Debug, Default)]
pub struct OutboundSlot {
    addr: Option<SocketAddr>,
}

impl OutboundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Remember the outbound address. Returns false (and keeps the
    /// original) when one is already set.
    pub fn set(&mut self, addr: SocketAddr) -> bool {
        if let Some(existing) = self.addr {
            if existing != addr {
                log::debug!(
                    "[xlat] outbound address already {}, ignoring {}",
                    existing,
                    addr
                );
            }
            return false;
        }
        log::info!("[xlat] outbound server address set to {}", addr);
        self.addr = Some(addr);
        true
    }
}

/// A device command translated into an outbound POST.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub path: String,
    pub payload: Vec<u8>,
}

/// Translate one incoming mesh command. Global (non-cluster-specific)
/// frames and commands outside the inbound table are dropped.
pub fn build_notification(frame: &CommandFrame) -> Result<Option<Notification>> {
    if !frame.is_cluster_specific() {
        log::debug!(
            "[xlat] ignoring global command {:#04x} from {:#06x}",
            frame.command,
            frame.src_addr
        );
        return Ok(None);
    }
    let Some(format) = tables::inbound_format(frame.cluster, frame.command) else {
        log::debug!(
            "[xlat] no inbound format for cluster {:#06x} command {:#04x}",
            frame.cluster,
            frame.command
        );
        return Ok(None);
    };

    let path = format!(
        "e/{}/c{:x}/c/{:x}",
        frame.endpoint, frame.cluster, frame.command
    );
    let payload = encode_args(format, &frame.payload)?;
    Ok(Some(Notification { path, payload }))
}

/// Decode the flat argument block into a `{index: value}` binary map.
fn encode_args(format: &str, args: &[u8]) -> Result<Vec<u8>> {
    let mut buf = [0u8; NOTIFY_BUF_SIZE];
    let mut writer = CborWriter::new(&mut buf);
    writer.map_open()?;

    let mut offset = 0;
    for (index, spec) in format.chars().enumerate() {
        let width = tables::arg_width(spec).ok_or_else(|| Error::Protocol {
            reason: format!("bad format char {:?}", spec),
        })?;
        if offset + width > args.len() {
            return Err(Error::Decode {
                reason: format!("argument block truncated at {}", offset),
            });
        }
        let raw = &args[offset..offset + width];
        offset += width;

        writer.uint8(index as u8)?;
        if tables::arg_signed(spec) {
            let fill = if raw[width - 1] & 0x80 != 0 { 0xFF } else { 0x00 };
            let mut bytes = [fill; 8];
            bytes[..width].copy_from_slice(raw);
            writer.int64(i64::from_le_bytes(bytes))?;
        } else {
            let mut bytes = [0u8; 8];
            bytes[..width].copy_from_slice(raw);
            writer.uint64(u64::from_le_bytes(bytes))?;
        }
    }

    writer.brk()?;
    let len = writer.offset();
    Ok(buf[..len].to_vec())
}
