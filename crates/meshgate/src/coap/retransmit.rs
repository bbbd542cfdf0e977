// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Confirmable-message retransmission queue.
//!
//! One queue per listener port. Each pending entry keeps the serialized
//! datagram and re-sends it with a doubling timeout until acknowledged or
//! out of attempts.

use crate::config::{ACK_TIMEOUT, MAX_RETRANSMIT, RETRANSMIT_QUEUE_CAPACITY};
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Instant;

/// A confirmable send awaiting acknowledgement.
#[derive(Debug)]
struct Pending {
    message_id: u16,
    dest: SocketAddr,
    data: Vec<u8>,
    next_at: Instant,
    timeout: std::time::Duration,
    retries_left: u8,
}

/// Bounded queue of unacknowledged confirmable sends.
#[derive(Debug, Default)]
pub struct RetransmitQueue {
    entries: Vec<Pending>,
}

impl RetransmitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track a freshly sent confirmable datagram.
    pub fn push(&mut self, message_id: u16, dest: SocketAddr, data: Vec<u8>, now: Instant) -> Result<()> {
        if self.entries.len() >= RETRANSMIT_QUEUE_CAPACITY {
            return Err(Error::Capacity {
                what: "retransmit queue",
            });
        }
        self.entries.push(Pending {
            message_id,
            dest,
            data,
            next_at: now + ACK_TIMEOUT,
            timeout: ACK_TIMEOUT,
            retries_left: MAX_RETRANSMIT,
        });
        Ok(())
    }

    /// Drop the entry matched by an incoming ACK or RST.
    pub fn acknowledge(&mut self, message_id: u16) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.message_id != message_id);
        before != self.entries.len()
    }

    /// Collect datagrams due for another attempt. Entries out of attempts
    /// are dropped with a warning.
    pub fn due(&mut self, now: Instant) -> Vec<(SocketAddr, Vec<u8>)> {
        let mut out = Vec::new();
        self.entries.retain_mut(|entry| {
            if now < entry.next_at {
                return true;
            }
            if entry.retries_left == 0 {
                log::warn!(
                    "[coap] giving up on mid={:#06x} to {} after {} attempts",
                    entry.message_id,
                    entry.dest,
                    MAX_RETRANSMIT
                );
                return false;
            }
            entry.retries_left -= 1;
            entry.timeout *= 2;
            entry.next_at = now + entry.timeout;
            out.push((entry.dest, entry.data.clone()));
            true
        });
        out
    }

    /// Earliest pending deadline, for event-loop timeout computation.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.next_at).min()
    }
}
