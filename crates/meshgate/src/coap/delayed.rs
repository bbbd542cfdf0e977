// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Single delayed-response slot.
//!
//! An attribute read cannot be answered until the device responds over the
//! mesh, so the gateway ACKs the request empty and parks the response
//! shell here. At most one exchange is in flight at a time: a second
//! request while the slot is occupied is refused up front (5.03), and a
//! slot past its deadline is flushed as 5.04 so the requester is never
//! left hanging.

use super::message::{Code, Message, MsgType};
use crate::config::DELAYED_RESPONSE_TIMEOUT;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Instant;

/// A parked exchange awaiting a mesh-side answer.
#[derive(Debug)]
pub struct DelayedExchange {
    /// Listener port index the request arrived on.
    pub port: usize,
    pub peer: SocketAddr,
    pub response: Message,
    deadline: Instant,
}

/// The slot itself.
#[derive(Debug, Default)]
pub struct DelayedSlot {
    parked: Option<DelayedExchange>,
}

impl DelayedSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.parked.is_some()
    }

    /// Park a response shell. Fails without touching the slot when an
    /// exchange is already pending.
    pub fn prepare(
        &mut self,
        port: usize,
        peer: SocketAddr,
        response: Message,
        now: Instant,
    ) -> Result<()> {
        if self.parked.is_some() {
            return Err(Error::Capacity {
                what: "delayed response slot",
            });
        }
        self.parked = Some(DelayedExchange {
            port,
            peer,
            response,
            deadline: now + DELAYED_RESPONSE_TIMEOUT,
        });
        Ok(())
    }

    /// Fill in the parked response and release it for sending.
    pub fn complete(&mut self, code: Code, payload: Vec<u8>) -> Option<DelayedExchange> {
        let mut exchange = self.parked.take()?;
        exchange.response.code = code;
        exchange.response.payload = payload;
        Some(exchange)
    }

    /// Flush an expired slot as 5.04 Gateway Timeout.
    pub fn expire(&mut self, now: Instant) -> Option<DelayedExchange> {
        if self.parked.as_ref().map(|p| now >= p.deadline) != Some(true) {
            return None;
        }
        let mut exchange = self.parked.take()?;
        log::warn!(
            "[coap] delayed response for {} timed out, answering {}",
            exchange.peer,
            Code::GATEWAY_TIMEOUT
        );
        exchange.response.code = Code::GATEWAY_TIMEOUT;
        exchange.response.payload.clear();
        Some(exchange)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.parked.as_ref().map(|p| p.deadline)
    }
}

/// Build the separate-response shell parked while a read is in flight.
/// The final answer is a fresh confirmable exchange echoing the token.
pub fn separate_response(request: &Message, message_id: u16) -> Message {
    let mut shell = Message::new(MsgType::Confirmable, Code::EMPTY, message_id);
    shell.token = request.token.clone();
    shell
}
