// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Observe (RFC 7641) registrations.
//!
//! The gateway notifies observers on a fixed interval rather than on value
//! change: each due observer triggers a fresh read of its resource and a
//! notification carrying the registration token and an incrementing
//! sequence number.

use crate::config::{OBSERVER_CAPACITY, OBSERVE_INTERVAL};
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Instant;

/// One registered observer.
#[derive(Debug)]
struct Observer {
    token: Vec<u8>,
    peer: SocketAddr,
    /// Uri-Path of the observed resource, joined with '/'.
    resource: String,
    seq: u32,
    next_at: Instant,
}

/// Notification due for one observer.
#[derive(Debug, Clone, PartialEq)]
pub struct DueNotification {
    pub token: Vec<u8>,
    pub peer: SocketAddr,
    pub resource: String,
    pub seq: u32,
}

/// Bounded observer table shared by all resources.
#[derive(Debug, Default)]
pub struct ObserveTable {
    observers: Vec<Observer>,
}

impl ObserveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Register an observer. Re-registering the same token+peer pair
    /// re-targets the existing slot instead of consuming a new one.
    pub fn register(
        &mut self,
        resource: &str,
        token: &[u8],
        peer: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        if let Some(existing) = self
            .observers
            .iter_mut()
            .find(|o| o.token == token && o.peer == peer)
        {
            existing.resource = resource.to_string();
            existing.next_at = now + OBSERVE_INTERVAL;
            log::debug!("[coap] observer {} re-registered for {:?}", peer, resource);
            return Ok(());
        }
        if self.observers.len() >= OBSERVER_CAPACITY {
            return Err(Error::Capacity {
                what: "observer table",
            });
        }
        log::info!("[coap] observer {} registered for {:?}", peer, resource);
        self.observers.push(Observer {
            token: token.to_vec(),
            peer,
            resource: resource.to_string(),
            seq: 0,
            next_at: now + OBSERVE_INTERVAL,
        });
        Ok(())
    }

    /// Remove a registration (explicit deregister or RST from the peer).
    pub fn deregister(&mut self, token: &[u8], peer: SocketAddr) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !(o.token == token && o.peer == peer));
        if before != self.observers.len() {
            log::info!("[coap] observer {} deregistered", peer);
            true
        } else {
            false
        }
    }

    /// Drop every registration held by a peer. Used when an RST arrives
    /// for a notification whose token no longer matches.
    pub fn deregister_peer(&mut self, peer: SocketAddr) {
        self.observers.retain(|o| o.peer != peer);
    }

    /// Collect observers due for a notification, advancing their clocks.
    pub fn due(&mut self, now: Instant) -> Vec<DueNotification> {
        let mut out = Vec::new();
        for observer in &mut self.observers {
            if now < observer.next_at {
                continue;
            }
            observer.seq = observer.seq.wrapping_add(1);
            observer.next_at = now + OBSERVE_INTERVAL;
            out.push(DueNotification {
                token: observer.token.clone(),
                peer: observer.peer,
                resource: observer.resource.clone(),
                seq: observer.seq,
            });
        }
        out
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.observers.iter().map(|o| o.next_at).min()
    }
}
