// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! CoAP/UDP transport.
//!
//! [`Transport`] owns the listener ports (one default plus one per
//! registered device), the observer table, and per-port retransmission
//! queues. Message semantics live in [`message`]; the gateway layer decides
//! what to answer, this layer moves datagrams.

pub mod delayed;
pub mod message;
pub mod observe;
pub mod port;
pub mod retransmit;

use crate::config::{DEVICE_PORT_BASE, MAX_LISTENER_PORTS};
use crate::error::{Error, Result};
use message::Message;
use mio::{Registry, Token};
use observe::ObserveTable;
use port::ListenerPort;
use std::net::SocketAddr;
use std::time::Instant;

/// First path segment of the discovery resource.
pub const WELL_KNOWN_SEGMENT: &str = ".well-known";
/// Second path segment of the discovery resource.
pub const CORE_SEGMENT: &str = "core";
/// First path segment of the resource directory.
pub const RESOURCE_DIRECTORY_SEGMENT: &str = "rd";

/// Fixed link-format document served at `/.well-known/core`.
pub const WELL_KNOWN_CORE: &str = "</>;rt=\"gw.mesh\";ct=60,</rd>;rt=\"core.rd\";ct=40";

/// Bound listener set plus observe state.
#[derive(Debug)]
pub struct Transport {
    /// Index 0 is always the default port.
    ports: Vec<ListenerPort>,
    pub observers: ObserveTable,
}

impl Transport {
    /// Bind the default port.
    pub fn new(default_port: u16) -> Result<Self> {
        let default = ListenerPort::bind(default_port, Token(0), None)?;
        log::info!("[coap] listening on port {}", default_port);
        Ok(Self {
            ports: vec![default],
            observers: ObserveTable::new(),
        })
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn port(&self, index: usize) -> Option<&ListenerPort> {
        self.ports.get(index)
    }

    pub fn port_mut(&mut self, index: usize) -> Option<&mut ListenerPort> {
        self.ports.get_mut(index)
    }

    /// Register every port with the poller.
    pub fn register_all(&mut self, registry: &Registry) -> Result<()> {
        for port in &mut self.ports {
            port.register(registry)?;
        }
        Ok(())
    }

    /// Map a poll token back to a port index.
    pub fn port_index(&self, token: Token) -> Option<usize> {
        self.ports.iter().position(|p| p.token == token)
    }

    /// Port index dedicated to a registry slot, when one exists.
    pub fn port_for_slot(&self, slot: usize) -> Option<usize> {
        self.ports.iter().position(|p| p.registry_slot == Some(slot))
    }

    /// Bind the per-device port for a registry slot. Idempotent; bounded
    /// by the port table size.
    pub fn add_device_port(&mut self, slot: usize, registry: Option<&Registry>) -> Result<usize> {
        if let Some(index) = self.port_for_slot(slot) {
            return Ok(index);
        }
        if self.ports.len() >= MAX_LISTENER_PORTS {
            return Err(Error::Capacity { what: "port table" });
        }
        let port_num = DEVICE_PORT_BASE + slot as u16;
        let mut port = ListenerPort::bind(port_num, Token(1 + slot), Some(slot))?;
        if let Some(registry) = registry {
            port.register(registry)?;
        }
        log::info!("[coap] device port {} bound for slot {}", port_num, slot);
        self.ports.push(port);
        Ok(self.ports.len() - 1)
    }

    /// Drop the per-device port for a slot after the device leaves.
    pub fn remove_device_port(&mut self, slot: usize) {
        if let Some(index) = self.port_for_slot(slot) {
            let port = self.ports.remove(index);
            log::info!("[coap] device port {} released", port.local_port);
        }
    }

    /// Serialize and send a message from one port, fire-and-forget.
    pub fn send(&mut self, port_index: usize, message: &Message, dest: SocketAddr) -> Result<()> {
        let data = message.serialize()?;
        let port = self.ports.get(port_index).ok_or(Error::Lookup {
            reason: format!("no listener port at index {}", port_index),
        })?;
        port.send(&data, dest)?;
        log::trace!(
            "[coap] sent {} mid={:#06x} to {} ({}B)",
            message.code,
            message.message_id,
            dest,
            data.len()
        );
        Ok(())
    }

    /// Serialize and send a confirmable message, tracking it for
    /// retransmission.
    pub fn send_confirmable(
        &mut self,
        port_index: usize,
        message: &Message,
        dest: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        let data = message.serialize()?;
        let port = self.ports.get_mut(port_index).ok_or(Error::Lookup {
            reason: format!("no listener port at index {}", port_index),
        })?;
        port.send(&data, dest)?;
        port.retransmit.push(message.message_id, dest, data, now)?;
        Ok(())
    }

    /// Drop the retransmit entry matched by an incoming ACK or RST.
    pub fn acknowledge(&mut self, port_index: usize, message_id: u16) -> bool {
        self.ports
            .get_mut(port_index)
            .map(|p| p.retransmit.acknowledge(message_id))
            .unwrap_or(false)
    }

    /// Re-send everything due for another attempt.
    pub fn retransmit_due(&mut self, now: Instant) {
        for port in &mut self.ports {
            for (dest, data) in port.retransmit.due(now) {
                if let Err(e) = port.send(&data, dest) {
                    log::warn!("[coap] retransmit to {} failed: {}", dest, e);
                } else {
                    log::debug!("[coap] retransmitted {}B to {}", data.len(), dest);
                }
            }
        }
    }

    /// Earliest transport deadline (retransmissions and observer clocks).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.ports
            .iter()
            .filter_map(|p| p.retransmit.next_deadline())
            .chain(self.observers.next_deadline())
            .min()
    }
}
