// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Device registry: bounded table of discovered mesh nodes.
//!
//! One record per (identity, endpoint) pair, capacity-bounded with a
//! free-list over tagged-empty slots. Records are created by discovery
//! completion, mutated by traffic and send-status events, and cleared on
//! explicit delete or a confirmed leave.
//!
//! Lifecycle transitions are guarded: a record that has not reached
//! `Joined` ignores externally triggered promotions, and `LeaveSent` /
//! `Unknown` records ignore ordinary traffic-driven re-promotion until the
//! node is confirmed gone or rediscovered.

pub mod store;

use crate::config::{ENDPOINT_UNKNOWN, REGISTRY_CAPACITY};
use crate::error::{Error, Result};
use crate::mesh::Eui64;

/// Device lifecycle state, ordered by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Present but not yet discovered (or demoted pending rediscovery).
    Unknown,
    /// Fully discovered and reachable.
    Joined,
    /// A unicast send failed; next successful traffic re-promotes.
    Unresponsive,
    /// A leave request was issued; awaiting confirmation.
    LeaveSent,
    /// Confirmed off the network; slot about to be reclaimed.
    Left,
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub identity: Eui64,
    pub short_addr: u16,
    pub endpoint: u8,
    pub device_type: u16,
    /// Server-side cluster ids first, then client-side; `split` is the
    /// count of server-side entries.
    pub clusters: Vec<u16>,
    pub split: usize,
    /// Monotonic seconds of the last traffic seen from this node.
    pub last_contact: u64,
    pub state: LifecycleState,
}

impl DeviceRecord {
    pub fn server_clusters(&self) -> &[u16] {
        &self.clusters[..self.split.min(self.clusters.len())]
    }

    pub fn client_clusters(&self) -> &[u16] {
        &self.clusters[self.split.min(self.clusters.len())..]
    }
}

/// Bounded device table.
pub struct DeviceRegistry {
    slots: Vec<Option<DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            slots: (0..REGISTRY_CAPACITY).map(|_| None).collect(),
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &DeviceRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (i, r)))
    }

    pub fn get(&self, slot: usize) -> Option<&DeviceRecord> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut DeviceRecord> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// First matching record for an identity (any endpoint).
    pub fn find_by_identity(&self, identity: &Eui64) -> Option<(usize, &DeviceRecord)> {
        self.iter().find(|(_, r)| &r.identity == identity)
    }

    /// First matching record for a short address (any endpoint).
    pub fn find_by_addr(&self, short_addr: u16) -> Option<(usize, &DeviceRecord)> {
        self.iter().find(|(_, r)| r.short_addr == short_addr)
    }

    pub fn find_by_addr_ep(&self, short_addr: u16, endpoint: u8) -> Option<(usize, &DeviceRecord)> {
        self.iter()
            .find(|(_, r)| r.short_addr == short_addr && r.endpoint == endpoint)
    }

    /// First record exposing the given endpoint, whatever the device.
    /// Default-port traffic with implicit endpoint addressing resolves here.
    pub fn find_by_endpoint(&self, endpoint: u8) -> Option<(usize, &DeviceRecord)> {
        self.iter().find(|(_, r)| r.endpoint == endpoint)
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    /// True when this identity has at least one fully discovered endpoint.
    /// A completed entry lets a rejoin bypass discovery entirely.
    pub fn has_complete(&self, identity: &Eui64) -> bool {
        self.iter()
            .any(|(_, r)| &r.identity == identity && r.endpoint != ENDPOINT_UNKNOWN)
    }

    /// Insert a record, enforcing (identity, endpoint) uniqueness.
    ///
    /// Rediscovery of an existing pair overwrites in place; otherwise the
    /// first free slot is taken. Returns the slot index.
    pub fn insert(&mut self, record: DeviceRecord) -> Result<usize> {
        // Bound before writing so the lookup's borrow has ended.
        let existing = self
            .iter()
            .find(|(_, r)| r.identity == record.identity && r.endpoint == record.endpoint)
            .map(|(i, _)| i);
        if let Some(slot) = existing {
            self.slots[slot] = Some(record);
            return Ok(slot);
        }
        let slot = self.first_free_slot().ok_or(Error::Capacity {
            what: "registry",
        })?;
        log::info!(
            "[reg] slot {} <- {:02x?} ep={} addr={:#06x}",
            slot,
            record.identity,
            record.endpoint,
            record.short_addr
        );
        self.slots[slot] = Some(record);
        Ok(slot)
    }

    /// Clone the record at `slot` under a new endpoint id.
    pub fn add_endpoint_alias(&mut self, slot: usize, endpoint: u8) -> Result<usize> {
        let mut cloned = self
            .get(slot)
            .ok_or(Error::Lookup {
                reason: format!("no record in slot {}", slot),
            })?
            .clone();
        cloned.endpoint = endpoint;
        self.insert(cloned)
    }

    /// Update the short address across every endpoint of an identity.
    /// Returns the number of records touched.
    pub fn update_short_addr(&mut self, identity: &Eui64, short_addr: u16) -> usize {
        let mut touched = 0;
        for slot in self.slots.iter_mut().flatten() {
            if &slot.identity == identity {
                slot.short_addr = short_addr;
                touched += 1;
            }
        }
        if touched > 0 {
            log::debug!(
                "[reg] short addr {:#06x} propagated to {} record(s) of {:02x?}",
                short_addr,
                touched,
                identity
            );
        }
        touched
    }

    /// Externally triggered lifecycle transition, propagated across the
    /// identity. Records below `Joined` ignore it: they must complete
    /// discovery first.
    pub fn update_state(&mut self, identity: &Eui64, state: LifecycleState) -> usize {
        let mut touched = 0;
        for slot in self.slots.iter_mut().flatten() {
            if &slot.identity == identity && slot.state >= LifecycleState::Joined {
                slot.state = state;
                touched += 1;
            }
        }
        touched
    }

    /// Traffic-driven contact update for every endpoint of the sender.
    ///
    /// `Unresponsive` records re-promote to `Joined`; `LeaveSent` and
    /// `Unknown` stay where they are until confirmed left or rediscovered.
    pub fn touch(&mut self, short_addr: u16, now: u64) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.short_addr == short_addr {
                slot.last_contact = now;
                if slot.state == LifecycleState::Unresponsive {
                    slot.state = LifecycleState::Joined;
                }
            }
        }
    }

    /// Send-status failure: demote `Joined` records of the destination.
    pub fn mark_unresponsive(&mut self, short_addr: u16) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.short_addr == short_addr && slot.state == LifecycleState::Joined {
                slot.state = LifecycleState::Unresponsive;
            }
        }
    }

    /// Remove a single endpoint of an identity.
    pub fn remove_endpoint(&mut self, identity: &Eui64, endpoint: u8) -> Option<DeviceRecord> {
        for slot in &mut self.slots {
            if let Some(record) = slot {
                if &record.identity == identity && record.endpoint == endpoint {
                    return slot.take();
                }
            }
        }
        None
    }

    /// Remove every endpoint of an identity, returning the removed records.
    pub fn remove_identity(&mut self, identity: &Eui64) -> Vec<DeviceRecord> {
        let mut removed = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|r| &r.identity == identity) {
                if let Some(record) = slot.take() {
                    removed.push(record);
                }
            }
        }
        removed
    }

    /// Seconds since the node in `slot` was last heard from.
    pub fn seconds_since_contact(&self, slot: usize, now: u64) -> Option<u64> {
        self.get(slot)
            .map(|r| now.saturating_sub(r.last_contact))
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
