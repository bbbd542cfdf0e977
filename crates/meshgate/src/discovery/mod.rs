// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Device discovery state machine.
//!
//! Join/announce events enqueue per-node tasks that walk
//! `RequestEndpoints -> AwaitEndpoints -> (RequestDescriptor ->
//! AwaitDescriptor)*`, one descriptor pair per discovered endpoint. A
//! periodic tick fires the head of the queue and re-fires unanswered
//! requests after a fixed retry delay; there is no backoff. Tasks that sit
//! in the queue past an absolute ceiling are dropped unconditionally -
//! that path is a resource-exhaustion guard, not a retried success path.
//!
//! A node whose identity already has a completed registry entry bypasses
//! discovery on rejoin: only its short-address mapping is refreshed.

use crate::config::{
    DISCOVERY_QUEUE_CAPACITY, DISCOVERY_RETRY_SECS, DISCOVERY_WAIT_CEILING_SECS, ENDPOINT_UNKNOWN,
};
use crate::mesh::{Eui64, MeshDriver, SimpleDescriptor};
use crate::registry::{DeviceRecord, DeviceRegistry, LifecycleState};

/// Discovery phase of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RequestEndpoints,
    AwaitEndpoints,
    RequestDescriptor,
    AwaitDescriptor,
}

/// One queued discovery task.
#[derive(Debug, Clone)]
pub struct DiscoveryTask {
    pub short_addr: u16,
    pub identity: Eui64,
    /// `ENDPOINT_UNKNOWN` until the active-endpoints response fans the
    /// task out into one per endpoint.
    pub endpoint: u8,
    pub phase: Phase,
    /// Seconds until this task fires (head fires at zero).
    pub countdown: u32,
    /// Total seconds spent in the queue, all phases combined.
    pub waited: u32,
}

/// Result of a device announce.
#[derive(Debug, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Known identity; short address refreshed, discovery bypassed.
    Rejoined,
    /// New identity queued for discovery.
    Enqueued,
    /// Already being discovered; nothing to do.
    AlreadyQueued,
    /// Queue full; the announce was dropped.
    QueueFull,
}

/// One-shot configuration writes fired when an endpoint of a matching
/// device type completes discovery. Kept as data rather than hard-coded
/// per-type branches so hosts can extend the table.
struct AutoConfigure {
    device_type: u16,
    cluster: u16,
    attr: u16,
    data_type: u8,
    value: [u8; 2],
    width: usize,
}

/// Occupancy sensors get their unoccupied-delay shortened once, so the
/// first report arrives promptly after pairing.
const AUTO_CONFIGURE: &[AutoConfigure] = &[AutoConfigure {
    device_type: 0x0107,
    cluster: 0x0406,
    attr: 0x0010,
    data_type: crate::mesh::data_type::U16,
    value: [10, 0],
    width: 2,
}];

/// Bounded queue of in-progress discovery tasks, ordered ascending by
/// countdown so the next task to fire is always at the head.
pub struct DiscoveryQueue {
    tasks: Vec<DiscoveryTask>,
}

impl DiscoveryQueue {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains_identity(&self, identity: &Eui64) -> bool {
        self.tasks.iter().any(|t| &t.identity == identity)
    }

    fn push(&mut self, task: DiscoveryTask) -> bool {
        if self.tasks.len() >= DISCOVERY_QUEUE_CAPACITY {
            log::warn!(
                "[disc] queue full, dropping task for {:#06x}",
                task.short_addr
            );
            return false;
        }
        self.tasks.push(task);
        self.reorder();
        true
    }

    fn reorder(&mut self) {
        self.tasks.sort_by_key(|t| t.countdown);
    }

    /// Join / rejoin / address-change entry point.
    pub fn announce(
        &mut self,
        short_addr: u16,
        identity: &Eui64,
        registry: &mut DeviceRegistry,
    ) -> AnnounceOutcome {
        if registry.has_complete(identity) {
            registry.update_short_addr(identity, short_addr);
            log::info!(
                "[disc] rejoin {:02x?} addr={:#06x}, discovery bypassed",
                identity,
                short_addr
            );
            return AnnounceOutcome::Rejoined;
        }
        if self.contains_identity(identity) {
            // Refresh the address on the queued task; the node may have
            // rejoined under a new one mid-discovery.
            for task in &mut self.tasks {
                if &task.identity == identity {
                    task.short_addr = short_addr;
                }
            }
            return AnnounceOutcome::AlreadyQueued;
        }
        let queued = self.push(DiscoveryTask {
            short_addr,
            identity: *identity,
            endpoint: ENDPOINT_UNKNOWN,
            phase: Phase::RequestEndpoints,
            countdown: 0,
            waited: 0,
        });
        if queued {
            log::info!(
                "[disc] queued endpoint discovery for {:02x?} addr={:#06x}",
                identity,
                short_addr
            );
            AnnounceOutcome::Enqueued
        } else {
            AnnounceOutcome::QueueFull
        }
    }

    /// Periodic tick: age tasks, drop the expired, fire the head.
    ///
    /// Re-running against an empty queue is a no-op.
    pub fn tick<D: MeshDriver>(&mut self, elapsed_secs: u32, driver: &mut D) {
        if self.tasks.is_empty() {
            return;
        }

        for task in &mut self.tasks {
            task.waited = task.waited.saturating_add(elapsed_secs);
            task.countdown = task.countdown.saturating_sub(elapsed_secs);
        }

        // Residency ceiling applies to every task regardless of phase.
        self.tasks.retain(|task| {
            if task.waited > DISCOVERY_WAIT_CEILING_SECS {
                log::warn!(
                    "[disc] dropping task addr={:#06x} ep={} after {}s (ceiling)",
                    task.short_addr,
                    task.endpoint,
                    task.waited
                );
                false
            } else {
                true
            }
        });

        let Some(head) = self.tasks.first_mut() else {
            return;
        };
        if head.countdown > 0 {
            return;
        }

        // Fire the phase's request; an unanswered await re-fires the same
        // request on its next turn.
        let result = match head.phase {
            Phase::RequestEndpoints | Phase::AwaitEndpoints => {
                head.phase = Phase::AwaitEndpoints;
                driver.request_active_endpoints(head.short_addr)
            }
            Phase::RequestDescriptor | Phase::AwaitDescriptor => {
                head.phase = Phase::AwaitDescriptor;
                driver.request_simple_descriptor(head.short_addr, head.endpoint)
            }
        };
        if let Err(err) = result {
            log::warn!(
                "[disc] request for {:#06x} failed: {}",
                head.short_addr,
                err
            );
        }
        head.countdown = DISCOVERY_RETRY_SECS;
        self.reorder();
    }

    /// Active-endpoints response: fan the unknown-endpoint task out into
    /// one descriptor task per endpoint.
    pub fn on_active_endpoints(&mut self, short_addr: u16, endpoints: &[u8]) {
        let Some(pos) = self
            .tasks
            .iter()
            .position(|t| t.short_addr == short_addr && t.endpoint == ENDPOINT_UNKNOWN)
        else {
            log::debug!(
                "[disc] unsolicited active-endpoints from {:#06x}",
                short_addr
            );
            return;
        };
        let parent = self.tasks.remove(pos);
        log::info!(
            "[disc] {:#06x} reports {} endpoint(s)",
            short_addr,
            endpoints.len()
        );
        for &endpoint in endpoints {
            self.push(DiscoveryTask {
                short_addr: parent.short_addr,
                identity: parent.identity,
                endpoint,
                phase: Phase::RequestDescriptor,
                countdown: 0,
                waited: parent.waited,
            });
        }
    }

    /// Simple-descriptor response: complete the task and create the
    /// registry record. Returns the new slot when a record was written.
    pub fn on_simple_descriptor<D: MeshDriver>(
        &mut self,
        descriptor: &SimpleDescriptor,
        registry: &mut DeviceRegistry,
        driver: &mut D,
        now: u64,
    ) -> Option<usize> {
        let pos = self.tasks.iter().position(|t| {
            t.short_addr == descriptor.short_addr && t.endpoint == descriptor.endpoint
        })?;
        let task = self.tasks.remove(pos);

        let mut clusters =
            Vec::with_capacity(descriptor.in_clusters.len() + descriptor.out_clusters.len());
        clusters.extend_from_slice(&descriptor.in_clusters);
        clusters.extend_from_slice(&descriptor.out_clusters);

        let record = DeviceRecord {
            identity: task.identity,
            short_addr: descriptor.short_addr,
            endpoint: descriptor.endpoint,
            device_type: descriptor.device_type,
            clusters,
            split: descriptor.in_clusters.len(),
            last_contact: now,
            state: LifecycleState::Joined,
        };
        let slot = match registry.insert(record) {
            Ok(slot) => slot,
            Err(err) => {
                log::warn!("[disc] registry rejected descriptor: {}", err);
                return None;
            }
        };
        log::info!(
            "[disc] endpoint {} of {:#06x} discovered (type {:#06x})",
            descriptor.endpoint,
            descriptor.short_addr,
            descriptor.device_type
        );

        for entry in AUTO_CONFIGURE {
            if entry.device_type == descriptor.device_type {
                let result = driver.write_attribute(
                    descriptor.short_addr,
                    descriptor.endpoint,
                    entry.cluster,
                    entry.attr,
                    entry.data_type,
                    &entry.value[..entry.width],
                );
                if let Err(err) = result {
                    log::warn!("[disc] one-shot configure failed: {}", err);
                }
            }
        }

        Some(slot)
    }
}

impl Default for DiscoveryQueue {
    fn default() -> Self {
        Self::new()
    }
}
