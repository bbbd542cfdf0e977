// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Gateway context: one owned object wiring registry, discovery,
//! transport, and translator together.
//!
//! The host drives it from a readiness loop: [`Gateway::handle_readable`]
//! whenever a watched socket is readable, [`Gateway::tick`] when the
//! computed timeout fires. Mesh events arrive through the
//! [`MeshEventSink`] implementation. Handlers run to completion; the
//! single-slot invariants (delayed response, outbound address) are
//! enforced here.

use crate::cbor::CborWriter;
use crate::coap::delayed::{separate_response, DelayedSlot};
use crate::coap::message::{
    Code, Message, MsgType, CONTENT_FORMAT_CBOR, CONTENT_FORMAT_LINK, OPTION_CONTENT_FORMAT,
    OPTION_OBSERVE,
};
use crate::coap::{
    Transport, CORE_SEGMENT, RESOURCE_DIRECTORY_SEGMENT, WELL_KNOWN_CORE, WELL_KNOWN_SEGMENT,
};
use crate::config::MAX_MESSAGE_SIZE;
use crate::discovery::DiscoveryQueue;
use crate::error::Result;
use crate::mesh::{CommandFrame, Eui64, MeshDriver, MeshEventSink, SimpleDescriptor};
use crate::registry::{store, DeviceRegistry};
use crate::translator::command::{build_notification, OutboundSlot};
use crate::translator::response::encode_read_response;
use crate::translator::{self, Outcome, Response};
use mio::Token;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Discovery ages in whole seconds; tick at this cadence.
const DISCOVERY_TICK: Duration = Duration::from_secs(1);

/// Host-facing device lifecycle notifications.
///
/// Every method has a log-only default, so a host overrides only the
/// events it cares about. Callbacks run inside the event handler; keep
/// them short.
pub trait GatewayObserver {
    /// An endpoint finished discovery and entered the registry.
    fn on_endpoint_discovered(&mut self, identity: &Eui64, endpoint: u8) {
        log::info!("[gw] discovered {:02x?} ep {}", identity, endpoint);
    }

    /// A known device reannounced itself; its records were refreshed
    /// without rerunning discovery.
    fn on_device_rejoined(&mut self, identity: &Eui64, short_addr: u16) {
        log::info!("[gw] {:02x?} rejoined at {:#06x}", identity, short_addr);
    }

    /// A device left and all of its records were dropped.
    fn on_device_removed(&mut self, identity: &Eui64) {
        log::info!("[gw] {:02x?} removed", identity);
    }
}

/// The default observer: the log lines above, nothing else.
pub struct LogObserver;

impl GatewayObserver for LogObserver {}

/// The gateway context.
pub struct Gateway<D: MeshDriver> {
    driver: D,
    registry: DeviceRegistry,
    discovery: DiscoveryQueue,
    transport: Transport,
    delayed: DelayedSlot,
    outbound: OutboundSlot,
    observer: Box<dyn GatewayObserver>,
    registry_path: PathBuf,
    poll_registry: Option<mio::Registry>,
    started: Instant,
    last_discovery_tick: Instant,
}

impl<D: MeshDriver> Gateway<D> {
    /// Load persisted state, bind the default port, and rebind one
    /// per-device port for every reloaded record.
    pub fn new(driver: D, port: u16, registry_path: PathBuf, now: Instant) -> Result<Self> {
        let registry = store::load(&registry_path);
        let mut transport = Transport::new(port)?;
        for (slot, _) in registry.iter() {
            if let Err(err) = transport.add_device_port(slot, None) {
                log::warn!("[gw] device port for slot {} not bound: {}", slot, err);
            }
        }
        Ok(Self {
            driver,
            registry,
            discovery: DiscoveryQueue::new(),
            transport,
            delayed: DelayedSlot::new(),
            outbound: OutboundSlot::new(),
            observer: Box::new(LogObserver),
            registry_path,
            poll_registry: None,
            started: now,
            last_discovery_tick: now,
        })
    }

    /// Hand over the poller; all current and future ports register with it.
    pub fn attach_poll(&mut self, registry: &mio::Registry) -> Result<()> {
        self.transport.register_all(registry)?;
        self.poll_registry = Some(registry.try_clone()?);
        Ok(())
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Set the outbound server address explicitly (single-slot: the first
    /// setting wins).
    pub fn set_outbound(&mut self, addr: SocketAddr) {
        self.outbound.set(addr);
    }

    /// Replace the lifecycle observer (the default only logs).
    pub fn set_observer(&mut self, observer: Box<dyn GatewayObserver>) {
        self.observer = observer;
    }

    fn now_secs(&self, now: Instant) -> u64 {
        now.duration_since(self.started).as_secs()
    }

    fn persist(&self) {
        if let Err(err) = store::save(&self.registry, &self.registry_path) {
            log::warn!("[gw] registry persist failed: {}", err);
        }
    }

    /// Drain and handle every datagram pending on a readable port.
    pub fn handle_readable(&mut self, token: Token, now: Instant) {
        let Some(port_index) = self.transport.port_index(token) else {
            log::debug!("[gw] readiness for unknown token {:?}", token);
            return;
        };
        loop {
            let mut buf = [0u8; MAX_MESSAGE_SIZE];
            let received = match self.transport.port(port_index).map(|p| p.recv(&mut buf)) {
                Some(Ok(Some((len, peer)))) => (buf[..len].to_vec(), peer),
                Some(Ok(None)) | None => return,
                Some(Err(err)) => {
                    log::warn!("[gw] recv failed on port index {}: {}", port_index, err);
                    return;
                }
            };
            let (data, peer) = received;
            match Message::parse(&data) {
                Ok(message) => self.handle_message(port_index, peer, message, now),
                Err(err) => log::debug!("[gw] dropping datagram from {}: {}", peer, err),
            }
        }
    }

    fn handle_message(&mut self, port_index: usize, peer: SocketAddr, msg: Message, now: Instant) {
        match msg.mtype {
            MsgType::Acknowledgement => {
                self.transport.acknowledge(port_index, msg.message_id);
                return;
            }
            MsgType::Reset => {
                self.transport.acknowledge(port_index, msg.message_id);
                // A RST against a notification cancels the observation.
                self.transport.observers.deregister_peer(peer);
                return;
            }
            MsgType::Confirmable | MsgType::NonConfirmable => {}
        }
        if !msg.code.is_request() {
            log::debug!("[gw] ignoring non-request {} from {}", msg.code, peer);
            return;
        }

        // First unicast source becomes the outbound server unless one was
        // set explicitly.
        self.outbound.set(peer);

        let segments = msg.path_segments();
        match segments.first() {
            Some(&WELL_KNOWN_SEGMENT) => self.handle_well_known(port_index, peer, &msg),
            Some(&RESOURCE_DIRECTORY_SEGMENT) => self.handle_directory(port_index, peer, &msg),
            _ => self.handle_translated(port_index, peer, &msg, now),
        }
    }

    /// `/.well-known/core`: fixed discovery document, registry state
    /// notwithstanding.
    fn handle_well_known(&mut self, port_index: usize, peer: SocketAddr, msg: &Message) {
        let segments = msg.path_segments();
        if segments.get(1).copied().unwrap_or(CORE_SEGMENT) != CORE_SEGMENT {
            self.respond(port_index, peer, msg, Response::status(Code::NOT_FOUND));
            return;
        }
        if msg.code != Code::GET {
            self.respond(
                port_index,
                peer,
                msg,
                Response::status(Code::METHOD_NOT_ALLOWED),
            );
            return;
        }
        let response = Response {
            code: Code::CONTENT,
            payload: WELL_KNOWN_CORE.as_bytes().to_vec(),
            content_format: Some(CONTENT_FORMAT_LINK),
        };
        self.respond(port_index, peer, msg, response);
    }

    /// `/rd`: POST pins the outbound server to the requester; GET lists
    /// registered endpoints.
    fn handle_directory(&mut self, port_index: usize, peer: SocketAddr, msg: &Message) {
        let response = match msg.code {
            Code::POST => {
                self.outbound.set(peer);
                Response::status(Code::CREATED)
            }
            Code::GET => match self.directory_listing() {
                Ok(payload) => Response::cbor(Code::CONTENT, payload),
                Err(err) => Response::status(translator::error_code(&err)),
            },
            _ => Response::status(Code::METHOD_NOT_ALLOWED),
        };
        self.respond(port_index, peer, msg, response);
    }

    /// Array of [endpoint, device-type] pairs, one per record.
    fn directory_listing(&self) -> Result<Vec<u8>> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let mut writer = CborWriter::new(&mut buf);
        writer.array_open()?;
        for (_, record) in self.registry.iter() {
            writer.array_open()?;
            writer.uint8(record.endpoint)?;
            writer.uint16(record.device_type)?;
            writer.brk()?;
        }
        writer.brk()?;
        let len = writer.offset();
        Ok(buf[..len].to_vec())
    }

    /// Everything else goes through the translator.
    fn handle_translated(
        &mut self,
        port_index: usize,
        peer: SocketAddr,
        msg: &Message,
        now: Instant,
    ) {
        // Observe bookkeeping happens regardless of how the read resolves.
        match msg.observe() {
            Some(0) if msg.code == Code::GET => {
                let resource = msg.path_segments().join("/");
                if let Err(err) =
                    self.transport
                        .observers
                        .register(&resource, &msg.token, peer, now)
                {
                    log::warn!("[gw] observe registration refused: {}", err);
                }
            }
            Some(1) => {
                self.transport.observers.deregister(&msg.token, peer);
            }
            _ => {}
        }

        let port_slot = self
            .transport
            .port(port_index)
            .and_then(|p| p.registry_slot);
        let outcome = translator::handle_request(msg, &self.registry, &mut self.driver, port_slot);
        match outcome {
            Outcome::Respond(response) => self.respond(port_index, peer, msg, response),
            Outcome::Defer => self.defer(port_index, peer, msg, now),
        }
    }

    /// Park the exchange: empty ACK now, separate response when the mesh
    /// answers (or the timer expires).
    fn defer(&mut self, port_index: usize, peer: SocketAddr, msg: &Message, now: Instant) {
        let mid = match self.transport.port_mut(port_index) {
            Some(port) => port.next_mid(),
            None => return,
        };
        let mut shell = separate_response(msg, mid);
        shell.add_option(OPTION_CONTENT_FORMAT, vec![CONTENT_FORMAT_CBOR]);
        if let Err(err) = self.delayed.prepare(port_index, peer, shell, now) {
            log::debug!("[gw] delayed slot busy: {}", err);
            self.respond(port_index, peer, msg, Response::status(Code::UNAVAILABLE));
            return;
        }
        if msg.mtype == MsgType::Confirmable {
            let ack = Message::ack_empty(msg.message_id);
            if let Err(err) = self.transport.send(port_index, &ack, peer) {
                log::warn!("[gw] empty ack to {} failed: {}", peer, err);
            }
        }
    }

    fn respond(&mut self, port_index: usize, peer: SocketAddr, request: &Message, response: Response) {
        let mid = match self.transport.port_mut(port_index) {
            Some(port) => port.next_mid(),
            None => return,
        };
        let mut msg = Message::response_to(request, response.code, mid);
        if let Some(format) = response.content_format {
            msg.add_option(OPTION_CONTENT_FORMAT, vec![format]);
        }
        msg.payload = response.payload;
        if let Err(err) = self.transport.send(port_index, &msg, peer) {
            log::warn!("[gw] response to {} failed: {}", peer, err);
        }
    }

    /// Periodic work: discovery aging, retransmissions, delayed-response
    /// expiry, observation notifications.
    pub fn tick(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_discovery_tick);
        if elapsed >= DISCOVERY_TICK {
            self.discovery
                .tick(elapsed.as_secs() as u32, &mut self.driver);
            self.last_discovery_tick = now;
        }

        self.transport.retransmit_due(now);

        if let Some(expired) = self.delayed.expire(now) {
            if let Err(err) = self
                .transport
                .send_confirmable(expired.port, &expired.response, expired.peer, now)
            {
                log::warn!("[gw] timeout response to {} failed: {}", expired.peer, err);
            }
        }

        self.service_observers(now);
    }

    /// Fire due observation notifications. Each one re-runs the observed
    /// GET; deferred reads ride the delayed slot, so at most one deferred
    /// notification is serviced per pass.
    fn service_observers(&mut self, now: Instant) {
        for due in self.transport.observers.due(now) {
            let mut probe = Message::new(MsgType::Confirmable, Code::GET, 0);
            probe.token = due.token.clone();
            probe.set_path(&due.resource);

            let outcome =
                translator::handle_request(&probe, &self.registry, &mut self.driver, None);
            match outcome {
                Outcome::Respond(response) => {
                    let mid = match self.transport.port_mut(0) {
                        Some(port) => port.next_mid(),
                        None => return,
                    };
                    let mut msg = Message::new(MsgType::Confirmable, response.code, mid);
                    msg.token = due.token;
                    msg.add_option(OPTION_OBSERVE, due.seq.to_be_bytes()[1..].to_vec());
                    if let Some(format) = response.content_format {
                        msg.add_option(OPTION_CONTENT_FORMAT, vec![format]);
                    }
                    msg.payload = response.payload;
                    if let Err(err) = self.transport.send_confirmable(0, &msg, due.peer, now) {
                        log::warn!("[gw] notification to {} failed: {}", due.peer, err);
                    }
                }
                Outcome::Defer => {
                    let mid = match self.transport.port_mut(0) {
                        Some(port) => port.next_mid(),
                        None => return,
                    };
                    let mut shell = Message::new(MsgType::Confirmable, Code::EMPTY, mid);
                    shell.token = due.token;
                    shell.add_option(OPTION_OBSERVE, due.seq.to_be_bytes()[1..].to_vec());
                    shell.add_option(OPTION_CONTENT_FORMAT, vec![CONTENT_FORMAT_CBOR]);
                    if let Err(err) = self.delayed.prepare(0, due.peer, shell, now) {
                        log::debug!("[gw] notification for {} skipped: {}", due.peer, err);
                    }
                }
            }
        }
    }

    /// Earliest pending deadline across all timed state; the host sizes
    /// its poll timeout from this.
    pub fn next_timeout(&self, now: Instant) -> Duration {
        let next_discovery = self.last_discovery_tick + DISCOVERY_TICK;
        let deadline = self
            .transport
            .next_deadline()
            .into_iter()
            .chain(self.delayed.next_deadline())
            .chain(Some(next_discovery))
            .min();
        match deadline {
            Some(at) if at > now => at - now,
            _ => Duration::ZERO,
        }
    }
}

impl<D: MeshDriver> MeshEventSink for Gateway<D> {
    fn on_device_announce(&mut self, short_addr: u16, identity: &Eui64) {
        use crate::discovery::AnnounceOutcome;
        let outcome = self
            .discovery
            .announce(short_addr, identity, &mut self.registry);
        if outcome == AnnounceOutcome::Rejoined {
            self.observer.on_device_rejoined(identity, short_addr);
            self.persist();
        }
    }

    fn on_leave(&mut self, short_addr: u16, identity: &Eui64) {
        let slots: Vec<usize> = self
            .registry
            .iter()
            .filter(|(_, r)| &r.identity == identity)
            .map(|(slot, _)| slot)
            .collect();
        let removed = self.registry.remove_identity(identity);
        if removed.is_empty() {
            log::debug!("[gw] leave from unknown {:#06x}", short_addr);
            return;
        }
        for slot in slots {
            self.transport.remove_device_port(slot);
        }
        log::info!(
            "[gw] {:02x?} left, {} record(s) dropped",
            identity,
            removed.len()
        );
        self.observer.on_device_removed(identity);
        self.persist();
    }

    fn on_active_endpoints(&mut self, short_addr: u16, endpoints: &[u8]) {
        self.discovery.on_active_endpoints(short_addr, endpoints);
    }

    fn on_simple_descriptor(&mut self, descriptor: &SimpleDescriptor) {
        let now = self.now_secs(Instant::now());
        let slot = self.discovery.on_simple_descriptor(
            descriptor,
            &mut self.registry,
            &mut self.driver,
            now,
        );
        if let Some(slot) = slot {
            if let Some(record) = self.registry.get(slot) {
                let identity = record.identity;
                self.observer
                    .on_endpoint_discovered(&identity, descriptor.endpoint);
            }
            match self
                .transport
                .add_device_port(slot, self.poll_registry.as_ref())
            {
                Ok(_) => {}
                Err(err) => log::warn!("[gw] device port for slot {} not bound: {}", slot, err),
            }
            self.persist();
        }
    }

    fn on_attribute_response(
        &mut self,
        src_addr: u16,
        endpoint: u8,
        cluster: u16,
        payload: &[u8],
    ) {
        if !self.delayed.is_armed() {
            log::debug!(
                "[gw] unsolicited attribute response from {:#06x} ep {} cluster {:#06x}",
                src_addr,
                endpoint,
                cluster
            );
            return;
        }
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let completed = match encode_read_response(payload, &mut buf) {
            Ok(len) => self.delayed.complete(Code::CONTENT, buf[..len].to_vec()),
            Err(err) => {
                log::warn!("[gw] attribute translation failed: {}", err);
                self.delayed.complete(Code::INTERNAL_ERROR, Vec::new())
            }
        };
        if let Some(exchange) = completed {
            let now = Instant::now();
            if let Err(err) = self.transport.send_confirmable(
                exchange.port,
                &exchange.response,
                exchange.peer,
                now,
            ) {
                log::warn!("[gw] delayed response to {} failed: {}", exchange.peer, err);
            }
        }
    }

    fn on_command_received(&mut self, frame: &CommandFrame) {
        let notification = match build_notification(frame) {
            Ok(Some(n)) => n,
            Ok(None) => return,
            Err(err) => {
                log::warn!("[gw] command from {:#06x} dropped: {}", frame.src_addr, err);
                return;
            }
        };
        let Some(dest) = self.outbound.get() else {
            log::warn!("[gw] no outbound server yet, dropping notification");
            return;
        };
        let mid = match self.transport.port_mut(0) {
            Some(port) => port.next_mid(),
            None => return,
        };
        let mut msg = Message::new(MsgType::NonConfirmable, Code::POST, mid);
        msg.set_path(&notification.path);
        msg.add_option(OPTION_CONTENT_FORMAT, vec![CONTENT_FORMAT_CBOR]);
        msg.payload = notification.payload;
        if let Err(err) = self.transport.send(0, &msg, dest) {
            log::warn!("[gw] notification to {} failed: {}", dest, err);
        }
    }

    fn on_send_status(&mut self, dest: u16, delivered: bool) {
        if delivered {
            let now = self.now_secs(Instant::now());
            self.registry.touch(dest, now);
        } else {
            self.registry.mark_unresponsive(dest);
        }
    }
}
