// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! End-to-end request scenarios against a live gateway.
//!
//! Each test binds a gateway on its own UDP port, pushes datagrams at it
//! from a plain client socket, and drives `handle_readable`/`tick` by
//! hand instead of running a poll loop.

use meshgate::coap::message::{Code, Message, MsgType};
use meshgate::config::DELAYED_RESPONSE_TIMEOUT;
use meshgate::error::Result;
use meshgate::gateway::{Gateway, GatewayObserver};
use meshgate::mesh::{Eui64, MeshDriver, MeshEventSink, SimpleDescriptor};
use mio::Token;
use std::cell::RefCell;
use std::net::UdpSocket;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Records outbound mesh requests for assertion.
#[derive(Debug, Default)]
struct Recorder {
    commands: Vec<(u16, u8, u16, bool, u8, Vec<u8>)>,
    reads: Vec<(u16, u8, u16, Vec<u16>)>,
    endpoint_requests: Vec<u16>,
    descriptor_requests: Vec<(u16, u8)>,
}

impl MeshDriver for Recorder {
    fn send_command(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        to_server: bool,
        command: u8,
        args: &[u8],
    ) -> Result<()> {
        self.commands
            .push((dest, endpoint, cluster, to_server, command, args.to_vec()));
        Ok(())
    }

    fn read_attributes(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        _to_server: bool,
        attrs: &[u16],
    ) -> Result<()> {
        self.reads.push((dest, endpoint, cluster, attrs.to_vec()));
        Ok(())
    }

    fn write_attribute(
        &mut self,
        _dest: u16,
        _endpoint: u8,
        _cluster: u16,
        _attr: u16,
        _data_type: u8,
        _value: &[u8],
    ) -> Result<()> {
        Ok(())
    }

    fn request_active_endpoints(&mut self, dest: u16) -> Result<()> {
        self.endpoint_requests.push(dest);
        Ok(())
    }

    fn request_simple_descriptor(&mut self, dest: u16, endpoint: u8) -> Result<()> {
        self.descriptor_requests.push((dest, endpoint));
        Ok(())
    }

    fn send_leave(&mut self, _dest: u16, _identity: &Eui64) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    gateway: Gateway<Recorder>,
    client: UdpSocket,
    gateway_port: u16,
    started: Instant,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Bind a gateway on `port` and a client on an ephemeral port.
    fn new(port: u16) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let gateway = Gateway::new(
            Recorder::default(),
            port,
            dir.path().join("registry.db"),
            started,
        )
        .unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        Self {
            gateway,
            client,
            gateway_port: port,
            started,
            _dir: dir,
        }
    }

    /// Join a device: announce, drive discovery, deliver the descriptor.
    fn join_device(&mut self, identity: Eui64, short_addr: u16, endpoint: u8) {
        self.gateway.on_device_announce(short_addr, &identity);
        self.gateway.tick(self.started + Duration::from_secs(1));
        self.gateway.on_active_endpoints(short_addr, &[endpoint]);
        self.gateway.tick(self.started + Duration::from_secs(2));
        self.gateway.on_simple_descriptor(&SimpleDescriptor {
            short_addr,
            endpoint,
            device_type: 0x0100,
            in_clusters: vec![0x0000, 0x0006, 0x0008],
            out_clusters: vec![0x0019],
        });
    }

    /// Send a request datagram and pump the gateway.
    fn send(&mut self, msg: &Message) {
        let wire = msg.serialize().unwrap();
        self.client
            .send_to(&wire, ("127.0.0.1", self.gateway_port))
            .unwrap();
        self.gateway
            .handle_readable(Token(0), self.started + Duration::from_secs(3));
    }

    fn recv(&self) -> Message {
        let mut buf = [0u8; 1152];
        let (len, _) = self.client.recv_from(&mut buf).unwrap();
        Message::parse(&buf[..len]).unwrap()
    }
}

fn get(path: &str, mid: u16) -> Message {
    let mut msg = Message::new(MsgType::Confirmable, Code::GET, mid);
    msg.token = vec![mid as u8];
    msg.set_path(path);
    msg
}

fn post(path: &str, mid: u16) -> Message {
    let mut msg = Message::new(MsgType::Confirmable, Code::POST, mid);
    msg.token = vec![mid as u8];
    msg.set_path(path);
    msg
}

#[test]
fn zero_arg_command_resolves_target() {
    let mut h = Harness::new(27101);
    h.join_device([0xAA; 8], 0x1234, 1);

    h.send(&post("e/1/c6/c/0", 10));
    let response = h.recv();
    assert_eq!(response.code, Code::CREATED);
    assert_eq!(response.mtype, MsgType::Acknowledgement);
    assert_eq!(response.message_id, 10);
    assert_eq!(response.token, vec![10]);

    assert_eq!(
        h.gateway.driver_mut().commands,
        vec![(0x1234, 1, 0x0006, true, 0x00, vec![])]
    );
}

#[test]
fn well_known_core_is_fixed_regardless_of_registry() {
    let mut h = Harness::new(27102);

    // Empty registry
    h.send(&get(".well-known/core", 20));
    let empty = h.recv();
    assert_eq!(empty.code, Code::CONTENT);
    let document = empty.payload.clone();
    assert!(!document.is_empty());

    // Populated registry: identical document
    h.join_device([0xBB; 8], 0x2222, 1);
    h.send(&get(".well-known/core", 21));
    let populated = h.recv();
    assert_eq!(populated.code, Code::CONTENT);
    assert_eq!(populated.payload, document);
}

#[test]
fn attribute_read_runs_the_delayed_exchange() {
    let mut h = Harness::new(27103);
    h.join_device([0xCC; 8], 0x3333, 1);

    h.send(&get("e/1/c6/a/0", 30));

    // The read was issued and the request got an empty ACK.
    assert_eq!(
        h.gateway.driver_mut().reads,
        vec![(0x3333, 1, 0x0006, vec![0x0000])]
    );
    let ack = h.recv();
    assert_eq!(ack.code, Code::EMPTY);
    assert_eq!(ack.mtype, MsgType::Acknowledgement);
    assert_eq!(ack.message_id, 30);

    // Mesh answers: attr 0 BOOL true.
    h.gateway
        .on_attribute_response(0x3333, 1, 0x0006, &[0x00, 0x00, 0x00, 0x10, 0x01]);
    let separate = h.recv();
    assert_eq!(separate.code, Code::CONTENT);
    assert_eq!(separate.mtype, MsgType::Confirmable);
    assert_eq!(separate.token, vec![30]);
    assert_eq!(
        separate.payload,
        vec![0xBF, 0x00, 0xBF, 0x61, b'v', 0xF5, 0xFF, 0xFF]
    );
}

#[test]
fn second_read_while_parked_is_unavailable() {
    let mut h = Harness::new(27104);
    h.join_device([0xDD; 8], 0x4444, 1);

    h.send(&get("e/1/c6/a/0", 40));
    let _ack = h.recv();

    h.send(&get("e/1/c8/a/0", 41));
    let refused = h.recv();
    assert_eq!(refused.code, Code::UNAVAILABLE);

    // The first exchange is untouched and still completes.
    h.gateway
        .on_attribute_response(0x4444, 1, 0x0006, &[0x00, 0x00, 0x00, 0x10, 0x00]);
    let separate = h.recv();
    assert_eq!(separate.code, Code::CONTENT);
    assert_eq!(separate.token, vec![40]);
}

#[test]
fn parked_exchange_expires_as_gateway_timeout() {
    let mut h = Harness::new(27105);
    h.join_device([0xEE; 8], 0x5555, 1);

    h.send(&get("e/1/c6/a/0", 50));
    let _ack = h.recv();

    h.gateway
        .tick(h.started + Duration::from_secs(3) + DELAYED_RESPONSE_TIMEOUT);
    let timeout = h.recv();
    assert_eq!(timeout.code, Code::GATEWAY_TIMEOUT);
    assert_eq!(timeout.token, vec![50]);
    assert!(timeout.payload.is_empty());
}

#[test]
fn resource_directory_post_then_device_notification() {
    let mut h = Harness::new(27106);
    h.join_device([0x11; 8], 0x6666, 2);

    // Pin the outbound server to the client.
    h.send(&post("rd", 60));
    assert_eq!(h.recv().code, Code::CREATED);

    // Device toggles; the gateway POSTs it back to us.
    h.gateway.on_command_received(&meshgate::mesh::CommandFrame {
        src_addr: 0x6666,
        endpoint: 2,
        cluster: 0x0006,
        frame_control: meshgate::mesh::FRAME_CLUSTER_SPECIFIC,
        command: 0x02,
        payload: vec![],
    });
    let notification = h.recv();
    assert_eq!(notification.code, Code::POST);
    assert_eq!(notification.mtype, MsgType::NonConfirmable);
    assert_eq!(notification.path_segments(), vec!["e", "2", "c6", "c", "2"]);
    assert_eq!(notification.payload, vec![0xBF, 0xFF]);
}

#[test]
fn discovery_fires_requests_in_order() {
    let mut h = Harness::new(27107);
    h.gateway.on_device_announce(0x7777, &[0x22; 8]);
    h.gateway.tick(h.started + Duration::from_secs(1));
    assert_eq!(h.gateway.driver_mut().endpoint_requests, vec![0x7777]);

    h.gateway.on_active_endpoints(0x7777, &[1, 2]);
    h.gateway.tick(h.started + Duration::from_secs(2));
    assert_eq!(h.gateway.driver_mut().descriptor_requests, vec![(0x7777, 1)]);

    h.gateway.on_simple_descriptor(&SimpleDescriptor {
        short_addr: 0x7777,
        endpoint: 1,
        device_type: 0x0100,
        in_clusters: vec![0x0006],
        out_clusters: vec![],
    });
    assert_eq!(h.gateway.registry().len(), 1);

    // Second endpoint's descriptor request follows.
    h.gateway.tick(h.started + Duration::from_secs(3));
    assert_eq!(
        h.gateway.driver_mut().descriptor_requests,
        vec![(0x7777, 1), (0x7777, 2)]
    );
}

#[test]
fn registry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let started = Instant::now();

    let mut gateway = Gateway::new(Recorder::default(), 27108, path.clone(), started).unwrap();
    gateway.on_device_announce(0x8888, &[0x33; 8]);
    gateway.tick(started + Duration::from_secs(1));
    gateway.on_active_endpoints(0x8888, &[1]);
    gateway.tick(started + Duration::from_secs(2));
    gateway.on_simple_descriptor(&SimpleDescriptor {
        short_addr: 0x8888,
        endpoint: 1,
        device_type: 0x0107,
        in_clusters: vec![0x0406],
        out_clusters: vec![],
    });
    assert_eq!(gateway.registry().len(), 1);
    drop(gateway);

    let reloaded = Gateway::new(Recorder::default(), 27109, path, Instant::now()).unwrap();
    assert_eq!(reloaded.registry().len(), 1);
    let (_, record) = reloaded.registry().find_by_addr(0x8888).unwrap();
    assert_eq!(record.identity, [0x33; 8]);
    assert_eq!(record.endpoint, 1);
}

/// Observer double writing into a shared event log.
struct EventLog(Rc<RefCell<Vec<String>>>);

impl GatewayObserver for EventLog {
    fn on_endpoint_discovered(&mut self, identity: &Eui64, endpoint: u8) {
        self.0
            .borrow_mut()
            .push(format!("discovered {:02x} ep {}", identity[0], endpoint));
    }

    fn on_device_rejoined(&mut self, identity: &Eui64, short_addr: u16) {
        self.0
            .borrow_mut()
            .push(format!("rejoined {:02x} at {:#06x}", identity[0], short_addr));
    }

    fn on_device_removed(&mut self, identity: &Eui64) {
        self.0
            .borrow_mut()
            .push(format!("removed {:02x}", identity[0]));
    }
}

#[test]
fn lifecycle_events_reach_the_observer() {
    let mut h = Harness::new(27111);
    let events = Rc::new(RefCell::new(Vec::new()));
    h.gateway.set_observer(Box::new(EventLog(events.clone())));

    h.join_device([0x55; 8], 0xAAAA, 3);
    assert_eq!(events.borrow().as_slice(), ["discovered 55 ep 3"]);

    // A completed identity reannouncing is a rejoin, not a rediscovery.
    h.gateway.on_device_announce(0xABCD, &[0x55; 8]);
    assert_eq!(events.borrow().last().map(String::as_str), Some("rejoined 55 at 0xabcd"));

    h.gateway.on_leave(0xABCD, &[0x55; 8]);
    assert_eq!(events.borrow().last().map(String::as_str), Some("removed 55"));
}

#[test]
fn unknown_resource_and_method_codes() {
    let mut h = Harness::new(27110);
    h.join_device([0x44; 8], 0x9999, 1);

    // Unknown endpoint
    h.send(&post("e/9/c6/c/0", 70));
    assert_eq!(h.recv().code, Code::NOT_FOUND);

    // Wrong method on the command resource
    h.send(&get("e/1/c6/c/0", 71));
    assert_eq!(h.recv().code, Code::METHOD_NOT_ALLOWED);

    // Malformed cluster segment
    h.send(&post("e/1/zz/c/0", 72));
    assert_eq!(h.recv().code, Code::BAD_REQUEST);
}
