// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! One bound UDP listener context.
//!
//! The gateway runs a default port plus one port per registered device
//! (`DEVICE_PORT_BASE + registry_slot`), so a peer can address a device by
//! port alone. Each port carries its own message-id counter and
//! retransmission queue.

use super::retransmit::RetransmitQueue;
use crate::error::Result;
use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A bound listener port.
#[derive(Debug)]
pub struct ListenerPort {
    socket: UdpSocket,
    pub local_port: u16,
    pub token: Token,
    /// Registry slot this port is dedicated to; `None` for the default port.
    pub registry_slot: Option<usize>,
    next_message_id: u16,
    pub retransmit: RetransmitQueue,
}

impl ListenerPort {
    /// Bind a non-blocking UDP socket on all interfaces.
    pub fn bind(port: u16, token: Token, registry_slot: Option<usize>) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr.into())?;
        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket);
        log::debug!(
            "[coap] bound port {} (token {:?}, slot {:?})",
            port,
            token,
            registry_slot
        );
        Ok(Self {
            socket,
            local_port: port,
            token,
            registry_slot,
            next_message_id: port, // distinct starting points per port
            retransmit: RetransmitQueue::new(),
        })
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.socket, self.token, Interest::READABLE)
    }

    /// Next message id for an originated (non-piggybacked) message.
    pub fn next_mid(&mut self) -> u16 {
        self.next_message_id = self.next_message_id.wrapping_add(1);
        self.next_message_id
    }

    pub fn send(&self, data: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, dest)
    }

    /// Non-blocking receive; `None` when the socket is drained.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, peer)) => Ok(Some((len, peer))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
