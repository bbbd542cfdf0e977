// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Mesh-side collaborator interfaces.
//!
//! The gateway never talks to the radio stack directly. Outbound requests go
//! through [`MeshDriver`], which the host implements over its real mesh
//! runtime; inbound events arrive through [`MeshEventSink`], which the
//! gateway implements. Both are fire-and-forget: responses come back later
//! as events keyed by source address.

use crate::error::Result;

/// 8-byte node identity (EUI-64).
pub type Eui64 = [u8; 8];

/// Cluster-specific frame bit in the mesh frame control field. Frames
/// with this bit clear carry global (profile-wide) commands.
pub const FRAME_CLUSTER_SPECIFIC: u8 = 0x01;

/// Attribute data type codes used in read-attribute-response records.
///
/// The response walker dispatches on these; everything else truncates the
/// translated payload at that record.
pub mod data_type {
    /// Boolean, 1 byte.
    pub const BOOL: u8 = 0x10;
    /// Unsigned integers, 1..=8 bytes (`0x20 + width - 1`).
    pub const U8: u8 = 0x20;
    pub const U16: u8 = 0x21;
    pub const U32: u8 = 0x23;
    pub const U64: u8 = 0x27;
    /// Signed integers, 1..=8 bytes (`0x28 + width - 1`).
    pub const I8: u8 = 0x28;
    pub const I16: u8 = 0x29;
    pub const I32: u8 = 0x2B;
    pub const I64: u8 = 0x2F;
    /// Half-precision float, 2 bytes.
    pub const FLOAT16: u8 = 0x38;
    /// Single-precision float, 4 bytes.
    pub const FLOAT32: u8 = 0x39;
    /// Double-precision float, 8 bytes.
    pub const FLOAT64: u8 = 0x3A;
    /// Byte string, 1-byte length prefix (0xFF length means empty).
    pub const OCTET_STRING: u8 = 0x41;
    /// Character string, 1-byte length prefix (0xFF length means empty).
    pub const CHAR_STRING: u8 = 0x42;
    /// Byte string, 2-byte length prefix (0xFFFF length means empty).
    pub const LONG_OCTET_STRING: u8 = 0x43;
    /// Character string, 2-byte length prefix (0xFFFF length means empty).
    pub const LONG_CHAR_STRING: u8 = 0x44;
}

/// Simple descriptor delivered when endpoint discovery completes.
#[derive(Debug, Clone)]
pub struct SimpleDescriptor {
    pub short_addr: u16,
    pub endpoint: u8,
    pub device_type: u16,
    /// Server-side cluster ids.
    pub in_clusters: Vec<u16>,
    /// Client-side cluster ids.
    pub out_clusters: Vec<u16>,
}

/// An incoming cluster-specific command frame from the mesh.
#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub src_addr: u16,
    pub endpoint: u8,
    pub cluster: u16,
    /// Raw frame control byte; bit 0 distinguishes cluster-specific from
    /// global frames.
    pub frame_control: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl CommandFrame {
    pub fn is_cluster_specific(&self) -> bool {
        self.frame_control & FRAME_CLUSTER_SPECIFIC != 0
    }
}

/// Outbound mesh request primitives, implemented by the host runtime.
///
/// All sends are asynchronous; success here only means the request was
/// handed to the stack.
pub trait MeshDriver {
    /// Invoke a cluster command on a device.
    fn send_command(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        to_server: bool,
        command: u8,
        args: &[u8],
    ) -> Result<()>;

    /// Request a read of one or more attributes.
    fn read_attributes(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        to_server: bool,
        attrs: &[u16],
    ) -> Result<()>;

    /// Write a single attribute value.
    fn write_attribute(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        attr: u16,
        data_type: u8,
        value: &[u8],
    ) -> Result<()>;

    /// Ask a node for its list of active endpoints.
    fn request_active_endpoints(&mut self, dest: u16) -> Result<()>;

    /// Ask a node for the simple descriptor of one endpoint.
    fn request_simple_descriptor(&mut self, dest: u16, endpoint: u8) -> Result<()>;

    /// Tell a node to leave the network.
    fn send_leave(&mut self, dest: u16, identity: &Eui64) -> Result<()>;
}

/// Inbound mesh events, implemented by the gateway.
pub trait MeshEventSink {
    /// A node joined, rejoined, or changed short address.
    fn on_device_announce(&mut self, short_addr: u16, identity: &Eui64);

    /// A node confirmed it left the network.
    fn on_leave(&mut self, short_addr: u16, identity: &Eui64);

    /// Active-endpoints response for a pending discovery task.
    fn on_active_endpoints(&mut self, short_addr: u16, endpoints: &[u8]);

    /// Simple-descriptor response for a pending discovery task.
    fn on_simple_descriptor(&mut self, descriptor: &SimpleDescriptor);

    /// Raw read-attribute-response / report payload from a node.
    fn on_attribute_response(&mut self, src_addr: u16, endpoint: u8, cluster: u16, payload: &[u8]);

    /// Cluster command received from a node.
    fn on_command_received(&mut self, frame: &CommandFrame);

    /// Delivery status for an earlier unicast send.
    fn on_send_status(&mut self, dest: u16, delivered: bool);
}

/// Driver that logs and drops every request.
///
/// Used by tests and by the standalone daemon when no mesh runtime is
/// attached.
#[derive(Debug, Default)]
pub struct NullDriver;

impl MeshDriver for NullDriver {
    fn send_command(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        to_server: bool,
        command: u8,
        args: &[u8],
    ) -> Result<()> {
        log::debug!(
            "[mesh] drop command dest={:#06x} ep={} cluster={:#06x} srv={} cmd={:#04x} args={}B",
            dest,
            endpoint,
            cluster,
            to_server,
            command,
            args.len()
        );
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
        log::debug!(
            "[mesh] drop read dest={:#06x} ep={} cluster={:#06x} attrs={:?}",
            dest,
            endpoint,
            cluster,
            attrs
        );
        Ok(())
    }

    fn write_attribute(
        &mut self,
        dest: u16,
        endpoint: u8,
        cluster: u16,
        attr: u16,
        data_type: u8,
        _value: &[u8],
    ) -> Result<()> {
        log::debug!(
            "[mesh] drop write dest={:#06x} ep={} cluster={:#06x} attr={:#06x} type={:#04x}",
            dest,
            endpoint,
            cluster,
            attr,
            data_type
        );
        Ok(())
    }

    fn request_active_endpoints(&mut self, dest: u16) -> Result<()> {
        log::debug!("[mesh] drop active-endpoints request dest={:#06x}", dest);
        Ok(())
    }

    fn request_simple_descriptor(&mut self, dest: u16, endpoint: u8) -> Result<()> {
        log::debug!(
            "[mesh] drop simple-descriptor request dest={:#06x} ep={}",
            dest,
            endpoint
        );
        Ok(())
    }

    fn send_leave(&mut self, dest: u16, identity: &Eui64) -> Result<()> {
        log::debug!(
            "[mesh] drop leave dest={:#06x} identity={:02x?}",
            dest,
            identity
        );
        Ok(())
    }
}
