// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Per-cluster command and attribute tables.
//!
//! Format strings name one argument per character; the character selects
//! wire width and signedness:
//!
//! ```text
//! b / B   1 byte, unsigned / signed
//! w / W   2 bytes, unsigned / signed
//! d / D   4 bytes, unsigned / signed
//! ```
//!
//! Arguments are packed little-endian in string order.

/// On/Off cluster.
pub const CLUSTER_ON_OFF: u16 = 0x0006;
/// Level Control cluster.
pub const CLUSTER_LEVEL: u16 = 0x0008;
/// Identify cluster.
pub const CLUSTER_IDENTIFY: u16 = 0x0003;
/// Temperature Measurement cluster.
pub const CLUSTER_TEMPERATURE: u16 = 0x0402;
/// Occupancy Sensing cluster.
pub const CLUSTER_OCCUPANCY: u16 = 0x0406;

/// Wildcard attribute-id path segment.
pub const ATTR_WILDCARD: &str = "*";

/// One command row: (cluster, command id, argument format).
struct CommandRow {
    cluster: u16,
    command: u8,
    format: &'static str,
}

/// Commands the wire side may invoke on a device.
const OUTBOUND_COMMANDS: &[CommandRow] = &[
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x00, format: "" },    // Off
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x01, format: "" },    // On
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x02, format: "" },    // Toggle
    CommandRow { cluster: CLUSTER_LEVEL, command: 0x00, format: "bw" },   // MoveToLevel(level, time)
    CommandRow { cluster: CLUSTER_LEVEL, command: 0x01, format: "bb" },   // Move(mode, rate)
    CommandRow { cluster: CLUSTER_LEVEL, command: 0x04, format: "bw" },   // MoveToLevelWithOnOff
    CommandRow { cluster: CLUSTER_IDENTIFY, command: 0x00, format: "w" }, // Identify(seconds)
];

/// Commands a device may send toward the wire side.
const INBOUND_COMMANDS: &[CommandRow] = &[
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x00, format: "" },
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x01, format: "" },
    CommandRow { cluster: CLUSTER_ON_OFF, command: 0x02, format: "" },
    CommandRow { cluster: CLUSTER_LEVEL, command: 0x00, format: "bw" },
    CommandRow { cluster: CLUSTER_LEVEL, command: 0x02, format: "bbw" }, // Step(mode, size, time)
];

/// Argument format for a wire-invoked command, if known.
pub fn outbound_format(cluster: u16, command: u8) -> Option<&'static str> {
    OUTBOUND_COMMANDS
        .iter()
        .find(|r| r.cluster == cluster && r.command == command)
        .map(|r| r.format)
}

/// Argument format for a device-originated command, if known.
pub fn inbound_format(cluster: u16, command: u8) -> Option<&'static str> {
    INBOUND_COMMANDS
        .iter()
        .find(|r| r.cluster == cluster && r.command == command)
        .map(|r| r.format)
}

/// Wire width of one format character.
pub fn arg_width(spec: char) -> Option<usize> {
    match spec {
        'b' | 'B' => Some(1),
        'w' | 'W' => Some(2),
        'd' | 'D' => Some(4),
        _ => None,
    }
}

/// Whether a format character names a signed argument.
pub fn arg_signed(spec: char) -> bool {
    spec.is_ascii_uppercase()
}

/// Built-in attribute sets behind the wildcard id, per cluster.
///
/// Kept as data rather than code so hosts can audit and extend the list.
const WILDCARD_ATTRS: &[(u16, &[u16])] = &[
    (CLUSTER_ON_OFF, &[0x0000]),
    (CLUSTER_LEVEL, &[0x0000, 0x0011]),
    (CLUSTER_TEMPERATURE, &[0x0000]),
];

/// Attribute ids read for a wildcard request on `cluster`.
pub fn wildcard_attrs(cluster: u16) -> Option<&'static [u16]> {
    WILDCARD_ATTRS
        .iter()
        .find(|(c, _)| *c == cluster)
        .map(|(_, attrs)| *attrs)
}
