// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Gateway configuration - single source of truth for tunables.
//!
//! All capacity bounds, timers, and port numbers live here. Components
//! never hardcode these values themselves.

use std::time::Duration;

// =======================================================================
// Registry
// =======================================================================

/// Maximum device records (one per identity+endpoint pair).
pub const REGISTRY_CAPACITY: usize = 250;

/// Endpoint id meaning "not yet discovered".
pub const ENDPOINT_UNKNOWN: u8 = 0xFF;

/// Short address meaning "unknown / not on network".
pub const SHORT_ADDR_UNKNOWN: u16 = 0xFFFF;

// =======================================================================
// Discovery state machine
// =======================================================================

/// Maximum queued discovery tasks.
pub const DISCOVERY_QUEUE_CAPACITY: usize = 64;

/// Fixed retry delay between re-fires of the same discovery request
/// (seconds). No backoff: the mesh either answers or it does not.
pub const DISCOVERY_RETRY_SECS: u32 = 6;

/// Absolute queue-residency ceiling (seconds). A task past this is
/// dropped unconditionally, whatever its phase. Leak guard, not a
/// success path.
pub const DISCOVERY_WAIT_CEILING_SECS: u32 = 120;

// =======================================================================
// CoAP transport
// =======================================================================

/// Default CoAP port (RFC 7252).
pub const COAP_DEFAULT_PORT: u16 = 5683;

/// First port used for per-device listener contexts. Device ports are
/// assigned `DEVICE_PORT_BASE + registry_slot`.
pub const DEVICE_PORT_BASE: u16 = 5690;

/// One default port plus one per registry slot.
pub const MAX_LISTENER_PORTS: usize = REGISTRY_CAPACITY + 1;

/// Largest datagram accepted or produced.
pub const MAX_MESSAGE_SIZE: usize = 1152;

/// Initial confirmable retransmission timeout (RFC 7252 ACK_TIMEOUT).
pub const ACK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Retransmission attempts before a confirmable send is abandoned.
pub const MAX_RETRANSMIT: u8 = 4;

/// Per-port retransmission queue depth.
pub const RETRANSMIT_QUEUE_CAPACITY: usize = 8;

/// Maximum registered observers across all resources.
pub const OBSERVER_CAPACITY: usize = 16;

/// Interval between observe notifications.
pub const OBSERVE_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on the single delayed-response slot. On expiry the parked
/// requester receives 5.04 so it is never left unanswered.
pub const DELAYED_RESPONSE_TIMEOUT: Duration = Duration::from_millis(400);

// =======================================================================
// Environment overrides
// =======================================================================

/// CoAP default port, overridable via `MESHGATE_PORT`.
pub fn coap_port() -> u16 {
    std::env::var("MESHGATE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(COAP_DEFAULT_PORT)
}

/// Registry persistence path, overridable via `MESHGATE_REGISTRY`.
pub fn registry_path() -> String {
    std::env::var("MESHGATE_REGISTRY").unwrap_or_else(|_| "meshgate-registry.db".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_table_covers_registry() {
        assert_eq!(MAX_LISTENER_PORTS, REGISTRY_CAPACITY + 1);
        assert!(u32::from(DEVICE_PORT_BASE) + REGISTRY_CAPACITY as u32 <= 65535);
    }

    #[test]
    fn test_ceiling_exceeds_retry() {
        assert!(DISCOVERY_WAIT_CEILING_SECS > DISCOVERY_RETRY_SECS);
    }
}
