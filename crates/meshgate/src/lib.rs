// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! meshgate - a mesh-network to CoAP application gateway.
//!
//! The gateway exposes the devices of a low-power mesh network as CoAP
//! resources over UDP: commands become POSTs, attribute reads become GETs
//! answered through a delayed-response exchange, and device-originated
//! commands become unsolicited POSTs to a remembered outbound server.
//!
//! The crate is transport-complete but mesh-agnostic: outbound mesh
//! requests go through the [`mesh::MeshDriver`] trait and inbound events
//! arrive via [`mesh::MeshEventSink`], which [`gateway::Gateway`]
//! implements. The host owns the socket readiness loop and the real mesh
//! runtime.
//!
//! ```no_run
//! use meshgate::gateway::Gateway;
//! use meshgate::mesh::NullDriver;
//! use std::time::Instant;
//!
//! let poll = mio::Poll::new()?;
//! let mut gateway = Gateway::new(
//!     NullDriver,
//!     meshgate::config::coap_port(),
//!     meshgate::config::registry_path().into(),
//!     Instant::now(),
//! )?;
//! gateway.attach_poll(poll.registry())?;
//! # Ok::<(), meshgate::error::Error>(())
//! ```

pub mod cbor;
pub mod coap;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod mesh;
pub mod registry;
pub mod translator;

pub use error::{Error, Result};

/// Crate version, for startup banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
