// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! meshgated - standalone meshgate daemon.
//!
//! Runs the gateway event loop over a [`NullDriver`], which logs and drops
//! every mesh request. Useful for exercising the CoAP surface (discovery
//! document, resource directory, path grammar, delayed-response timing)
//! without a mesh runtime attached; a real deployment embeds the library
//! and wires [`meshgate::mesh::MeshEventSink`] to its radio stack.
//!
//! ```bash
//! # Default CoAP port 5683, registry in ./meshgate-registry.db
//! meshgated
//!
//! # Custom port and registry path
//! meshgated --port 15683 --registry /var/lib/meshgate/registry.db
//! ```

use clap::Parser;
use meshgate::gateway::Gateway;
use meshgate::mesh::NullDriver;
use mio::{Events, Poll};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{error, info};

/// meshgate CoAP gateway daemon
#[derive(Parser, Debug)]
#[command(name = "meshgated")]
#[command(about = "CoAP/CBOR gateway for low-power mesh application networks")]
#[command(version)]
struct Args {
    /// CoAP listen port
    #[arg(short, long, default_value_t = meshgate::config::coap_port())]
    port: u16,

    /// Registry persistence path
    #[arg(short, long, default_value_os_t = PathBuf::from(meshgate::config::registry_path()))]
    registry: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .init();

    info!("meshgated {} starting on port {}", meshgate::VERSION, args.port);

    if let Err(err) = run(&args) {
        error!("fatal: {}", err);
        process::exit(1);
    }
}

fn run(args: &Args) -> meshgate::Result<()> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(64);

    let mut gateway = Gateway::new(
        NullDriver,
        args.port,
        args.registry.clone(),
        Instant::now(),
    )?;
    gateway.attach_poll(poll.registry())?;

    info!(
        "registry at {} with {} record(s)",
        args.registry.display(),
        gateway.registry().len()
    );

    loop {
        let now = Instant::now();
        let timeout = gateway.next_timeout(now);
        poll.poll(&mut events, Some(timeout))?;

        let now = Instant::now();
        for event in events.iter() {
            if event.is_readable() {
                gateway.handle_readable(event.token(), now);
            }
        }
        gateway.tick(now);
    }
}
