// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Flat-file persistence for the device registry.
//!
//! One line per active record, terminated by a sentinel line:
//!
//! ```text
//! <short-addr> <endpoint> <device-type> <id0..id7> <n> <cluster..> <split>
//! end
//! ```
//!
//! All fields are hexadecimal except the cluster count and split index.
//! Lifecycle state and last-contact are deliberately not persisted: a
//! reloaded record starts `Joined` with a fresh contact clock. A missing or
//! unreadable file is "no prior state", never an error.

use super::{DeviceRecord, DeviceRegistry, LifecycleState};
use crate::mesh::Eui64;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Sentinel terminating the record list.
const SENTINEL: &str = "end";

/// Serialize the whole table. The write goes through a temp file and an
/// atomic rename so a crash never leaves a truncated store behind.
pub fn save(registry: &DeviceRegistry, path: &Path) -> io::Result<()> {
    let mut out = String::new();
    let mut count = 0;
    for (_, record) in registry.iter() {
        write_line(&mut out, record);
        count += 1;
    }
    out.push_str(SENTINEL);
    out.push('\n');

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &out)?;
    fs::rename(&tmp, path)?;
    log::debug!("[reg] persisted {} record(s) to {}", count, path.display());
    Ok(())
}

/// Deserialize the table. Missing or malformed state loads as empty.
pub fn load(path: &Path) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    let Ok(contents) = fs::read_to_string(path) else {
        log::info!("[reg] no persisted registry at {}", path.display());
        return registry;
    };

    let mut loaded = 0;
    for line in contents.lines() {
        if line == SENTINEL {
            break;
        }
        match parse_line(line) {
            Some(record) => {
                if registry.insert(record).is_ok() {
                    loaded += 1;
                }
            }
            None => {
                log::warn!("[reg] skipping malformed registry line: {:?}", line);
            }
        }
    }
    log::info!(
        "[reg] loaded {} record(s) from {}",
        loaded,
        path.display()
    );
    registry
}

fn write_line(out: &mut String, record: &DeviceRecord) {
    let _ = write!(
        out,
        "{:04x} {:02x} {:04x}",
        record.short_addr, record.endpoint, record.device_type
    );
    for byte in &record.identity {
        let _ = write!(out, " {:02x}", byte);
    }
    let _ = write!(out, " {}", record.clusters.len());
    for cluster in &record.clusters {
        let _ = write!(out, " {:04x}", cluster);
    }
    let _ = writeln!(out, " {}", record.split);
}

fn parse_line(line: &str) -> Option<DeviceRecord> {
    let mut fields = line.split_whitespace();
    let short_addr = u16::from_str_radix(fields.next()?, 16).ok()?;
    let endpoint = u8::from_str_radix(fields.next()?, 16).ok()?;
    let device_type = u16::from_str_radix(fields.next()?, 16).ok()?;

    let mut identity: Eui64 = [0; 8];
    for byte in &mut identity {
        *byte = u8::from_str_radix(fields.next()?, 16).ok()?;
    }

    let count: usize = fields.next()?.parse().ok()?;
    let mut clusters = Vec::with_capacity(count);
    for _ in 0..count {
        clusters.push(u16::from_str_radix(fields.next()?, 16).ok()?);
    }
    let split: usize = fields.next()?.parse().ok()?;
    if split > clusters.len() || fields.next().is_some() {
        return None;
    }

    Some(DeviceRecord {
        identity,
        short_addr,
        endpoint,
        device_type,
        clusters,
        split,
        last_contact: 0,
        state: LifecycleState::Joined,
    })
}
