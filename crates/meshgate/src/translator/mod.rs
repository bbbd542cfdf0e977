// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 meshgate contributors

//! Wire-to-mesh protocol translation.
//!
//! The request path parses a Uri-Path of the form
//!
//! ```text
//! [e <endpoint>] <dir><cluster-hex> ( c <command-hex> | a ( * | <attr-hex> ) )
//! ```
//!
//! where `<dir>` is `c` (client side talks to the server cluster) or `s`.
//! Each truncation point answers a list: no segments at all lists
//! endpoints, a bare endpoint lists its clusters, a bare cluster lists its
//! resources. Commands are invoked immediately; attribute reads are
//! deferred until the mesh answers.

pub mod command;
pub mod response;
pub mod tables;

use crate::cbor::{CborReader, CborWriter};
use crate::coap::message::{Code, Message, CONTENT_FORMAT_CBOR};
use crate::error::{Error, Result};
use crate::mesh::MeshDriver;
use crate::registry::DeviceRegistry;

/// Scratch size for list responses.
const LIST_BUF_SIZE: usize = 256;
/// Widest argument block a command can carry (format chars * 4 bytes).
const MAX_COMMAND_ARGS: usize = 32;

/// Immediate wire response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub code: Code,
    pub payload: Vec<u8>,
    pub content_format: Option<u8>,
}

impl Response {
    pub fn status(code: Code) -> Self {
        Self {
            code,
            payload: Vec::new(),
            content_format: None,
        }
    }

    pub fn cbor(code: Code, payload: Vec<u8>) -> Self {
        Self {
            code,
            payload,
            content_format: Some(CONTENT_FORMAT_CBOR),
        }
    }
}

/// What the caller should do with the exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Answer right away.
    Respond(Response),
    /// A mesh read is in flight; park the response in the delayed slot.
    Defer,
}

/// Wire status for a translator-level failure.
pub fn error_code(err: &Error) -> Code {
    match err {
        Error::Decode { .. } | Error::Protocol { .. } => Code::BAD_REQUEST,
        Error::Lookup { .. } => Code::NOT_FOUND,
        Error::Timeout => Code::GATEWAY_TIMEOUT,
        Error::Capacity { .. } => Code::UNAVAILABLE,
        Error::BufferFull { .. } | Error::Io(_) => Code::INTERNAL_ERROR,
    }
}

/// Parsed addressing prefix of a request path.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    endpoint: u8,
    cluster: u16,
    to_server: bool,
}

/// Handle one request on the generic command resource.
///
/// `port_slot` carries the registry slot when the request arrived on a
/// per-device port; the default port resolves the endpoint across the
/// whole registry.
pub fn handle_request<D: MeshDriver>(
    request: &Message,
    registry: &DeviceRegistry,
    driver: &mut D,
    port_slot: Option<usize>,
) -> Outcome {
    match dispatch(request, registry, driver, port_slot) {
        Ok(outcome) => outcome,
        Err(err) => {
            log::debug!("[xlat] request failed: {}", err);
            Outcome::Respond(Response::status(error_code(&err)))
        }
    }
}

fn dispatch<D: MeshDriver>(
    request: &Message,
    registry: &DeviceRegistry,
    driver: &mut D,
    port_slot: Option<usize>,
) -> Result<Outcome> {
    let segments = request.path_segments();
    let mut index = 0;

    // Endpoint addressing: explicit "e <n>", a bare integer, or nothing
    // at all on a per-device port (the slot's record supplies the
    // endpoint and the first segment is the cluster). No segments at all
    // lists endpoints.
    let Some(first) = segments.get(index) else {
        if request.code != Code::GET {
            return Ok(method_not_allowed(request));
        }
        return endpoint_list(registry, port_slot).map(Outcome::Respond);
    };
    let endpoint = if *first == "e" {
        index += 1;
        let endpoint = parse_endpoint(segments.get(index))?;
        index += 1;
        endpoint
    } else if let Ok(endpoint) = first.parse::<u8>() {
        index += 1;
        endpoint
    } else if let Some(slot) = port_slot {
        registry
            .get(slot)
            .ok_or_else(|| Error::Lookup {
                reason: format!("no device behind slot {}", slot),
            })?
            .endpoint
    } else {
        return Err(Error::Protocol {
            reason: format!("bad endpoint segment {:?}", first),
        });
    };

    // Cluster segment, or a cluster list for the bare endpoint.
    let Some(cluster_seg) = segments.get(index) else {
        if request.code != Code::GET {
            return Ok(method_not_allowed(request));
        }
        return cluster_list(registry, port_slot, endpoint).map(Outcome::Respond);
    };
    let (cluster, to_server) = parse_cluster(cluster_seg)?;
    index += 1;
    let target = Target {
        endpoint,
        cluster,
        to_server,
    };

    // Resource marker, or the fixed resource list for the bare cluster.
    let Some(marker) = segments.get(index) else {
        if request.code != Code::GET {
            return Ok(method_not_allowed(request));
        }
        return resource_list().map(Outcome::Respond);
    };
    index += 1;

    let record = resolve(registry, port_slot, endpoint)?;
    match *marker {
        "c" => invoke_command(request, driver, record.short_addr, target, segments.get(index)),
        "a" => read_attribute(request, driver, record.short_addr, target, segments.get(index)),
        other => Err(Error::Protocol {
            reason: format!("unknown resource marker {:?}", other),
        }),
    }
}

fn method_not_allowed(request: &Message) -> Outcome {
    log::debug!("[xlat] method {} not allowed here", request.code);
    Outcome::Respond(Response::status(Code::METHOD_NOT_ALLOWED))
}

fn parse_endpoint(segment: Option<&&str>) -> Result<u8> {
    let segment = segment.ok_or_else(|| Error::Protocol {
        reason: "missing endpoint segment".into(),
    })?;
    segment.parse().map_err(|_| Error::Protocol {
        reason: format!("bad endpoint segment {:?}", segment),
    })
}

/// Cluster segment: direction prefix (`c` client side, `s` server side)
/// followed by the hex cluster id.
fn parse_cluster(segment: &str) -> Result<(u16, bool)> {
    let mut chars = segment.chars();
    let to_server = match chars.next() {
        Some('c') => true,
        Some('s') => false,
        _ => {
            return Err(Error::Protocol {
                reason: format!("bad cluster segment {:?}", segment),
            })
        }
    };
    let cluster = u16::from_str_radix(chars.as_str(), 16).map_err(|_| Error::Protocol {
        reason: format!("bad cluster segment {:?}", segment),
    })?;
    Ok((cluster, to_server))
}

fn parse_hex_u16(segment: Option<&&str>, what: &str) -> Result<u16> {
    let segment = segment.ok_or_else(|| Error::Protocol {
        reason: format!("missing {} segment", what),
    })?;
    u16::from_str_radix(segment, 16).map_err(|_| Error::Protocol {
        reason: format!("bad {} segment {:?}", what, segment),
    })
}

/// Resolve the device record for an endpoint. A per-device port pins the
/// identity; the default port takes the first match across the registry.
fn resolve<'r>(
    registry: &'r DeviceRegistry,
    port_slot: Option<usize>,
    endpoint: u8,
) -> Result<&'r crate::registry::DeviceRecord> {
    if let Some(slot) = port_slot {
        let pinned = registry.get(slot).ok_or_else(|| Error::Lookup {
            reason: format!("no device behind slot {}", slot),
        })?;
        let (_, record) = registry
            .iter()
            .find(|(_, r)| r.identity == pinned.identity && r.endpoint == endpoint)
            .ok_or_else(|| Error::Lookup {
                reason: format!("device has no endpoint {}", endpoint),
            })?;
        return Ok(record);
    }
    registry
        .find_by_endpoint(endpoint)
        .map(|(_, r)| r)
        .ok_or_else(|| Error::Lookup {
            reason: format!("no device with endpoint {}", endpoint),
        })
}

fn endpoint_list(registry: &DeviceRegistry, port_slot: Option<usize>) -> Result<Response> {
    let identity = port_slot.and_then(|slot| registry.get(slot)).map(|r| r.identity);
    let mut endpoints: Vec<u8> = registry
        .iter()
        .filter(|(_, r)| identity.map(|id| r.identity == id).unwrap_or(true))
        .map(|(_, r)| r.endpoint)
        .collect();
    endpoints.sort_unstable();
    endpoints.dedup();

    let mut buf = [0u8; LIST_BUF_SIZE];
    let mut writer = CborWriter::new(&mut buf);
    writer.array_open()?;
    for endpoint in endpoints {
        writer.uint8(endpoint)?;
    }
    writer.brk()?;
    let len = writer.offset();
    Ok(Response::cbor(Code::CONTENT, buf[..len].to_vec()))
}

fn cluster_list(
    registry: &DeviceRegistry,
    port_slot: Option<usize>,
    endpoint: u8,
) -> Result<Response> {
    let record = resolve(registry, port_slot, endpoint)?;
    let mut buf = [0u8; LIST_BUF_SIZE];
    let mut writer = CborWriter::new(&mut buf);
    writer.array_open()?;
    for cluster in &record.clusters {
        writer.uint16(*cluster)?;
    }
    writer.brk()?;
    let len = writer.offset();
    Ok(Response::cbor(Code::CONTENT, buf[..len].to_vec()))
}

fn resource_list() -> Result<Response> {
    let mut buf = [0u8; 8];
    let mut writer = CborWriter::new(&mut buf);
    writer.array_open()?;
    writer.text("c")?;
    writer.text("a")?;
    writer.brk()?;
    let len = writer.offset();
    Ok(Response::cbor(Code::CONTENT, buf[..len].to_vec()))
}

fn invoke_command<D: MeshDriver>(
    request: &Message,
    driver: &mut D,
    short_addr: u16,
    target: Target,
    command_seg: Option<&&str>,
) -> Result<Outcome> {
    if request.code != Code::POST {
        return Ok(method_not_allowed(request));
    }
    let command_id = parse_hex_u16(command_seg, "command")?;
    let command = u8::try_from(command_id).map_err(|_| Error::Protocol {
        reason: format!("command id {:#x} out of range", command_id),
    })?;
    let format = tables::outbound_format(target.cluster, command).ok_or_else(|| Error::Lookup {
        reason: format!(
            "no command {:#04x} on cluster {:#06x}",
            command, target.cluster
        ),
    })?;

    let mut args = [0u8; MAX_COMMAND_ARGS];
    let len = pack_args(format, &request.payload, &mut args)?;
    driver.send_command(
        short_addr,
        target.endpoint,
        target.cluster,
        target.to_server,
        command,
        &args[..len],
    )?;
    log::info!(
        "[xlat] command {:#04x} cluster {:#06x} ep {} addr {:#06x} ({} arg byte(s))",
        command,
        target.cluster,
        target.endpoint,
        short_addr,
        len
    );
    Ok(Outcome::Respond(Response::status(Code::CREATED)))
}

/// Pull arguments out of the request's binary map and pack them
/// little-endian per the format string. The map keys are argument indexes.
fn pack_args(format: &str, payload: &[u8], out: &mut [u8]) -> Result<usize> {
    if format.is_empty() {
        return Ok(0);
    }
    let mut values: Vec<Option<i64>> = vec![None; format.len()];
    let mut reader = CborReader::new(payload)?;
    while reader.remaining() > 0 && !reader.at_break() {
        let index = reader.uint()? as usize;
        let value = reader.int()?;
        if index >= values.len() {
            return Err(Error::Protocol {
                reason: format!("argument index {} out of range", index),
            });
        }
        values[index] = Some(value);
    }

    let mut offset = 0;
    for (index, spec) in format.chars().enumerate() {
        let width = tables::arg_width(spec).ok_or_else(|| Error::Protocol {
            reason: format!("bad format char {:?}", spec),
        })?;
        let value = values[index].ok_or_else(|| Error::Protocol {
            reason: format!("missing argument {}", index),
        })?;
        check_range(value, width, tables::arg_signed(spec))?;
        out[offset..offset + width].copy_from_slice(&value.to_le_bytes()[..width]);
        offset += width;
    }
    Ok(offset)
}

fn check_range(value: i64, width: usize, signed: bool) -> Result<()> {
    let bits = width as u32 * 8;
    let fits = if signed {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        value >= min && value <= max
    } else {
        value >= 0 && (bits == 64 || value < 1i64 << bits)
    };
    if !fits {
        return Err(Error::Protocol {
            reason: format!("argument {} does not fit {} byte(s)", value, width),
        });
    }
    Ok(())
}

fn read_attribute<D: MeshDriver>(
    request: &Message,
    driver: &mut D,
    short_addr: u16,
    target: Target,
    attr_seg: Option<&&str>,
) -> Result<Outcome> {
    if request.code != Code::GET {
        // Attribute writes over the wire are not supported.
        return Ok(Outcome::Respond(Response::status(Code::NOT_IMPLEMENTED)));
    }
    let attrs: Vec<u16> = if attr_seg.map(|s| *s) == Some(tables::ATTR_WILDCARD) {
        tables::wildcard_attrs(target.cluster)
            .ok_or_else(|| Error::Lookup {
                reason: format!("no wildcard set for cluster {:#06x}", target.cluster),
            })?
            .to_vec()
    } else {
        vec![parse_hex_u16(attr_seg, "attribute")?]
    };
    driver.read_attributes(
        short_addr,
        target.endpoint,
        target.cluster,
        target.to_server,
        &attrs,
    )?;
    log::debug!(
        "[xlat] read {:?} cluster {:#06x} ep {} addr {:#06x}, deferring",
        attrs,
        target.cluster,
        target.endpoint,
        short_addr
    );
    Ok(Outcome::Defer)
}
