//! Reader for eMule `nodes.dat` contact files.
//!
//! Supported layouts:
//!
//! - version 0: `count u32`, entries of `id, ip, udp, tcp, type u8`
//! - versions 1-3: `0u32`, `version u32`, [`edition u32` for v3], `count u32`,
//!   entries of `id, ip, udp, tcp, version u8` and, from v2 on, the KAD UDP
//!   key (`key u32, ip u32`) and a `verified u8` flag
//!
//! A v3 file with bootstrap edition 1 uses the v1 entry layout.

use crate::codec::ByteReader;
use crate::contact::Contact;
use crate::error::{ProtoError, Result};
use crate::kad_id::KadId;
use std::net::Ipv4Addr;
use std::path::Path;

const MAX_SUPPORTED_VERSION: u32 = 3;

/// Contacts with a v0 `type` at or above this are stale
const MAX_V0_CONTACT_TYPE: u8 = 4;

/// Parse the contents of a `nodes.dat` file
///
/// Entries with an unroutable endpoint are skipped.
///
/// # Errors
///
/// Returns [`ProtoError::InvalidNodesFile`] for unknown versions and
/// [`ProtoError::TruncatedMessage`] when an entry is cut short.
pub fn parse_nodes_dat(data: &[u8]) -> Result<Vec<Contact>> {
    let mut r = ByteReader::new(data);

    let mut count = r.read_u32()?;
    let mut version = 0;
    let mut bootstrap = false;
    if count == 0 {
        version = r.read_u32()?;
        if version == 0 || version > MAX_SUPPORTED_VERSION {
            return Err(ProtoError::InvalidNodesFile(format!(
                "unsupported version {version}"
            )));
        }
        if version == 3 {
            bootstrap = r.read_u32()? == 1;
        }
        count = r.read_u32()?;
    }

    let entry_len = match (version, bootstrap) {
        (0, _) | (1, _) | (3, true) => 25,
        _ => 25 + 9,
    };
    let mut contacts = Vec::with_capacity((count as usize).min(r.remaining() / entry_len));

    for _ in 0..count {
        let id = KadId::from_wire(r.read_array()?);
        let ip = Ipv4Addr::from(r.read_u32()?);
        let udp_port = r.read_u16()?;
        let tcp_port = r.read_u16()?;

        let contact_version = if version == 0 {
            let contact_type = r.read_u8()?;
            if contact_type >= MAX_V0_CONTACT_TYPE {
                continue;
            }
            0
        } else {
            r.read_u8()?
        };

        if version >= 2 && !bootstrap {
            // kad udp key, key ip, verified flag
            r.read_bytes(9)?;
        }

        let contact = Contact {
            id,
            ip,
            udp_port,
            tcp_port,
            version: contact_version,
        };
        if contact.is_routable() {
            contacts.push(contact);
        }
    }

    tracing::debug!(
        version,
        declared = count,
        loaded = contacts.len(),
        "parsed nodes.dat"
    );
    Ok(contacts)
}

/// Read and parse a `nodes.dat` file from disk
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or a parse error.
pub fn load_nodes_dat(path: impl AsRef<Path>) -> Result<Vec<Contact>> {
    let data = std::fs::read(path)?;
    parse_nodes_dat(&data)
}
