//! Shared fixtures for kadseek integration tests
//!
//! Builders for the datagrams a remote peer would send, contacts placed at a
//! chosen distance from a target, and `nodes.dat` images.

use kadseek_proto::{
    Contact, FileRecord, Kad2Res, Kad2SearchRes, KadId, KadMessage, SearchResult,
};
use kadseek_search::Datagram;
use std::net::{Ipv4Addr, SocketAddrV4};

/// A contact whose id differs from `target` by `delta` in the leading chunk
#[must_use]
pub fn contact_near(target: &KadId, delta: u32, ip: Ipv4Addr, udp_port: u16) -> Contact {
    let mut id = *target.as_bytes();
    let chunk = u32::from_be_bytes([id[0], id[1], id[2], id[3]]) ^ delta;
    id[..4].copy_from_slice(&chunk.to_be_bytes());
    Contact::new(KadId::from_bytes(id), ip, udp_port)
}

/// A file record with a deterministic hash
#[must_use]
pub fn sample_record(n: u8, name: &str) -> FileRecord {
    FileRecord {
        hash: [n; 16],
        name: name.to_string(),
        size: 1_000_000 * u64::from(n),
        file_type: None,
        avail: u32::from(n),
        media_length: 0,
    }
}

/// Search response message for `target`
#[must_use]
pub fn search_res(target: KadId, records: &[FileRecord]) -> KadMessage {
    KadMessage::Kad2SearchRes(Kad2SearchRes {
        sender: KadId::random(),
        target,
        results: records
            .iter()
            .map(|r| SearchResult {
                answer: KadId::from_bytes(r.hash),
                tags: r.to_tags(),
            })
            .collect(),
    })
}

/// Encoded search response datagram for `target`
#[must_use]
pub fn search_res_datagram(target: KadId, records: &[FileRecord]) -> Vec<u8> {
    search_res(target, records)
        .encode()
        .expect("search response encodes")
}

/// Encoded closer-peers datagram for `target`
#[must_use]
pub fn closer_res_datagram(target: KadId, contacts: Vec<Contact>) -> Vec<u8> {
    KadMessage::Kad2Res(Kad2Res { target, contacts })
        .encode()
        .expect("closer response encodes")
}

/// Decode every queued datagram
#[must_use]
pub fn decode_outbound(datagrams: &[Datagram]) -> Vec<(SocketAddrV4, KadMessage)> {
    datagrams
        .iter()
        .map(|d| {
            (
                d.to,
                KadMessage::decode(&d.payload).expect("outbound datagram decodes"),
            )
        })
        .collect()
}

/// A version 2 `nodes.dat` image holding `contacts`
#[must_use]
pub fn nodes_dat_v2(contacts: &[Contact]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(0u32.to_le_bytes());
    out.extend(2u32.to_le_bytes());
    out.extend((contacts.len() as u32).to_le_bytes());
    for c in contacts {
        out.extend(c.id.to_wire());
        out.extend(u32::from(c.ip).to_le_bytes());
        out.extend(c.udp_port.to_le_bytes());
        out.extend(c.tcp_port.to_le_bytes());
        out.push(c.version);
        out.extend([0u8; 8]);
        out.push(1);
    }
    out
}
