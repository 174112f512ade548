//! KAD2 messages used by keyword search.
//!
//! Every datagram starts with a protocol byte and an opcode:
//!
//! ```text
//! +------+--------+----------------------------+
//! | 0xE4 | opcode | body (little-endian)       |   plain
//! | 0xE5 | opcode | zlib(body)                 |   packed
//! +------+--------+----------------------------+
//! ```
//!
//! Only the four messages that drive a search are modelled. Anything else is
//! reported as [`ProtoError::UnknownOpcode`] so the caller can ignore it.

use crate::codec::{ByteReader, ByteWriter};
use crate::contact::Contact;
use crate::error::{ProtoError, Result};
use crate::kad_id::KadId;
use crate::tag::{
    TAG_FILENAME, TAG_FILESIZE, TAG_FILETYPE, TAG_MEDIA_LENGTH, TAG_SOURCES, Tag, TagValue,
    decode_tag_list, encode_tag_list, tag_list_len,
};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Plain KAD datagram
pub const OP_KADEMLIAHEADER: u8 = 0xE4;
/// zlib-packed KAD datagram
pub const OP_KADEMLIAPACKEDPROT: u8 = 0xE5;

/// Ask a peer for contacts closer to a target
pub const KADEMLIA2_REQ: u8 = 0x21;
/// Contacts closer to a target
pub const KADEMLIA2_RES: u8 = 0x29;
/// Ask a peer for files published under a keyword
pub const KADEMLIA2_SEARCH_KEY_REQ: u8 = 0x33;
/// Search results for a target
pub const KADEMLIA2_SEARCH_RES: u8 = 0x3B;

/// `KADEMLIA2_REQ` kind: value lookup (search)
pub const KADEMLIA_FIND_VALUE: u8 = 0x02;
/// `KADEMLIA2_REQ` kind: store lookup (publish)
pub const KADEMLIA_STORE: u8 = 0x04;
/// `KADEMLIA2_REQ` kind: node lookup
pub const KADEMLIA_FIND_NODE: u8 = 0x0B;

/// Largest body accepted after inflating a packed datagram
pub const MAX_UNPACKED_LEN: usize = 256 * 1024;

const HEADER_LEN: usize = 2;

/// `KADEMLIA2_REQ`: find peers closer to `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kad2Req {
    /// Lookup kind (`KADEMLIA_FIND_VALUE` for searches)
    pub kind: u8,
    /// Lookup target
    pub target: KadId,
    /// Identifier of the peer the request is addressed to
    pub receiver: KadId,
}

/// `KADEMLIA2_RES`: peers closer to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kad2Res {
    /// Lookup target this answers
    pub target: KadId,
    /// Candidate peers
    pub contacts: Vec<Contact>,
}

/// `KADEMLIA2_SEARCH_KEY_REQ`: files published under `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kad2SearchKeyReq {
    /// Keyword target
    pub target: KadId,
    /// Result offset; the high bit flags trailing search terms
    pub start_position: u16,
}

/// One entry of a search response
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// File hash for keyword results
    pub answer: KadId,
    /// Tags describing the file
    pub tags: Vec<Tag>,
}

/// `KADEMLIA2_SEARCH_RES`: files published under `target`
#[derive(Debug, Clone, PartialEq)]
pub struct Kad2SearchRes {
    /// Identifier of the responding peer
    pub sender: KadId,
    /// Keyword target this answers
    pub target: KadId,
    /// Result entries
    pub results: Vec<SearchResult>,
}

impl Kad2SearchRes {
    /// File records carried by this response, skipping non-file entries
    #[must_use]
    pub fn files(&self) -> Vec<FileRecord> {
        self.results
            .iter()
            .filter_map(FileRecord::from_result)
            .collect()
    }
}

/// A file discovered through a keyword search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    /// Content hash, in overlay (identifier) byte order
    pub hash: [u8; 16],
    /// Published file name
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// ed2k type string, when published
    pub file_type: Option<String>,
    /// Number of sources known to the answering peer
    pub avail: u32,
    /// Media length in seconds (0 when unknown)
    pub media_length: u32,
}

impl FileRecord {
    /// Build a record from a search result
    ///
    /// Returns `None` unless both a file name and a size are present.
    #[must_use]
    pub fn from_result(result: &SearchResult) -> Option<Self> {
        let mut name = None;
        let mut size = None;
        let mut file_type = None;
        let mut avail = 0u32;
        let mut media_length = 0u32;

        for tag in &result.tags {
            match (tag.id(), &tag.value) {
                (Some(TAG_FILENAME), TagValue::Str(s)) => name = Some(s.clone()),
                (Some(TAG_FILESIZE), TagValue::Bsob(b)) if b.len() == 8 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(b);
                    size = Some(u64::from_le_bytes(raw));
                }
                (Some(TAG_FILESIZE), v) => size = v.as_u64().or(size),
                (Some(TAG_FILETYPE), TagValue::Str(s)) => file_type = Some(s.clone()),
                (Some(TAG_SOURCES), v) => {
                    if let Some(n) = v.as_u64() {
                        avail = u32::try_from(n).unwrap_or(u32::MAX);
                    }
                }
                (Some(TAG_MEDIA_LENGTH), v) => {
                    if let Some(n) = v.as_u64() {
                        media_length = u32::try_from(n).unwrap_or(u32::MAX);
                    }
                }
                _ => {}
            }
        }

        Some(Self {
            hash: *result.answer.as_bytes(),
            name: name?,
            size: size?,
            file_type,
            avail,
            media_length,
        })
    }

    /// Tag list describing this record, as a peer would publish it
    #[must_use]
    pub fn to_tags(&self) -> Vec<Tag> {
        let mut tags = vec![
            Tag::with_id(TAG_FILENAME, TagValue::Str(self.name.clone())),
            match u32::try_from(self.size) {
                Ok(small) => Tag::with_id(TAG_FILESIZE, TagValue::U32(small)),
                Err(_) => Tag::with_id(TAG_FILESIZE, TagValue::U64(self.size)),
            },
        ];
        if let Some(file_type) = &self.file_type {
            tags.push(Tag::with_id(TAG_FILETYPE, TagValue::Str(file_type.clone())));
        }
        tags.push(Tag::with_id(TAG_SOURCES, TagValue::U32(self.avail)));
        if self.media_length > 0 {
            tags.push(Tag::with_id(
                TAG_MEDIA_LENGTH,
                TagValue::U32(self.media_length),
            ));
        }
        tags
    }
}

/// A decoded KAD datagram
#[derive(Debug, Clone, PartialEq)]
pub enum KadMessage {
    /// Find closer peers
    Kad2Req(Kad2Req),
    /// Closer peers
    Kad2Res(Kad2Res),
    /// Keyword search request
    Kad2SearchKeyReq(Kad2SearchKeyReq),
    /// Keyword search response
    Kad2SearchRes(Kad2SearchRes),
}

impl KadMessage {
    /// Wire opcode
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Kad2Req(_) => KADEMLIA2_REQ,
            Self::Kad2Res(_) => KADEMLIA2_RES,
            Self::Kad2SearchKeyReq(_) => KADEMLIA2_SEARCH_KEY_REQ,
            Self::Kad2SearchRes(_) => KADEMLIA2_SEARCH_RES,
        }
    }

    /// Human-readable opcode name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        opcode_name(self.opcode())
    }

    fn body_len(&self) -> usize {
        match self {
            Self::Kad2Req(_) => 1 + 16 + 16,
            Self::Kad2Res(res) => 16 + 1 + res.contacts.len().min(255) * Contact::WIRE_LEN,
            Self::Kad2SearchKeyReq(_) => 16 + 2,
            Self::Kad2SearchRes(res) => {
                16 + 16
                    + 2
                    + res
                        .results
                        .iter()
                        .take(usize::from(u16::MAX))
                        .map(|r| 16 + tag_list_len(&r.tags))
                        .sum::<usize>()
            }
        }
    }

    fn encode_body(&self, w: &mut ByteWriter<'_>) -> Result<()> {
        match self {
            Self::Kad2Req(req) => {
                w.write_u8(req.kind)?;
                w.write_bytes(&req.target.to_wire())?;
                w.write_bytes(&req.receiver.to_wire())
            }
            Self::Kad2Res(res) => {
                let contacts = &res.contacts[..res.contacts.len().min(255)];
                w.write_bytes(&res.target.to_wire())?;
                w.write_u8(contacts.len() as u8)?;
                for contact in contacts {
                    contact.encode(w)?;
                }
                Ok(())
            }
            Self::Kad2SearchKeyReq(req) => {
                w.write_bytes(&req.target.to_wire())?;
                w.write_u16(req.start_position)
            }
            Self::Kad2SearchRes(res) => {
                let results = &res.results[..res.results.len().min(usize::from(u16::MAX))];
                w.write_bytes(&res.sender.to_wire())?;
                w.write_bytes(&res.target.to_wire())?;
                w.write_u16(results.len() as u16)?;
                for result in results {
                    w.write_bytes(&result.answer.to_wire())?;
                    encode_tag_list(&result.tags, w)?;
                }
                Ok(())
            }
        }
    }

    /// Encode as a plain (`0xE4`) datagram
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; HEADER_LEN + self.body_len()];
        let mut w = ByteWriter::new(&mut buf);
        w.write_u8(OP_KADEMLIAHEADER)?;
        w.write_u8(self.opcode())?;
        self.encode_body(&mut w)?;
        debug_assert_eq!(w.position(), buf.len());
        Ok(buf)
    }

    /// Encode as a packed (`0xE5`) datagram
    pub fn encode_packed(&self) -> Result<Vec<u8>> {
        let mut body = vec![0u8; self.body_len()];
        self.encode_body(&mut ByteWriter::new(&mut body))?;

        let mut encoder = ZlibEncoder::new(
            vec![OP_KADEMLIAPACKEDPROT, self.opcode()],
            Compression::default(),
        );
        encoder.write_all(&body)?;
        Ok(encoder.finish()?)
    }

    /// Decode a datagram, inflating packed bodies
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(datagram);
        let protocol = r.read_u8()?;
        let opcode = r.read_u8()?;

        match protocol {
            OP_KADEMLIAHEADER => Self::decode_body(opcode, r.read_rest()),
            OP_KADEMLIAPACKEDPROT => {
                let body = inflate(r.read_rest())?;
                Self::decode_body(opcode, &body)
            }
            other => Err(ProtoError::UnknownProtocol(other)),
        }
    }

    fn decode_body(opcode: u8, body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body);
        let msg = match opcode {
            KADEMLIA2_REQ => Self::Kad2Req(Kad2Req {
                kind: r.read_u8()?,
                target: KadId::from_wire(r.read_array()?),
                receiver: KadId::from_wire(r.read_array()?),
            }),
            KADEMLIA2_RES => {
                let target = KadId::from_wire(r.read_array()?);
                let count = r.read_u8()?;
                let contacts = (0..count)
                    .map(|_| Contact::decode(&mut r))
                    .collect::<Result<Vec<_>>>()?;
                Self::Kad2Res(Kad2Res { target, contacts })
            }
            KADEMLIA2_SEARCH_KEY_REQ => Self::Kad2SearchKeyReq(Kad2SearchKeyReq {
                target: KadId::from_wire(r.read_array()?),
                start_position: r.read_u16()?,
            }),
            KADEMLIA2_SEARCH_RES => {
                let sender = KadId::from_wire(r.read_array()?);
                let target = KadId::from_wire(r.read_array()?);
                let count = r.read_u16()?;
                let mut results = Vec::with_capacity(usize::from(count).min(r.remaining() / 17));
                for _ in 0..count {
                    let answer = KadId::from_wire(r.read_array()?);
                    let tags = decode_tag_list(&mut r)?;
                    results.push(SearchResult { answer, tags });
                }
                Self::Kad2SearchRes(Kad2SearchRes {
                    sender,
                    target,
                    results,
                })
            }
            other => return Err(ProtoError::UnknownOpcode(other)),
        };
        Ok(msg)
    }
}

fn inflate(packed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(packed)
        .take(MAX_UNPACKED_LEN as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ProtoError::Decompress(e.to_string()))?;
    if out.len() > MAX_UNPACKED_LEN {
        return Err(ProtoError::Decompress(format!(
            "inflated body exceeds {MAX_UNPACKED_LEN} bytes"
        )));
    }
    Ok(out)
}

/// Opcode name for logs
#[must_use]
pub const fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        KADEMLIA2_REQ => "KADEMLIA2_REQ",
        KADEMLIA2_RES => "KADEMLIA2_RES",
        KADEMLIA2_SEARCH_KEY_REQ => "KADEMLIA2_SEARCH_KEY_REQ",
        KADEMLIA2_SEARCH_RES => "KADEMLIA2_SEARCH_RES",
        _ => "UNKNOWN",
    }
}
