//! # kadseek Proto
//!
//! Wire-level building blocks for the KAD overlay, the Kademlia network used
//! by eDonkey2000/eMule compatible clients.
//!
//! This crate provides:
//! - 128-bit identifiers with the XOR distance metric
//! - A bounds-checked little-endian cursor codec
//! - MD4/MD5 hash transforms for search targets and UDP verify keys
//! - KAD2 request/response messages, tag lists and file records
//! - A `nodes.dat` reader for seeding contacts
//!
//! ## Example
//!
//! ```rust
//! use kadseek_proto::{KadId, hash::keyword_target};
//!
//! let local = KadId::random();
//! let target = keyword_target("ubuntu");
//! let tolerance = target.distance(&local).get_32bit_chunk(0);
//! assert!(tolerance.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod contact;
pub mod error;
pub mod hash;
pub mod kad_id;
pub mod messages;
pub mod nodes;
pub mod tag;

pub use codec::{ByteReader, ByteWriter};
pub use contact::Contact;
pub use error::{ProtoError, Result};
pub use kad_id::{KadId, ParseKadIdError};
pub use messages::{
    FileRecord, Kad2Req, Kad2Res, Kad2SearchKeyReq, Kad2SearchRes, KadMessage, SearchResult,
};
pub use nodes::{load_nodes_dat, parse_nodes_dat};

/// Default local UDP port for KAD traffic
pub const DEFAULT_UDP_PORT: u16 = 1979;

/// Default local TCP port advertised to peers
pub const DEFAULT_TCP_PORT: u16 = 1988;

/// Largest UDP datagram the overlay sends
pub const MAX_DATAGRAM_SIZE: usize = 8 * 1024;
