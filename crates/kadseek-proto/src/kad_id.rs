//! KAD Identifier and Distance Metric
//!
//! This module provides the `KadId` type, the 128-bit identifier used by the
//! KAD overlay for both peers and lookup targets. Local peers pick a random
//! identifier once per process; search targets are derived from the MD4
//! digest of a keyword (see [`crate::hash::keyword_target`]).
//!
//! # Byte order
//!
//! A `KadId` stores the big-endian bytes of the 128-bit number, so byte-wise
//! comparison equals numeric comparison. On the wire the overlay writes the
//! number as four little-endian 32-bit words; [`KadId::to_wire`] and
//! [`KadId::from_wire`] convert between the two.

use crate::hash::swap_chunks;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// 128-bit identifier for the KAD overlay
///
/// The XOR metric is used for distance calculation. Ordering is the numeric
/// ordering of the 128-bit value, which makes "closer than" a total order
/// once distances are computed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KadId([u8; 16]);

impl KadId {
    /// Number of bits in a KadId
    pub const BITS: usize = 128;

    /// Number of bytes in a KadId
    pub const LEN: usize = 16;

    /// Generate a random KadId
    ///
    /// Used once per process for the local peer identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use kadseek_proto::KadId;
    ///
    /// let id = KadId::random();
    /// assert_eq!(id.as_bytes().len(), 16);
    /// ```
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes[..]);
        Self(bytes)
    }

    /// Calculate XOR distance to another KadId
    ///
    /// The XOR metric has the following properties:
    /// - d(x, x) = 0 (identity)
    /// - d(x, y) = d(y, x) (symmetry)
    /// - d(x, y) + d(y, z) >= d(x, z) (triangle inequality)
    ///
    /// # Examples
    ///
    /// ```
    /// use kadseek_proto::KadId;
    ///
    /// let id1 = KadId::from_bytes([1u8; 16]);
    /// let id2 = KadId::from_bytes([2u8; 16]);
    /// assert_eq!(id1.distance(&id2).as_bytes()[0], 3); // 1 XOR 2 = 3
    /// ```
    #[must_use]
    pub fn distance(&self, other: &KadId) -> KadId {
        let mut result = [0u8; 16];
        for (i, byte) in result.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        KadId(result)
    }

    /// Extract the `index`-th 32-bit chunk, most significant first
    ///
    /// Chunk 0 of a distance is the "tolerance" value a search compares
    /// against its threshold. Returns `None` for an index past the last chunk.
    ///
    /// # Examples
    ///
    /// ```
    /// use kadseek_proto::KadId;
    ///
    /// let mut bytes = [0u8; 16];
    /// bytes[0] = 0x01;
    /// let id = KadId::from_bytes(bytes);
    /// assert_eq!(id.get_32bit_chunk(0), Some(0x0100_0000));
    /// assert_eq!(id.get_32bit_chunk(4), None);
    /// ```
    #[must_use]
    pub fn get_32bit_chunk(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let chunk = self.0.get(start..start.checked_add(4)?)?;
        Some(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    /// Count leading zero bits
    #[must_use]
    pub fn leading_zeros(&self) -> usize {
        let mut count = 0;
        for byte in &self.0 {
            if *byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros() as usize;
                break;
            }
        }
        count.min(Self::BITS)
    }

    /// Whether every bit is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Get the raw bytes of the KadId
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Create KadId from raw (big-endian) bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Decode a KadId from its wire form (four little-endian words)
    #[must_use]
    pub fn from_wire(bytes: [u8; 16]) -> Self {
        Self(swap_chunks(&bytes))
    }

    /// Encode this KadId into its wire form (four little-endian words)
    #[must_use]
    pub fn to_wire(&self) -> [u8; 16] {
        swap_chunks(&self.0)
    }

    /// Full 32-digit uppercase hex rendering
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Debug for KadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KadId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for KadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl PartialOrd for KadId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KadId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<[u8; 16]> for KadId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Error parsing a KadId from hex
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected 32 hex digits: {0}")]
pub struct ParseKadIdError(String);

impl FromStr for KadId {
    type Err = ParseKadIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| ParseKadIdError(e.to_string()))?;
        Ok(Self(bytes))
    }
}
