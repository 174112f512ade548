//! Hash transforms used by the KAD overlay.
//!
//! - MD4 derives a search target from a keyword.
//! - MD5 derives the UDP verify key sent to a destination address.
//! - [`swap_chunks`] converts a 16-byte hash between the overlay's internal
//!   representation and the byte order used in ed2k links.

use crate::kad_id::KadId;
use md4::Md4;
use md5::{Digest, Md5};

/// MD4 digest of `data`
#[must_use]
pub fn md4_digest(data: &[u8]) -> [u8; 16] {
    Md4::digest(data).into()
}

/// MD5 digest of `data`
#[must_use]
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// Reverse the byte order inside each of the four 4-byte chunks
///
/// Applying it twice returns the original bytes.
///
/// # Examples
///
/// ```
/// use kadseek_proto::hash::swap_chunks;
///
/// let h = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
/// assert_eq!(swap_chunks(&h)[..4], [4, 3, 2, 1]);
/// assert_eq!(swap_chunks(&swap_chunks(&h)), h);
/// ```
#[must_use]
pub fn swap_chunks(src: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (dst, chunk) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        for j in 0..4 {
            dst[j] = chunk[3 - j];
        }
    }
    out
}

/// Search target for a keyword
///
/// The MD4 digest is read as four little-endian words, which is what
/// `swap_chunks` turns into the big-endian identifier form.
#[must_use]
pub fn keyword_target(keyword: &str) -> KadId {
    KadId::from_bytes(swap_chunks(&md4_digest(keyword.as_bytes())))
}

/// UDP verify key for packets sent to `dest_ip`
///
/// The local secret occupies the high 32 bits of a 64-bit buffer and the
/// destination address the low 32 bits. The MD5 digest of that buffer is
/// folded into one word and mapped into `1..=0xFFFF_FFFE`, so the key is never
/// zero and never the all-ones sentinel.
#[must_use]
pub fn udp_verify_key(secret: u32, dest_ip: u32) -> u32 {
    let buffer = (u64::from(secret) << 32) | u64::from(dest_ip);
    let digest = md5_digest(&buffer.to_le_bytes());

    let key = digest
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0u32, |acc, w| acc ^ w);
    key % 0xFFFF_FFFE + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
        0x10,
    ];

    #[test]
    fn test_swap_chunks_vector() {
        let expected = [
            0x04, 0x03, 0x02, 0x01, 0x08, 0x07, 0x06, 0x05, 0x0C, 0x0B, 0x0A, 0x09, 0x10, 0x0F,
            0x0E, 0x0D,
        ];
        assert_eq!(swap_chunks(&H), expected);
    }

    #[test]
    fn test_swap_chunks_self_inverse() {
        assert_eq!(swap_chunks(&swap_chunks(&H)), H);
    }

    #[test]
    fn test_md4_known_vectors() {
        assert_eq!(hex::encode(md4_digest(b"")), "31d6cfe0d16ae931b73c59d7e0c089c0");
        assert_eq!(
            hex::encode(md4_digest(b"abc")),
            "a448017aaf21d8525fc10ae87aa6729d"
        );
    }

    #[test]
    fn test_md5_known_vector() {
        assert_eq!(hex::encode(md5_digest(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_keyword_target() {
        let target = keyword_target("abc");
        // a448017a -> 7a0148a4 once read as a little-endian word
        assert_eq!(target.get_32bit_chunk(0), Some(0x7a01_48a4));
        assert_eq!(keyword_target("abc"), target);
        assert_ne!(keyword_target("abd"), target);
    }

    #[test]
    fn test_udp_verify_key_known_value() {
        assert_eq!(udp_verify_key(0x1234_5678, 0x0A00_0001), 0x3c26_cea9);
    }

    #[test]
    fn test_udp_verify_key_deterministic_and_in_range() {
        for (secret, ip) in [(0, 0), (u32::MAX, u32::MAX), (42, 0x7F00_0001)] {
            let k1 = udp_verify_key(secret, ip);
            let k2 = udp_verify_key(secret, ip);
            assert_eq!(k1, k2);
            assert!((1..=0xFFFF_FFFE).contains(&k1));
        }
    }
}
