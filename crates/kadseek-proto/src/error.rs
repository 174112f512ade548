//! Error types for the KAD wire layer.

use thiserror::Error;

/// Result alias used throughout the protocol crate
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Message shorter than its declared field layout
    #[error("truncated message: needed {needed} bytes, {available} available")]
    TruncatedMessage {
        /// Bytes the next field requires
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Write past the end of a fixed-capacity buffer
    #[error("buffer full: needed {needed} bytes, {remaining} remaining")]
    BufferFull {
        /// Bytes the write requires
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Field longer than its length prefix can express
    #[error("field too long: {len} bytes, at most {max}")]
    FieldTooLong {
        /// Actual length
        len: usize,
        /// Largest length the prefix holds
        max: usize,
    },

    /// Leading protocol byte is neither plain nor packed KAD
    #[error("unknown protocol byte: 0x{0:02X}")]
    UnknownProtocol(u8),

    /// Opcode outside the supported message set
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Tag type that cannot be skipped or decoded
    #[error("unknown tag type: 0x{0:02X}")]
    UnknownTagType(u8),

    /// Packed datagram failed to inflate
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Malformed nodes.dat contents
    #[error("invalid nodes file: {0}")]
    InvalidNodesFile(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtoError {
    /// Shorthand for a truncation at the current cursor
    #[must_use]
    pub const fn truncated(needed: usize, available: usize) -> Self {
        Self::TruncatedMessage { needed, available }
    }

    /// Whether the error came from malformed or short wire data
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::TruncatedMessage { .. }
                | Self::UnknownProtocol(_)
                | Self::UnknownOpcode(_)
                | Self::UnknownTagType(_)
                | Self::Decompress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProtoError::truncated(4, 1);
        assert_eq!(
            err.to_string(),
            "truncated message: needed 4 bytes, 1 available"
        );
        assert_eq!(
            ProtoError::UnknownOpcode(0x3b).to_string(),
            "unknown opcode: 0x3B"
        );
    }

    #[test]
    fn test_is_malformed() {
        assert!(ProtoError::truncated(1, 0).is_malformed());
        assert!(ProtoError::UnknownTagType(0x42).is_malformed());
        assert!(
            !ProtoError::BufferFull {
                needed: 2,
                remaining: 1
            }
            .is_malformed()
        );
    }
}
