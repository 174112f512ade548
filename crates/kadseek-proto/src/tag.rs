//! KAD tag lists.
//!
//! Search results describe files with a tag list: a count byte followed by
//! `(type, name, value)` triples. Names are length-prefixed byte strings;
//! well-known tags use a single-byte name such as [`TAG_FILENAME`].

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{ProtoError, Result};

/// 16-byte hash value
pub const TAGTYPE_HASH: u8 = 0x01;
/// UTF-8 string with u16 length prefix
pub const TAGTYPE_STRING: u8 = 0x02;
/// u32 value
pub const TAGTYPE_UINT32: u8 = 0x03;
/// f32 value
pub const TAGTYPE_FLOAT32: u8 = 0x04;
/// Single byte boolean
pub const TAGTYPE_BOOL: u8 = 0x05;
/// Bit array with u16 bit count
pub const TAGTYPE_BOOLARRAY: u8 = 0x06;
/// Byte blob with u32 length prefix
pub const TAGTYPE_BLOB: u8 = 0x07;
/// u16 value
pub const TAGTYPE_UINT16: u8 = 0x08;
/// u8 value
pub const TAGTYPE_UINT8: u8 = 0x09;
/// Byte blob with u8 length prefix
pub const TAGTYPE_BSOB: u8 = 0x0A;
/// u64 value
pub const TAGTYPE_UINT64: u8 = 0x0B;
/// Fixed-length string, 1 byte
pub const TAGTYPE_STR1: u8 = 0x11;
/// Fixed-length string, 16 bytes
pub const TAGTYPE_STR16: u8 = 0x20;

/// File name
pub const TAG_FILENAME: u8 = 0x01;
/// File size (integer or 8-byte bsob)
pub const TAG_FILESIZE: u8 = 0x02;
/// ed2k file type string ("Video", "Audio", ...)
pub const TAG_FILETYPE: u8 = 0x03;
/// Number of known sources
pub const TAG_SOURCES: u8 = 0x15;
/// Media length in seconds
pub const TAG_MEDIA_LENGTH: u8 = 0xD3;

/// Decoded tag value
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// 16-byte hash
    Hash([u8; 16]),
    /// String (variable or fixed length on the wire)
    Str(String),
    /// u8 integer
    U8(u8),
    /// u16 integer
    U16(u16),
    /// u32 integer
    U32(u32),
    /// u64 integer
    U64(u64),
    /// f32 value
    F32(f32),
    /// Boolean
    Bool(bool),
    /// Bit array
    BoolArray {
        /// Number of meaningful bits
        bits: u16,
        /// Packed bits
        bytes: Vec<u8>,
    },
    /// Blob with 32-bit length
    Blob(Vec<u8>),
    /// Blob with 8-bit length
    Bsob(Vec<u8>),
}

impl TagValue {
    /// Integer value widened to u64, if this is an integer tag
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(u64::from(*v)),
            Self::U16(v) => Some(u64::from(*v)),
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if this is a string tag
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Hash(_) => 16,
            Self::Str(s) => 2 + s.len(),
            Self::U8(_) | Self::Bool(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) | Self::F32(_) => 4,
            Self::U64(_) => 8,
            Self::BoolArray { bytes, .. } => 2 + bytes.len(),
            Self::Blob(b) => 4 + b.len(),
            Self::Bsob(b) => 1 + b.len(),
        }
    }

    const fn tag_type(&self) -> u8 {
        match self {
            Self::Hash(_) => TAGTYPE_HASH,
            Self::Str(_) => TAGTYPE_STRING,
            Self::U8(_) => TAGTYPE_UINT8,
            Self::U16(_) => TAGTYPE_UINT16,
            Self::U32(_) => TAGTYPE_UINT32,
            Self::U64(_) => TAGTYPE_UINT64,
            Self::F32(_) => TAGTYPE_FLOAT32,
            Self::Bool(_) => TAGTYPE_BOOL,
            Self::BoolArray { .. } => TAGTYPE_BOOLARRAY,
            Self::Blob(_) => TAGTYPE_BLOB,
            Self::Bsob(_) => TAGTYPE_BSOB,
        }
    }
}

/// A single named tag
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Raw tag name; well-known tags use one byte
    pub name: Vec<u8>,
    /// Tag value
    pub value: TagValue,
}

impl Tag {
    /// Tag with a single-byte well-known name
    #[must_use]
    pub fn with_id(id: u8, value: TagValue) -> Self {
        Self {
            name: vec![id],
            value,
        }
    }

    /// Single-byte name, if the tag uses one
    #[must_use]
    pub fn id(&self) -> Option<u8> {
        match self.name.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    /// Bytes this tag occupies on the wire
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + 2 + self.name.len() + self.value.encoded_len()
    }

    /// Decode one tag
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        let tag_type = r.read_u8()?;
        let name_len = usize::from(r.read_u16()?);
        let name = r.read_bytes(name_len)?.to_vec();

        let value = match tag_type {
            TAGTYPE_HASH => TagValue::Hash(r.read_array()?),
            TAGTYPE_STRING => {
                let len = usize::from(r.read_u16()?);
                TagValue::Str(String::from_utf8_lossy(r.read_bytes(len)?).into_owned())
            }
            TAGTYPE_UINT32 => TagValue::U32(r.read_u32()?),
            TAGTYPE_FLOAT32 => TagValue::F32(r.read_f32()?),
            TAGTYPE_BOOL => TagValue::Bool(r.read_u8()? != 0),
            TAGTYPE_BOOLARRAY => {
                let bits = r.read_u16()?;
                let bytes = r.read_bytes(usize::from(bits / 8) + 1)?.to_vec();
                TagValue::BoolArray { bits, bytes }
            }
            TAGTYPE_BLOB => {
                let len = r.read_u32()? as usize;
                TagValue::Blob(r.read_bytes(len)?.to_vec())
            }
            TAGTYPE_UINT16 => TagValue::U16(r.read_u16()?),
            TAGTYPE_UINT8 => TagValue::U8(r.read_u8()?),
            TAGTYPE_BSOB => {
                let len = usize::from(r.read_u8()?);
                TagValue::Bsob(r.read_bytes(len)?.to_vec())
            }
            TAGTYPE_UINT64 => TagValue::U64(r.read_u64()?),
            TAGTYPE_STR1..=TAGTYPE_STR16 => {
                let len = usize::from(tag_type - TAGTYPE_STR1 + 1);
                TagValue::Str(String::from_utf8_lossy(r.read_bytes(len)?).into_owned())
            }
            other => return Err(ProtoError::UnknownTagType(other)),
        };

        Ok(Self { name, value })
    }

    /// Encode one tag
    pub fn encode(&self, w: &mut ByteWriter<'_>) -> Result<()> {
        w.write_u8(self.value.tag_type())?;
        w.write_u16(prefix(self.name.len())?)?;
        w.write_bytes(&self.name)?;

        match &self.value {
            TagValue::Hash(h) => w.write_bytes(h),
            TagValue::Str(s) => {
                w.write_u16(prefix(s.len())?)?;
                w.write_bytes(s.as_bytes())
            }
            TagValue::U8(v) => w.write_u8(*v),
            TagValue::U16(v) => w.write_u16(*v),
            TagValue::U32(v) => w.write_u32(*v),
            TagValue::U64(v) => w.write_u64(*v),
            TagValue::F32(v) => w.write_f32(*v),
            TagValue::Bool(v) => w.write_u8(u8::from(*v)),
            TagValue::BoolArray { bits, bytes } => {
                w.write_u16(*bits)?;
                w.write_bytes(bytes)
            }
            TagValue::Blob(b) => {
                w.write_u32(prefix(b.len())?)?;
                w.write_bytes(b)
            }
            TagValue::Bsob(b) => {
                w.write_u8(prefix(b.len())?)?;
                w.write_bytes(b)
            }
        }
    }
}

/// Length prefix for a field of `len` bytes
fn prefix<T: TryFrom<usize>>(len: usize) -> Result<T> {
    T::try_from(len).map_err(|_| ProtoError::FieldTooLong {
        len,
        max: usize::MAX >> (usize::BITS - 8 * std::mem::size_of::<T>() as u32),
    })
}

/// Decode a count-prefixed tag list
pub fn decode_tag_list(r: &mut ByteReader<'_>) -> Result<Vec<Tag>> {
    let count = r.read_u8()?;
    (0..count).map(|_| Tag::decode(r)).collect()
}

/// Encode a count-prefixed tag list (at most 255 tags are written)
pub fn encode_tag_list(tags: &[Tag], w: &mut ByteWriter<'_>) -> Result<()> {
    let tags = &tags[..tags.len().min(usize::from(u8::MAX))];
    w.write_u8(tags.len() as u8)?;
    for tag in tags {
        tag.encode(w)?;
    }
    Ok(())
}

/// Bytes a tag list occupies on the wire
#[must_use]
pub fn tag_list_len(tags: &[Tag]) -> usize {
    1 + tags
        .iter()
        .take(usize::from(u8::MAX))
        .map(Tag::encoded_len)
        .sum::<usize>()
}
