//! ed2k file links
//!
//! A [`FileLink`] is the user-facing view of a discovered file: its
//! classification, the published name, size, availability and the canonical
//! link string
//!
//! ```text
//! ed2k://|file|<url-encoded name>|<size>|<32 upper-case hex digits>|/
//! ```
//!
//! The hash inside the link is in ed2k byte order, which is the overlay
//! order with each 4-byte word reversed.

use kadseek_proto::FileRecord;
use kadseek_proto::hash::swap_chunks;
use serde::Serialize;

/// Device names Windows refuses as file names
const RESERVED_FILE_NAMES: [&str; 23] = [
    "NUL", "CON", "PRN", "AUX", "CLOCK$", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
    "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Coarse file classification derived from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum FileKind {
    /// Anything not covered below
    Other,
    /// Video container
    Video,
    /// Audio track
    Audio,
    /// Still image
    Image,
    /// Compressed archive
    Archive,
    /// Disc image
    CdImage,
    /// Text or office document
    Document,
    /// Executable or installer
    Program,
}

impl FileKind {
    /// Classify by file extension (case-insensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Self::Other,
        };
        match ext.as_str() {
            "avi" | "mkv" | "mp4" | "m4v" | "mpg" | "mpeg" | "mov" | "wmv" | "rm" | "rmvb"
            | "flv" | "ogm" | "vob" | "ts" | "webm" | "divx" | "3gp" => Self::Video,
            "mp3" | "flac" | "ogg" | "wav" | "wma" | "aac" | "ape" | "m4a" | "mpc" | "opus" => {
                Self::Audio
            }
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" => Self::Image,
            "zip" | "rar" | "7z" | "gz" | "tgz" | "bz2" | "xz" | "tar" | "ace" => Self::Archive,
            "iso" | "bin" | "cue" | "nrg" | "img" | "mdf" | "mds" | "ccd" => Self::CdImage,
            "txt" | "pdf" | "doc" | "docx" | "rtf" | "epub" | "mobi" | "chm" | "djvu" | "xls"
            | "xlsx" | "ppt" | "pptx" | "odt" => Self::Document,
            "exe" | "msi" | "com" | "bat" | "apk" | "dmg" | "deb" | "rpm" => Self::Program,
            _ => Self::Other,
        }
    }

    /// Short label for display
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Archive => "archive",
            Self::CdImage => "cd-image",
            Self::Document => "document",
            Self::Program => "program",
        }
    }
}

impl From<FileKind> for u8 {
    fn from(kind: FileKind) -> Self {
        kind as u8
    }
}

/// Classification of a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Kind derived from the extension
    pub kind: FileKind,
    /// Lower-cased name used for matching
    pub org_name: String,
}

/// Classify a published file name
///
/// Returns `None` for blank names; such records are not shown.
#[must_use]
pub fn classify(name: &str) -> Option<FileInfo> {
    if name.trim().is_empty() {
        return None;
    }
    let org_name = name.to_lowercase();
    Some(FileInfo {
        kind: FileKind::from_name(&org_name),
        org_name,
    })
}

/// A classified file ready for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLink {
    /// Classification
    pub info: FileInfo,
    /// Published name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Number of known sources
    pub avail: u32,
    /// Content hash in overlay byte order
    pub hash: [u8; 16],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileLinkJson<'a> {
    #[serde(rename = "Type")]
    kind: FileKind,
    org_name: &'a str,
    name: &'a str,
    size: u64,
    avail: u32,
    link: String,
}

impl FileLink {
    /// Project a file record, dropping it when the name cannot be classified
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Option<Self> {
        let info = classify(&record.name)?;
        Some(Self {
            info,
            name: record.name.clone(),
            size: record.size,
            avail: record.avail,
            hash: record.hash,
        })
    }

    /// Canonical `ed2k://` link
    #[must_use]
    pub fn ed2k_link(&self) -> String {
        ed2k_link(&self.name, self.size, &self.hash)
    }

    /// JSON object with `Type`, `OrgName`, `Name`, `Size`, `Avail` and `Link`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&FileLinkJson {
            kind: self.info.kind,
            org_name: &self.info.org_name,
            name: &self.name,
            size: self.size,
            avail: self.avail,
            link: self.ed2k_link(),
        })
    }
}

/// Build an ed2k link from a name, a size and an overlay-order hash
#[must_use]
pub fn ed2k_link(name: &str, size: u64, hash: &[u8; 16]) -> String {
    format!(
        "ed2k://|file|{}|{}|{}|/",
        encode_url_utf8(&strip_invalid_file_name_chars(name)),
        size,
        hex::encode_upper(swap_chunks(hash))
    )
}

/// Remove characters that are not allowed in file names
///
/// Control characters and `"*<>?|\:` are dropped. A name that is a reserved
/// device name gets a trailing `_`; a reserved name followed by `.` has the
/// `.` replaced by `_`.
#[must_use]
pub fn strip_invalid_file_name_chars(text: &str) -> String {
    let mut dst: String = text
        .chars()
        .filter(|&c| !matches!(c, '\0'..='\x1f' | '"' | '*' | '<' | '>' | '?' | '|' | '\\' | ':'))
        .collect();

    for prefix in RESERVED_FILE_NAMES {
        if !dst.starts_with(prefix) {
            continue;
        }
        if dst.len() == prefix.len() {
            dst.push('_');
        } else if dst.as_bytes()[prefix.len()] == b'.' {
            dst.replace_range(prefix.len()..=prefix.len(), "_");
        }
    }
    dst
}

/// Percent-encode `%`, space and every byte at or above `0x7F`
#[must_use]
pub fn encode_url_utf8(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        if b == b'%' || b == b' ' || b >= 0x7F {
            out.push_str(&format!("%{b:02X}"));
        } else {
            out.push(char::from(b));
        }
    }
    out
}
