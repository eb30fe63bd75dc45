//! Archive formats known to the engine.
//!
//! - [`FormatId`] is the engine's 16-byte class identifier of a handler.
//! - [`FormatDescriptor`] is everything this crate needs to know about a
//!   format: names, extensions, signatures, writability.
//! - [`registry::FormatRegistry`] enumerates descriptors from the engine.
//! - [`detect::SignatureMatcher`] picks a format for a stream.

use std::fmt;

pub mod detect;
pub mod registry;

pub use detect::SignatureMatcher;
pub use registry::FormatRegistry;

/// Class identifier of a format handler.
///
/// Bytes are in GUID memory order: `Data1` (LE u32), `Data2` (LE u16),
/// `Data3` (LE u16), `Data4` (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatId(pub [u8; 16]);

impl FormatId {
    /// Class id of a stock handler, `{23170F69-40C1-278A-1000-000110xx0000}`,
    /// where `xx` is the handler's format byte.
    pub const fn stock(format_byte: u8) -> Self {
        Self([
            0x69, 0x0F, 0x17, 0x23, 0xC1, 0x40, 0x8A, 0x27, 0x10, 0x00, 0x00, 0x01, 0x10,
            format_byte, 0x00, 0x00,
        ])
    }

    /// Creates an id from raw bytes, if there are exactly 16 of them.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// The handler's format byte (`Data4[5]`).
    pub fn format_byte(&self) -> u8 {
        self.0[13]
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        let data1 = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let data2 = u16::from_le_bytes([b[4], b[5]]);
        let data3 = u16::from_le_bytes([b[6], b[7]]);
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            data1, data2, data3, b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

/// Format bytes of handlers whose signature sits in the last 512 bytes of the
/// stream (Apple disk images).
pub const TRAILER_FORMAT_BYTES: &[u8] = &[0xE4];

/// Description of one engine format.
///
/// Immutable once enumerated; owned by the [`FormatRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatDescriptor {
    /// Index of the format in the engine.
    pub index: usize,
    /// Format name, e.g. `"7z"`.
    pub name: String,
    /// Extension tokens, in engine order.
    pub extensions: Vec<String>,
    /// Offset of the signature from the start of the stream.
    pub signature_offset: u64,
    /// Primary signature.
    pub signature: Option<Vec<u8>>,
    /// Alternate signature block: `(length byte, bytes)` records.
    pub multi_signature: Option<Vec<u8>>,
    /// Whether archives of this format can be created.
    pub updatable: bool,
    /// Handler class id.
    pub format_id: FormatId,
}

impl FormatDescriptor {
    /// Whether `ext` is one of the format's extension tokens (exact match).
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    /// Whether the format has a primary signature or any alternates.
    pub fn has_signature(&self) -> bool {
        self.signature.as_ref().is_some_and(|s| !s.is_empty())
            || self.multi_signature.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Whether the signature is searched near the end of the stream.
    pub fn is_trailer_format(&self) -> bool {
        TRAILER_FORMAT_BYTES.contains(&self.format_id.format_byte())
    }

    /// Alternate signatures, in order.
    ///
    /// Zero-length records are skipped; iteration stops at the first record
    /// whose length byte exceeds the remaining bytes.
    pub fn alt_signatures(&self) -> AltSignatures<'_> {
        AltSignatures {
            rest: self.multi_signature.as_deref().unwrap_or(&[]),
        }
    }

    /// Longest signature the matcher may compare.
    pub fn max_signature_len(&self) -> usize {
        let primary = self.signature.as_ref().map_or(0, Vec::len);
        let alternate = self.alt_signatures().map(<[u8]>::len).max().unwrap_or(0);
        primary.max(alternate)
    }
}

/// Iterator over the records of an alternate-signature block.
#[derive(Debug, Clone)]
pub struct AltSignatures<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for AltSignatures<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (&len, tail) = self.rest.split_first()?;
            let len = usize::from(len);
            if len > tail.len() {
                log::debug!("malformed alternate signature record, {} > {}", len, tail.len());
                self.rest = &[];
                return None;
            }
            let (record, rest) = tail.split_at(len);
            self.rest = rest;
            if len > 0 {
                return Some(record);
            }
        }
    }
}
