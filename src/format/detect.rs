//! Signature-based format detection.
//!
//! [`SignatureMatcher::detect`] compares the registered signatures of every
//! candidate format against the stream:
//!
//! 1. The first [`SIGNATURE_WINDOW`] bytes are read once; the stream position
//!    is restored afterwards.
//! 2. With an extension hint, only formats listing that extension are
//!    candidates, and a candidate with no signature at all is accepted on the
//!    extension alone.
//! 3. Signatures that do not fit the window, and formats whose signature is a
//!    trailer, are compared against a secondary read: `max_len` bytes at the
//!    signature offset, or the last [`TRAILER_WINDOW`] bytes.
//! 4. The primary signature is compared first. Formats with only alternate
//!    signatures try each `(length, bytes)` record in order.
//!
//! Comparison is exact and limited to bytes actually present in the stream.

use std::io::SeekFrom;

use crate::engine::{InStream, read_fully};
use crate::format::{FormatDescriptor, FormatRegistry};

/// Number of leading bytes read for signature comparison.
pub const SIGNATURE_WINDOW: usize = 2048;

/// Number of trailing bytes read for trailer-signature formats.
pub const TRAILER_WINDOW: usize = 512;

/// Detects the format of a stream from registered signatures.
#[derive(Debug, Clone, Copy)]
pub struct SignatureMatcher<'a> {
    registry: &'a FormatRegistry,
}

impl<'a> SignatureMatcher<'a> {
    /// Creates a matcher over `registry`.
    pub fn new(registry: &'a FormatRegistry) -> Self {
        Self { registry }
    }

    /// Returns the index of the first matching format.
    ///
    /// `extension_hint` restricts candidates when non-empty. Any failure to
    /// snapshot, read or restore the primary window yields `None`. The stream
    /// position is unchanged on return whenever it could be restored.
    pub fn detect(&self, stream: &dyn InStream, extension_hint: Option<&str>) -> Option<usize> {
        let hint = extension_hint.filter(|h| !h.is_empty());

        let start = stream.seek(SeekFrom::Current(0)).ok()?;
        let end = stream.seek(SeekFrom::End(0)).ok()?;
        let primary = read_window(stream, SeekFrom::Start(0), SIGNATURE_WINDOW);
        stream.seek(SeekFrom::Start(start)).ok()?;
        let primary = primary?;

        for format in self.registry.iter() {
            if let Some(ext) = hint {
                if !format.supports_extension(ext) {
                    continue;
                }
            }

            if !format.has_signature() {
                if hint.is_some() {
                    log::debug!("format '{}' accepted by extension alone", format.name);
                    return Some(format.index);
                }
                continue;
            }

            let max_len = format.max_signature_len();
            let needs_secondary = format.is_trailer_format()
                || format.signature_offset.saturating_add(max_len as u64) > SIGNATURE_WINDOW as u64;

            let matched = if needs_secondary {
                let Some(secondary) = self.secondary(stream, format, start, end, max_len) else {
                    continue;
                };
                matches_at(format, &secondary, 0)
            } else {
                matches_at(format, &primary, format.signature_offset as usize)
            };

            if matched {
                log::debug!("format '{}' matched by signature", format.name);
                return Some(format.index);
            }
        }
        None
    }

    /// Reads the out-of-window bytes for `format`, or `None` to skip it.
    fn secondary(
        &self,
        stream: &dyn InStream,
        format: &FormatDescriptor,
        start: u64,
        end: u64,
        max_len: usize,
    ) -> Option<Vec<u8>> {
        let (pos, len) = if format.is_trailer_format() {
            if end < TRAILER_WINDOW as u64 {
                return None;
            }
            (SeekFrom::End(-(TRAILER_WINDOW as i64)), TRAILER_WINDOW)
        } else {
            if end < format.signature_offset.saturating_add(max_len as u64) {
                return None;
            }
            (SeekFrom::Start(format.signature_offset), max_len)
        };

        let buf = read_window(stream, pos, len);
        let restored = stream.seek(SeekFrom::Start(start)).is_ok();
        if buf.is_none() || !restored {
            log::debug!(
                "format '{}' skipped: stream cannot serve a secondary signature read",
                format.name
            );
            return None;
        }
        buf
    }
}

fn read_window(stream: &dyn InStream, pos: SeekFrom, len: usize) -> Option<Vec<u8>> {
    stream.seek(pos).ok()?;
    let mut buf = vec![0u8; len];
    let n = read_fully(stream, &mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}

fn matches_at(format: &FormatDescriptor, buf: &[u8], offset: usize) -> bool {
    let at = |sig: &[u8]| {
        offset
            .checked_add(sig.len())
            .and_then(|end| buf.get(offset..end))
            .is_some_and(|window| window == sig)
    };
    match format.signature.as_deref().filter(|s| !s.is_empty()) {
        Some(signature) => at(signature),
        None => format.alt_signatures().any(at),
    }
}
