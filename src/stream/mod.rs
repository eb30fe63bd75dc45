//! Caller-supplied stream capabilities.
//!
//! Every byte the engine reads or writes passes through an object supplied by
//! the caller. [`InputStream`] is the read side: archive input during open and
//! extract, file data during update. [`OutputStream`] is the write side:
//! extracted files during extract, the archive itself during update.
//!
//! A capability object addresses *named* files. The session calls `open(name)`
//! before streaming a file and `close()` afterwards; metadata queries and
//! setters take the name explicitly. A stream that was opened by the caller
//! beforehand ignores the name, which is what the default `open` does.
//!
//! Methods that are meaningless for an implementation keep their default,
//! which answers a fixed [`io::ErrorKind::Unsupported`] error (or a neutral
//! value for metadata queries) instead of being left out.
//!
//! # Implementing a capability
//!
//! ```rust
//! use std::io;
//! use sevenlink::stream::InputStream;
//!
//! /// A single pre-opened buffer.
//! struct Bytes {
//!     data: Vec<u8>,
//!     pos: usize,
//! }
//!
//! impl InputStream for Bytes {
//!     fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
//!         let n = buf.len().min(self.data.len() - self.pos);
//!         buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
//!         self.pos += n;
//!         Ok(n)
//!     }
//! }
//! ```

use std::cell::RefCell;
use std::io::{self, SeekFrom};
use std::rc::Rc;

pub mod adapter;
pub mod fs;
pub mod memory;

pub use adapter::{InStreamAdapter, OutStreamAdapter};

/// Read-side capability.
pub trait InputStream {
    /// Reads from the currently open file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Opens `name` for reading. Pre-opened streams accept any name.
    fn open(&mut self, name: &str) -> io::Result<()> {
        let _ = name;
        Ok(())
    }

    /// Closes the currently open file.
    fn close(&mut self) {}

    /// Moves the read position of the currently open file.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let _ = pos;
        Err(unsupported("seek"))
    }

    /// Size of `name` in bytes.
    fn size(&self, name: &str) -> u64 {
        let _ = name;
        0
    }

    /// Whether `name` is a directory.
    fn is_dir(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// POSIX mode of `name`, 0 if unknown.
    fn mode(&self, name: &str) -> u32 {
        let _ = name;
        0
    }

    /// Windows attribute bits of `name`, 0 if unknown.
    fn attributes(&self, name: &str) -> u32 {
        let _ = name;
        0
    }

    /// Modification time of `name` in Unix seconds, 0 if unknown.
    fn mtime(&self, name: &str) -> u32 {
        let _ = name;
        0
    }

    /// Creates an independent, unopened stream over the same file set.
    ///
    /// Needed only for multivolume archives, where each volume is read
    /// through its own clone.
    fn try_clone(&self) -> Option<Box<dyn InputStream>> {
        None
    }
}

/// Write-side capability.
pub trait OutputStream {
    /// Writes to the currently open file.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Creates or truncates `name` for writing. Pre-opened streams accept any
    /// name.
    fn open(&mut self, name: &str) -> io::Result<()> {
        let _ = name;
        Ok(())
    }

    /// Finishes the currently open file.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Moves the write position of the currently open file.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let _ = pos;
        Err(unsupported("seek"))
    }

    /// Truncates or extends the currently open file.
    fn set_size(&mut self, size: u64) -> io::Result<()> {
        let _ = size;
        Err(unsupported("set_size"))
    }

    /// Creates directory `name`.
    fn mkdir(&mut self, name: &str) -> io::Result<()> {
        let _ = name;
        Err(unsupported("mkdir"))
    }

    /// Applies a POSIX mode to `name`.
    fn set_mode(&mut self, name: &str, mode: u32) -> io::Result<()> {
        let _ = (name, mode);
        Err(unsupported("set_mode"))
    }

    /// Applies Windows attribute bits to `name`.
    fn set_attributes(&mut self, name: &str, attributes: u32) -> io::Result<()> {
        let _ = (name, attributes);
        Err(unsupported("set_attributes"))
    }

    /// Applies a modification time (Unix seconds) to `name`.
    fn set_time(&mut self, name: &str, time: u32) -> io::Result<()> {
        let _ = (name, time);
        Err(unsupported("set_time"))
    }
}

/// Shared handle to a caller's input capability.
pub type SharedInput = Rc<RefCell<dyn InputStream>>;

/// Shared handle to a caller's output capability.
pub type SharedOutput = Rc<RefCell<dyn OutputStream>>;

/// Wraps an input capability for use by a session.
pub fn shared_input<S: InputStream + 'static>(stream: S) -> SharedInput {
    Rc::new(RefCell::new(stream))
}

/// Wraps an output capability for use by a session.
pub fn shared_output<S: OutputStream + 'static>(stream: S) -> SharedOutput {
    Rc::new(RefCell::new(stream))
}

/// The fixed "not supported" answer of default capability methods.
pub fn unsupported(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{operation} is not supported by this stream"),
    )
}

/// Computes a new position for in-memory seeking.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative or overflowing position",
        )
    })
}

/// Extension of a stream name: the text after the last dot of the last path
/// component, or `""`.
pub fn name_extension(name: &str) -> &str {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rfind('.') {
        Some(dot) => &file[dot + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl OutputStream for Minimal {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
    }

    impl InputStream for Minimal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_defaults_report_unsupported() {
        let mut out = Minimal;
        assert_eq!(out.mkdir("d").unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert_eq!(
            out.set_time("f", 1).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
        assert_eq!(
            OutputStream::seek(&mut out, SeekFrom::Start(0)).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
        assert!(OutputStream::open(&mut out, "").is_ok());
    }

    #[test]
    fn test_input_defaults_are_neutral() {
        let input = Minimal;
        assert_eq!(input.size("x"), 0);
        assert!(!input.is_dir("x"));
        assert_eq!(input.mtime("x"), 0);
        assert!(input.try_clone().is_none());
    }

    #[test]
    fn test_resolve_seek() {
        assert_eq!(resolve_seek(SeekFrom::Start(5), 0, 10).unwrap(), 5);
        assert_eq!(resolve_seek(SeekFrom::End(-2), 0, 10).unwrap(), 8);
        assert_eq!(resolve_seek(SeekFrom::Current(3), 4, 10).unwrap(), 7);
        assert_eq!(resolve_seek(SeekFrom::End(5), 0, 10).unwrap(), 15);
        assert!(resolve_seek(SeekFrom::Current(-5), 4, 10).is_err());
    }

    #[test]
    fn test_name_extension() {
        assert_eq!(name_extension("archive.tar.gz"), "gz");
        assert_eq!(name_extension("dir.d/file"), "");
        assert_eq!(name_extension("dir\\file.7z"), "7z");
        assert_eq!(name_extension("noext"), "");
        assert_eq!(name_extension(""), "");
        assert_eq!(name_extension("trailing."), "");
    }
}
