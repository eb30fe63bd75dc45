//! Bridges caller capabilities to engine streams.
//!
//! [`InStreamAdapter`] and [`OutStreamAdapter`] implement the engine's
//! [`InStream`]/[`OutStream`] traits over a caller's [`InputStream`] /
//! [`OutputStream`]. They are pure pass-through: every call forwards 1:1 and
//! its result comes back unchanged (I/O errors are only re-expressed as
//! [`ResultCode`]s on the engine-facing side). No buffering, no retries.
//!
//! An input adapter either *borrows* the caller's shared stream, leaving it
//! alive for the caller after the adapter is gone, or *owns* a clone produced
//! by [`InputStream::try_clone`] (multivolume), which is destroyed together
//! with the adapter.

use std::cell::RefCell;
use std::io::{self, SeekFrom};

use super::{InputStream, OutputStream, SharedInput, SharedOutput};
use crate::engine::{EngineResult, InStream, OutStream};
use crate::error::ResultCode;

fn busy() -> io::Error {
    io::Error::new(
        io::ErrorKind::WouldBlock,
        "stream is already in use by another call",
    )
}

enum InputSource {
    Borrowed(SharedInput),
    Cloned(RefCell<Box<dyn InputStream>>),
}

/// Engine-facing view of a caller's [`InputStream`].
pub struct InStreamAdapter {
    source: InputSource,
}

impl InStreamAdapter {
    /// Wraps the caller's stream without taking it over.
    pub fn borrowed(input: SharedInput) -> Self {
        Self {
            source: InputSource::Borrowed(input),
        }
    }

    /// Wraps a clone; the adapter destroys it when dropped.
    pub fn cloned(input: Box<dyn InputStream>) -> Self {
        Self {
            source: InputSource::Cloned(RefCell::new(input)),
        }
    }

    /// Whether this adapter owns its stream.
    pub fn is_cloned(&self) -> bool {
        matches!(self.source, InputSource::Cloned(_))
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut dyn InputStream) -> io::Result<R>) -> io::Result<R> {
        match &self.source {
            InputSource::Borrowed(shared) => {
                let mut stream = shared.try_borrow_mut().map_err(|_| busy())?;
                f(&mut *stream)
            }
            InputSource::Cloned(owned) => {
                let mut stream = owned.try_borrow_mut().map_err(|_| busy())?;
                f(&mut **stream)
            }
        }
    }

    fn query<R: Default>(&self, f: impl FnOnce(&dyn InputStream) -> R) -> R {
        match &self.source {
            InputSource::Borrowed(shared) => match shared.try_borrow() {
                Ok(stream) => f(&*stream),
                Err(_) => R::default(),
            },
            InputSource::Cloned(owned) => match owned.try_borrow() {
                Ok(stream) => f(&**stream),
                Err(_) => R::default(),
            },
        }
    }

    /// Opens `name` on the wrapped stream.
    pub fn open(&self, name: &str) -> io::Result<()> {
        log::trace!("input open '{}'", name);
        self.with_mut(|s| s.open(name))
    }

    /// Closes the wrapped stream's current file.
    pub fn close(&self) {
        log::trace!("input close");
        // A busy stream cannot be closed now; the borrow holder owns the file.
        let _ = self.with_mut(|s| {
            s.close();
            Ok(())
        });
    }

    /// Size of `name`.
    pub fn size(&self, name: &str) -> u64 {
        self.query(|s| s.size(name))
    }

    /// Whether `name` is a directory.
    pub fn is_dir(&self, name: &str) -> bool {
        self.query(|s| s.is_dir(name))
    }

    /// POSIX mode of `name`.
    pub fn mode(&self, name: &str) -> u32 {
        self.query(|s| s.mode(name))
    }

    /// Attribute bits of `name`.
    pub fn attributes(&self, name: &str) -> u32 {
        self.query(|s| s.attributes(name))
    }

    /// Modification time of `name` in Unix seconds.
    pub fn mtime(&self, name: &str) -> u32 {
        self.query(|s| s.mtime(name))
    }

    /// Asks the wrapped stream for an independent clone.
    pub fn try_clone(&self) -> Option<Box<dyn InputStream>> {
        self.query(|s| s.try_clone())
    }
}

impl InStream for InStreamAdapter {
    fn read(&self, buf: &mut [u8]) -> EngineResult<usize> {
        let result = self.with_mut(|s| s.read(buf));
        log::trace!("input read {} -> {:?}", buf.len(), result.as_ref().ok());
        result.map_err(|e| ResultCode::from_io(&e))
    }

    fn seek(&self, pos: SeekFrom) -> EngineResult<u64> {
        let result = self.with_mut(|s| s.seek(pos));
        log::trace!("input seek {:?} -> {:?}", pos, result.as_ref().ok());
        result.map_err(|e| ResultCode::from_io(&e))
    }
}

impl Drop for InStreamAdapter {
    fn drop(&mut self) {
        if self.is_cloned() {
            log::trace!("releasing cloned input stream");
        }
    }
}

/// Engine-facing view of a caller's [`OutputStream`].
///
/// The extraction-only operations (`mkdir`, `set_mode`, `set_attributes`,
/// `set_time`) are inherent methods called by the extract callback; the
/// engine itself only sees [`OutStream`].
pub struct OutStreamAdapter {
    output: SharedOutput,
}

impl OutStreamAdapter {
    /// Wraps the caller's stream without taking it over.
    pub fn new(output: SharedOutput) -> Self {
        Self { output }
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut dyn OutputStream) -> io::Result<R>) -> io::Result<R> {
        let mut stream = self.output.try_borrow_mut().map_err(|_| busy())?;
        f(&mut *stream)
    }

    /// Opens `name` for writing.
    pub fn open(&self, name: &str) -> io::Result<()> {
        log::trace!("output open '{}'", name);
        self.with_mut(|s| s.open(name))
    }

    /// Finishes the current file.
    pub fn close(&self) -> io::Result<()> {
        log::trace!("output close");
        self.with_mut(|s| s.close())
    }

    /// Creates a directory.
    pub fn mkdir(&self, name: &str) -> io::Result<()> {
        log::trace!("output mkdir '{}'", name);
        self.with_mut(|s| s.mkdir(name))
    }

    /// Applies a POSIX mode.
    pub fn set_mode(&self, name: &str, mode: u32) -> io::Result<()> {
        log::trace!("output set_mode '{}' {:o}", name, mode);
        self.with_mut(|s| s.set_mode(name, mode))
    }

    /// Applies attribute bits.
    pub fn set_attributes(&self, name: &str, attributes: u32) -> io::Result<()> {
        log::trace!("output set_attributes '{}' {:#x}", name, attributes);
        self.with_mut(|s| s.set_attributes(name, attributes))
    }

    /// Applies a modification time.
    pub fn set_time(&self, name: &str, time: u32) -> io::Result<()> {
        log::trace!("output set_time '{}' {}", name, time);
        self.with_mut(|s| s.set_time(name, time))
    }
}

impl OutStream for OutStreamAdapter {
    fn write(&self, buf: &[u8]) -> EngineResult<usize> {
        let result = self.with_mut(|s| s.write(buf));
        log::trace!("output write {} -> {:?}", buf.len(), result.as_ref().ok());
        result.map_err(|e| ResultCode::from_io(&e))
    }

    fn seek(&self, pos: SeekFrom) -> EngineResult<u64> {
        let result = self.with_mut(|s| s.seek(pos));
        log::trace!("output seek {:?} -> {:?}", pos, result.as_ref().ok());
        result.map_err(|e| ResultCode::from_io(&e))
    }

    fn set_size(&self, size: u64) -> EngineResult<()> {
        log::trace!("output set_size {}", size);
        self.with_mut(|s| s.set_size(size))
            .map_err(|e| ResultCode::from_io(&e))
    }
}
