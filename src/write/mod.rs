//! Creating archives.
//!
//! A [`Writer`] opens an output sink by name, picks an output format, queues
//! item paths and hands them to the engine in one [`update`](Writer::update)
//! call. Item data and metadata come from the caller's input capability and
//! are read on demand while the engine packs.
//!
//! # Example
//!
//! ```rust,ignore
//! use sevenlink::write::{Writer, WriteOptions};
//! use sevenlink::stream::{fs::{FsInput, FsOutput}, shared_input, shared_output};
//!
//! let mut writer = Writer::new(&library);
//! writer.open(shared_output(FsOutput::new(".")), "backup.7z", WriteOptions::new())?;
//! writer.set_u32_property("x", 9)?;
//! writer.add_item("notes.txt");
//! writer.add_item("photos");
//! let result = writer.update(shared_input(FsInput::new("home")))?;
//! println!("wrote {} entries", result.entries_written);
//! writer.close()?;
//! ```

mod options;
mod update_callback;

pub use options::{WriteOptions, WriteResult};

use std::fmt;
use std::rc::Rc;

use crate::Password;
use crate::engine::{ArchiveUpdateCallback, OutArchive, OutStream};
use crate::error::{Error, Result, ResultCode};
use crate::library::Library;
use crate::progress::ProgressReporter;
use crate::property::PropValue;
use crate::stream::{InStreamAdapter, OutStreamAdapter, SharedInput, SharedOutput, name_extension};

use update_callback::UpdateCallback;

/// Format used when neither the options nor the output name pick one.
pub const DEFAULT_FORMAT_NAME: &str = "7z";

struct Session {
    archive: Rc<dyn OutArchive>,
    output: Rc<OutStreamAdapter>,
    format: usize,
}

/// An output archive session.
pub struct Writer {
    library: Library,
    session: Option<Session>,
    items: Vec<String>,
    password: Option<Password>,
    progress: Option<Box<dyn ProgressReporter>>,
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("format", &self.format_index())
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl Writer {
    /// Creates a closed writer.
    pub fn new(library: &Library) -> Self {
        Self {
            library: library.clone(),
            session: None,
            items: Vec::new(),
            password: None,
            progress: None,
        }
    }

    /// Opens the output archive `name` on `output`.
    ///
    /// The format is the forced one, else the first format claiming the
    /// name's extension, else 7z. A forced index with no descriptor is
    /// refused.
    pub fn open(&mut self, output: SharedOutput, name: &str, options: WriteOptions) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let registry = self.library.registry();
        let format = match options.format {
            Some(index) => registry.descriptor(index).map(|d| d.index),
            None => registry
                .by_extension(name_extension(name))
                .or_else(|| registry.by_name(DEFAULT_FORMAT_NAME)),
        }
        .ok_or_else(|| Error::UnsupportedFormat {
            name: name.to_string(),
        })?;
        let id = registry.guid(format).ok_or_else(|| Error::UnsupportedFormat {
            name: name.to_string(),
        })?;

        let archive = self
            .library
            .engine()
            .create_out_archive(&id)
            .map_err(|code| Error::engine("create output archive object", code))?;
        let output = Rc::new(OutStreamAdapter::new(output));
        output.open(name)?;

        log::debug!("writing '{}' as format {}", name, format);
        self.session = Some(Session {
            archive,
            output,
            format,
        });
        self.items.clear();
        self.password = options.password;
        self.progress = options.progress;
        Ok(())
    }

    /// Finishes the output sink and closes the session.
    pub fn close(&mut self) -> Result<()> {
        self.items.clear();
        self.password = None;
        self.progress = None;
        match self.session.take() {
            Some(session) => {
                session.output.close()?;
                log::debug!("output archive closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether an output archive is open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Format index of the output archive.
    pub fn format_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.format)
    }

    /// Queues an item path; the data is read from the input at update time.
    pub fn add_item(&mut self, path: impl Into<String>) {
        self.items.push(path.into());
    }

    /// Item paths queued for the next update.
    pub fn pending_items(&self) -> &[String] {
        &self.items
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotOpen)
    }

    /// Sets a named output option (e.g. `"x"` for the compression level).
    pub fn set_property(&self, name: &str, value: impl Into<PropValue>) -> Result<()> {
        let value = value.into();
        log::debug!("output option {} = {:?}", name, value);
        self.session()?
            .archive
            .set_property(name, &value)
            .map_err(|code| Error::engine("set output property", code))
    }

    /// Sets a string output option.
    pub fn set_string_property(&self, name: &str, value: &str) -> Result<()> {
        self.set_property(name, value)
    }

    /// Sets a boolean output option.
    pub fn set_bool_property(&self, name: &str, value: bool) -> Result<()> {
        self.set_property(name, value)
    }

    /// Sets a 32-bit output option.
    pub fn set_u32_property(&self, name: &str, value: u32) -> Result<()> {
        self.set_property(name, value)
    }

    /// Sets a 64-bit output option.
    pub fn set_u64_property(&self, name: &str, value: u64) -> Result<()> {
        self.set_property(name, value)
    }

    /// Sets an output option that takes no value.
    pub fn set_empty_property(&self, name: &str) -> Result<()> {
        self.set_property(name, PropValue::Empty)
    }

    /// Packs every queued item, reading data and metadata from `input`.
    ///
    /// On success the queue is cleared.
    pub fn update(&mut self, input: SharedInput) -> Result<WriteResult> {
        if self.session.is_none() {
            return Err(Error::NotOpen);
        }
        let count = u32::try_from(self.items.len())
            .map_err(|_| Error::engine("update", ResultCode::InvalidArgument))?;
        let progress = self.progress.take();
        let session = self.session()?;
        let callback = Rc::new(UpdateCallback::new(
            Rc::new(InStreamAdapter::borrowed(input)),
            self.items.clone(),
            self.password.clone(),
            progress,
        ));

        log::debug!("updating {} items", count);
        let stream = Rc::clone(&session.output) as Rc<dyn OutStream>;
        let engine_callback = Rc::clone(&callback) as Rc<dyn ArchiveUpdateCallback>;
        let outcome = session.archive.update_items(stream, count, engine_callback);

        let (result, progress) = callback.finish();
        self.progress = progress;
        outcome.map_err(|code| Error::engine("update", code))?;
        self.items.clear();
        Ok(result)
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("closing output archive failed: {}", e);
        }
    }
}
