//! Opening archives and extracting their items.
//!
//! An [`Archive`] is an open session over a caller-supplied input. Opening
//! runs format detection, asks the engine to parse the container and follows
//! embedded archives: when a container names a *main subfile* (envelope
//! formats), the item is opened as a stream and detected again, and so on
//! until a container without one is reached. The resulting handles form a
//! chain; item queries and extraction always address the innermost one, and
//! [`Archive::close`] releases the chain innermost-first.
//!
//! # Example
//!
//! ```rust,ignore
//! use sevenlink::read::{Archive, ExtractOptions, OpenOptions};
//! use sevenlink::stream::{fs::{FsInput, FsOutput}, shared_input, shared_output};
//!
//! let mut archive = Archive::new(&library);
//! archive.open(shared_input(FsInput::new(".")), "backup.tar.gz", &OpenOptions::default())?;
//! for item in archive.items()? {
//!     println!("{}: {} bytes", item.path, item.size);
//! }
//! archive.extract(shared_output(FsOutput::new("out")), ExtractOptions::new())?;
//! ```

mod extract_callback;
mod item;
mod open_callback;
mod options;

pub use item::{CONTENT_ALIAS, Item};
pub use options::{DEFAULT_MAX_CHAIN_DEPTH, ExtractOptions, FormatSelection, OpenOptions};

use std::fmt;
use std::rc::Rc;

use crate::Password;
use crate::engine::{ArchiveExtractCallback, ArchiveOpenCallback, InArchive, InStream};
use crate::error::{Error, Result, ResultCode};
use crate::format::SignatureMatcher;
use crate::library::Library;
use crate::property::{PropId, PropValue, PropertyInfo};
use crate::stream::{InStreamAdapter, OutStreamAdapter, SharedInput, SharedOutput, name_extension};

use extract_callback::ExtractCallback;
use item::ItemProps;
use open_callback::OpenCallback;

/// How far the engine may scan for the start of a container, in bytes.
pub const DEFAULT_MAX_CHECK_START: u64 = 1 << 23;

/// One opened container of the chain.
struct Link {
    archive: Rc<dyn InArchive>,
    format: usize,
}

/// An open session over an archive.
///
/// States: closed (after [`new`](Self::new) or [`close`](Self::close)) and
/// open (after a successful [`open`](Self::open)). Dropping an open session
/// closes it.
pub struct Archive {
    library: Library,
    chain: Vec<Link>,
    input: Option<Rc<InStreamAdapter>>,
    password: Option<Password>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("formats", &self.chain_formats())
            .finish_non_exhaustive()
    }
}

impl Archive {
    /// Creates a closed session.
    pub fn new(library: &Library) -> Self {
        Self {
            library: library.clone(),
            chain: Vec::new(),
            input: None,
            password: None,
        }
    }

    /// Opens the archive named `name` on `input`.
    ///
    /// `name` is passed to the input's `open` and its extension is the
    /// detection hint; it may be empty for a pre-opened input. On failure
    /// every container opened so far is released and the session stays
    /// closed.
    pub fn open(&mut self, input: SharedInput, name: &str, options: &OpenOptions) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let adapter = Rc::new(InStreamAdapter::borrowed(input));
        adapter.open(name)?;
        let callback = Rc::new(OpenCallback::new(
            Rc::clone(&adapter),
            name,
            options.password.clone(),
        ));

        let mut chain = Vec::new();
        let stream = Rc::clone(&adapter) as Rc<dyn InStream>;
        match self.open_chain(&mut chain, stream, name, options, &callback) {
            Ok(()) => {
                log::debug!(
                    "opened '{}' as {:?}",
                    name,
                    chain.iter().map(|l| l.format).collect::<Vec<_>>()
                );
                self.chain = chain;
                self.input = Some(adapter);
                self.password = options.password.clone();
                Ok(())
            }
            Err(err) => {
                release(&mut chain);
                adapter.close();
                if callback.missing_password() && !err.is_password_error() {
                    log::debug!("open failed after an unanswered password request: {}", err);
                    return Err(Error::PasswordRequired);
                }
                Err(err)
            }
        }
    }

    fn open_chain(
        &self,
        chain: &mut Vec<Link>,
        mut stream: Rc<dyn InStream>,
        name: &str,
        options: &OpenOptions,
        callback: &Rc<OpenCallback>,
    ) -> Result<()> {
        let mut selection = options.format;
        let mut stream_name = name.to_string();

        loop {
            if let Some(limit) = options.max_chain_depth {
                if chain.len() >= limit {
                    return Err(Error::ChainTooDeep { limit });
                }
            }

            let format = self
                .resolve_format(stream.as_ref(), &stream_name, selection)
                .ok_or_else(|| Error::UnsupportedFormat {
                    name: stream_name.clone(),
                })?;
            let archive = self.open_link(format, Rc::clone(&stream), &stream_name, options, callback)?;
            chain.push(Link {
                archive: Rc::clone(&archive),
                format,
            });

            let Some(subfile) = main_subfile(archive.as_ref())? else {
                return Ok(());
            };
            let sub_name = ItemProps::new(archive.as_ref(), subfile).path()?;
            log::debug!("'{}' embeds '{}' as item {}", stream_name, sub_name, subfile);
            stream = archive
                .sub_stream(subfile)
                .map_err(|code| Error::engine("open embedded stream", code))?;
            callback
                .set_sub_archive_name(&sub_name)
                .map_err(|code| Error::engine("enter embedded archive", code))?;

            selection = FormatSelection::Auto;
            stream_name = sub_name;
        }
    }

    fn resolve_format(&self, stream: &dyn InStream, name: &str, selection: FormatSelection) -> Option<usize> {
        let registry = self.library.registry();
        let matcher = SignatureMatcher::new(registry);
        match selection {
            FormatSelection::Forced(index) => registry.descriptor(index).map(|d| d.index),
            FormatSelection::SignatureOnly => matcher.detect(stream, None),
            FormatSelection::Auto => {
                let ext = name_extension(name);
                let hinted = if ext.is_empty() {
                    None
                } else {
                    matcher.detect(stream, Some(ext))
                };
                hinted
                    .or_else(|| matcher.detect(stream, None))
                    .or_else(|| registry.by_extension(ext))
            }
        }
    }

    fn open_link(
        &self,
        format: usize,
        stream: Rc<dyn InStream>,
        stream_name: &str,
        options: &OpenOptions,
        callback: &Rc<OpenCallback>,
    ) -> Result<Rc<dyn InArchive>> {
        let id = self
            .library
            .registry()
            .guid(format)
            .ok_or_else(|| Error::UnsupportedFormat {
                name: stream_name.to_string(),
            })?;
        let archive = self
            .library
            .engine()
            .create_in_archive(&id)
            .map_err(|code| Error::engine("create archive object", code))?;

        let callback = Rc::clone(callback) as Rc<dyn ArchiveOpenCallback>;
        match archive.open(stream, options.max_check_start, callback) {
            Ok(()) => Ok(archive),
            Err(ResultCode::FalseCondition) => Err(Error::UnsupportedFormat {
                name: stream_name.to_string(),
            }),
            Err(code) => Err(Error::engine("open", code)),
        }
    }

    /// Releases every container, innermost first, and the input.
    ///
    /// Closing a closed session does nothing.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        release(&mut self.chain);
        if let Some(input) = self.input.take() {
            input.close();
        }
        self.password = None;
        log::debug!("archive closed");
    }

    /// Whether the session holds an open archive.
    pub fn is_open(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Number of chained containers; 0 when closed.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Format indices of the chain, outermost first.
    pub fn chain_formats(&self) -> Vec<usize> {
        self.chain.iter().map(|l| l.format).collect()
    }

    /// Format index of the innermost container.
    pub fn format_index(&self) -> Option<usize> {
        self.chain.last().map(|l| l.format)
    }

    /// Format name of the innermost container.
    pub fn format_name(&self) -> Option<&str> {
        self.format_index()
            .and_then(|i| self.library.format_name(i))
    }

    fn active(&self) -> Result<&dyn InArchive> {
        self.chain
            .last()
            .map(|l| l.archive.as_ref())
            .ok_or(Error::NotOpen)
    }

    fn item_props(&self, index: u32) -> Result<ItemProps<'_>> {
        let count = self.item_count()?;
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        Ok(ItemProps::new(self.active()?, index))
    }

    /// Number of items in the innermost container.
    pub fn item_count(&self) -> Result<u32> {
        self.active()?
            .item_count()
            .map_err(|code| Error::engine("item count", code))
    }

    /// Path of item `index`, [`CONTENT_ALIAS`] if it has none.
    pub fn item_path(&self, index: u32) -> Result<String> {
        self.item_props(index)?.path()
    }

    /// Unpacked size of item `index`.
    pub fn item_size(&self, index: u32) -> Result<u64> {
        self.item_props(index)?.size(PropId::SIZE)
    }

    /// Packed size of item `index`.
    pub fn item_packed_size(&self, index: u32) -> Result<u64> {
        self.item_props(index)?.size(PropId::PACK_SIZE)
    }

    /// POSIX mode of item `index`, 0 if unknown.
    pub fn item_mode(&self, index: u32) -> Result<u32> {
        self.item_props(index)?.mode()
    }

    /// Attribute bits of item `index`.
    pub fn item_attributes(&self, index: u32) -> Result<u32> {
        self.item_props(index)?.attributes()
    }

    /// Modification time of item `index` in Unix seconds, 0 if unknown.
    pub fn item_time(&self, index: u32) -> Result<u32> {
        self.item_props(index)?.mtime()
    }

    /// Whether item `index` is a directory.
    pub fn item_is_dir(&self, index: u32) -> Result<bool> {
        self.item_props(index)?.is_dir()
    }

    /// CRC-32 of item `index`, if recorded.
    pub fn item_crc(&self, index: u32) -> Result<Option<u32>> {
        self.item_props(index)?.crc()
    }

    /// Metadata snapshot of item `index`.
    pub fn item(&self, index: u32) -> Result<Item> {
        self.item_props(index)?.item()
    }

    /// Metadata snapshots of every item.
    pub fn items(&self) -> Result<Vec<Item>> {
        let archive = self.active()?;
        (0..self.item_count()?)
            .map(|index| ItemProps::new(archive, index).item())
            .collect()
    }

    /// Raw item-level property.
    pub fn item_property(&self, index: u32, id: PropId) -> Result<PropValue> {
        self.item_props(index)?.get(id)
    }

    /// String item property.
    pub fn item_string(&self, index: u32, id: PropId) -> Result<Option<String>> {
        self.item_property(index, id)?.into_string(id)
    }

    /// Boolean item property.
    pub fn item_bool(&self, index: u32, id: PropId) -> Result<Option<bool>> {
        self.item_property(index, id)?.to_bool(id)
    }

    /// 32-bit item property.
    pub fn item_u32(&self, index: u32, id: PropId) -> Result<Option<u32>> {
        self.item_property(index, id)?.to_u32(id)
    }

    /// 64-bit item property.
    pub fn item_u64(&self, index: u32, id: PropId) -> Result<Option<u64>> {
        self.item_property(index, id)?.to_u64(id)
    }

    /// Time item property in Unix seconds.
    pub fn item_unix_time(&self, index: u32, id: PropId) -> Result<Option<u32>> {
        self.item_property(index, id)?.to_unix_time(id)
    }

    /// Raw archive-level property of the innermost container.
    pub fn archive_property(&self, id: PropId) -> Result<PropValue> {
        self.active()?
            .archive_property(id)
            .map_err(|code| Error::engine("archive property", code))
    }

    /// String archive property.
    pub fn archive_string(&self, id: PropId) -> Result<Option<String>> {
        self.archive_property(id)?.into_string(id)
    }

    /// Boolean archive property.
    pub fn archive_bool(&self, id: PropId) -> Result<Option<bool>> {
        self.archive_property(id)?.to_bool(id)
    }

    /// 32-bit archive property.
    pub fn archive_u32(&self, id: PropId) -> Result<Option<u32>> {
        self.archive_property(id)?.to_u32(id)
    }

    /// 64-bit archive property.
    pub fn archive_u64(&self, id: PropId) -> Result<Option<u64>> {
        self.archive_property(id)?.to_u64(id)
    }

    /// Time archive property in Unix seconds.
    pub fn archive_unix_time(&self, id: PropId) -> Result<Option<u32>> {
        self.archive_property(id)?.to_unix_time(id)
    }

    /// Number of item-level properties the container declares.
    pub fn property_count(&self) -> Result<u32> {
        self.active()?
            .property_count()
            .map_err(|code| Error::engine("property count", code))
    }

    /// Item-level property description `index`.
    pub fn property_info(&self, index: u32) -> Result<PropertyInfo> {
        self.active()?
            .property_info(index)
            .map_err(|code| Error::engine("property info", code))
    }

    /// Number of archive-level properties the container declares.
    pub fn archive_property_count(&self) -> Result<u32> {
        self.active()?
            .archive_property_count()
            .map_err(|code| Error::engine("archive property count", code))
    }

    /// Archive-level property description `index`.
    pub fn archive_property_info(&self, index: u32) -> Result<PropertyInfo> {
        self.active()?
            .archive_property_info(index)
            .map_err(|code| Error::engine("archive property info", code))
    }

    /// Extracts items of the innermost container to `output`.
    ///
    /// Files are written under their item paths, directories are created
    /// with `mkdir`. The password falls back to the one given at open.
    pub fn extract(&self, output: SharedOutput, options: ExtractOptions) -> Result<()> {
        let archive = Rc::clone(&self.chain.last().ok_or(Error::NotOpen)?.archive);
        let indices = match options.index {
            None => None,
            Some(index) => {
                let count = self.item_count()?;
                if index >= count {
                    return Err(Error::IndexOutOfRange { index, count });
                }
                Some(vec![index])
            }
        };

        let password = options.password.or_else(|| self.password.clone());
        let callback = Rc::new(ExtractCallback::new(
            Rc::clone(&archive),
            Rc::new(OutStreamAdapter::new(output)),
            password,
            options.progress,
        ));

        log::debug!("extracting {:?}", indices.as_deref());
        let engine_callback = Rc::clone(&callback) as Rc<dyn ArchiveExtractCallback>;
        let result = archive.extract(indices.as_deref(), false, engine_callback);
        let recorded = callback.take_error();
        match (result, recorded) {
            (Ok(()), None) => Ok(()),
            (_, Some(err)) => Err(err),
            (Err(code), None) => Err(Error::engine("extract", code)),
        }
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        self.close();
    }
}

/// The main-subfile index of an envelope container, if it names a valid item.
///
/// An empty property or a `FalseCondition` answer ends the chain; engine
/// failures and a mistyped value abort the open.
fn main_subfile(archive: &dyn InArchive) -> Result<Option<u32>> {
    let value = match archive.archive_property(PropId::MAIN_SUBFILE) {
        Ok(value) => value,
        Err(ResultCode::FalseCondition) => return Ok(None),
        Err(code) => return Err(Error::engine("main subfile", code)),
    };
    let Some(index) = value.to_u32(PropId::MAIN_SUBFILE)? else {
        return Ok(None);
    };
    let count = archive
        .item_count()
        .map_err(|code| Error::engine("item count", code))?;
    if index < count {
        Ok(Some(index))
    } else {
        log::debug!("ignoring main subfile {} outside the item range", index);
        Ok(None)
    }
}

/// Closes and drops the handles of a chain, innermost first.
fn release(chain: &mut Vec<Link>) {
    while let Some(link) = chain.pop() {
        if let Err(code) = link.archive.close() {
            log::warn!("closing container of format {} failed: {}", link.format, code);
        }
    }
}
