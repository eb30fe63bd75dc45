//! The archive engine boundary.
//!
//! The engine is an external collaborator: it owns codecs and container
//! parsing and talks to this crate only through the traits in this module.
//! A native binding implements [`Engine`], [`InArchive`] and [`OutArchive`]
//! over the loaded library. This crate implements the stream and callback
//! traits ([`InStream`], [`OutStream`], [`ArchiveOpenCallback`],
//! [`ArchiveExtractCallback`], [`ArchiveUpdateCallback`]) and hands them to
//! the engine.
//!
//! All methods take `&self` and objects are shared through [`Rc`], so the
//! engine may keep a reference to a callback or stream for as long as it
//! likes. Calls are strictly serial on the thread that started the operation.
//!
//! Every fallible method returns [`EngineResult`]; the error side is the
//! [`ResultCode`] taxonomy. `Err(ResultCode::Ok)` is never produced.

use std::fmt;
use std::io::SeekFrom;
use std::rc::Rc;

use crate::error::ResultCode;
use crate::format::FormatId;
use crate::password::Password;
use crate::property::{PropId, PropValue, PropertyInfo};

/// Result of a call across the engine boundary.
pub type EngineResult<T> = std::result::Result<T, ResultCode>;

/// Seekable byte source handed to the engine.
pub trait InStream {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    fn read(&self, buf: &mut [u8]) -> EngineResult<usize>;

    /// Moves the read position, returning the new absolute position.
    fn seek(&self, pos: SeekFrom) -> EngineResult<u64>;
}

/// Seekable byte sink handed to the engine.
pub trait OutStream {
    /// Writes up to `buf.len()` bytes, returning how many were written.
    fn write(&self, buf: &[u8]) -> EngineResult<usize>;

    /// Moves the write position, returning the new absolute position.
    fn seek(&self, pos: SeekFrom) -> EngineResult<u64>;

    /// Truncates or extends the sink.
    fn set_size(&self, size: u64) -> EngineResult<()>;
}

/// Reads a stream until `buf` is full or the stream ends.
pub(crate) fn read_fully(stream: &dyn InStream, buf: &mut [u8]) -> EngineResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Per-format handler properties enumerated by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerProperty {
    /// Format name (string).
    Name,
    /// 16-byte class id (bytes).
    ClassId,
    /// Space-separated extension tokens (string).
    Extension,
    /// Extensions added to extracted names (string).
    AddExtension,
    /// Whether the format can be written (bool).
    Update,
    /// Whether original names are kept (bool).
    KeepName,
    /// Primary signature (bytes).
    Signature,
    /// Alternate signature records, `(len, bytes)` repeated (bytes).
    MultiSignature,
    /// Offset of the signature from the start of the stream (uint32).
    SignatureOffset,
    /// Alternate streams support (bool).
    AltStreams,
    /// NT security support (bool).
    NtSecure,
    /// Handler flags (uint32).
    Flags,
    /// Supported time precisions (uint32).
    TimeFlags,
}

impl HandlerProperty {
    /// Raw property index used by the engine ABI.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Name => 0,
            Self::ClassId => 1,
            Self::Extension => 2,
            Self::AddExtension => 3,
            Self::Update => 4,
            Self::KeepName => 5,
            Self::Signature => 6,
            Self::MultiSignature => 7,
            Self::SignatureOffset => 8,
            Self::AltStreams => 9,
            Self::NtSecure => 10,
            Self::Flags => 11,
            Self::TimeFlags => 12,
        }
    }
}

/// The loaded engine.
///
/// Obtaining a value of this trait is the explicit "load" step; a
/// [`Library`](crate::Library) wraps it for the rest of the crate.
pub trait Engine {
    /// Engine version, `major << 16 | minor`.
    fn version(&self) -> u32 {
        0
    }

    /// Number of formats the engine knows.
    fn format_count(&self) -> EngineResult<u32>;

    /// Reads a handler property of format `index`.
    fn handler_property(&self, index: u32, property: HandlerProperty) -> EngineResult<PropValue>;

    /// Creates a reader object for the format with the given class id.
    fn create_in_archive(&self, format: &FormatId) -> EngineResult<Rc<dyn InArchive>>;

    /// Creates a writer object for the format with the given class id.
    fn create_out_archive(&self, format: &FormatId) -> EngineResult<Rc<dyn OutArchive>>;
}

/// An engine reader object for one container.
pub trait InArchive {
    /// Parses the container from `stream`.
    ///
    /// `max_check_start` bounds how far the engine may scan for the start of
    /// the container. `Err(ResultCode::FalseCondition)` means "not this
    /// format".
    fn open(
        &self,
        stream: Rc<dyn InStream>,
        max_check_start: u64,
        callback: Rc<dyn ArchiveOpenCallback>,
    ) -> EngineResult<()>;

    /// Releases the container.
    fn close(&self) -> EngineResult<()>;

    /// Number of items.
    fn item_count(&self) -> EngineResult<u32>;

    /// Item-level property.
    fn property(&self, index: u32, id: PropId) -> EngineResult<PropValue>;

    /// Extracts (or tests) the listed items, or every item for `None`.
    fn extract(
        &self,
        indices: Option<&[u32]>,
        test: bool,
        callback: Rc<dyn ArchiveExtractCallback>,
    ) -> EngineResult<()>;

    /// Archive-level property.
    fn archive_property(&self, id: PropId) -> EngineResult<PropValue>;

    /// Number of item-level properties the archive declares.
    fn property_count(&self) -> EngineResult<u32> {
        Ok(0)
    }

    /// Description of item-level property `index`.
    fn property_info(&self, index: u32) -> EngineResult<PropertyInfo> {
        let _ = index;
        Err(ResultCode::InvalidArgument)
    }

    /// Number of archive-level properties the archive declares.
    fn archive_property_count(&self) -> EngineResult<u32> {
        Ok(0)
    }

    /// Description of archive-level property `index`.
    fn archive_property_info(&self, index: u32) -> EngineResult<PropertyInfo> {
        let _ = index;
        Err(ResultCode::InvalidArgument)
    }

    /// Stream over the bytes of item `index`, used to open embedded archives.
    ///
    /// Formats without sub-stream access answer `NoInterface`.
    fn sub_stream(&self, index: u32) -> EngineResult<Rc<dyn InStream>> {
        let _ = index;
        Err(ResultCode::NoInterface)
    }
}

/// An engine writer object for one container.
pub trait OutArchive {
    /// Writes `count` items described by `callback` to `stream`.
    fn update_items(
        &self,
        stream: Rc<dyn OutStream>,
        count: u32,
        callback: Rc<dyn ArchiveUpdateCallback>,
    ) -> EngineResult<()>;

    /// Sets a named output option.
    ///
    /// Formats without option support answer `NoInterface`.
    fn set_property(&self, name: &str, value: &PropValue) -> EngineResult<()> {
        let _ = (name, value);
        Err(ResultCode::NoInterface)
    }
}

/// Answer to a volume request.
#[derive(Clone)]
pub enum Volume {
    /// The next volume, positioned at its start.
    Stream(Rc<dyn InStream>),
    /// There is no such volume; the sequence ends here.
    NoMoreVolumes,
}

impl Volume {
    /// Status code the engine ABI reports for this answer.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Stream(_) => ResultCode::Ok,
            Self::NoMoreVolumes => ResultCode::FalseCondition,
        }
    }

    /// Returns the stream, if any.
    pub fn stream(&self) -> Option<&Rc<dyn InStream>> {
        match self {
            Self::Stream(s) => Some(s),
            Self::NoMoreVolumes => None,
        }
    }
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Volume::Stream(..)"),
            Self::NoMoreVolumes => f.write_str("Volume::NoMoreVolumes"),
        }
    }
}

/// Callback used by [`InArchive::open`].
pub trait ArchiveOpenCallback {
    /// Announces totals (file count, byte count), either may be unknown.
    fn set_total(&self, files: Option<u64>, bytes: Option<u64>) -> EngineResult<()>;

    /// Reports progress (file count, byte count).
    fn set_completed(&self, files: Option<u64>, bytes: Option<u64>) -> EngineResult<()>;

    /// Property of the stream currently being opened.
    fn property(&self, id: PropId) -> EngineResult<PropValue>;

    /// Requests another volume by name.
    fn volume_stream(&self, name: &str) -> EngineResult<Volume>;

    /// Switches the callback to sub-archive mode under `name`.
    fn set_sub_archive_name(&self, name: &str) -> EngineResult<()>;

    /// Password for encrypted headers; `NeedPassword` if none is known.
    fn password(&self) -> EngineResult<Password>;
}

/// What the engine wants done with an item during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskMode {
    /// Write the item to the output.
    Extract,
    /// Decode and verify without writing.
    Test,
    /// Skip the item.
    Skip,
    /// Read external data.
    ReadExternal,
}

impl AskMode {
    /// Decodes a raw ask mode; unknown values are treated as `Skip`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Extract,
            1 => Self::Test,
            3 => Self::ReadExternal,
            _ => Self::Skip,
        }
    }
}

/// Per-item result reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Item processed successfully.
    Ok,
    /// Compression method not supported.
    UnsupportedMethod,
    /// Corrupted data.
    DataError,
    /// Checksum mismatch.
    CrcError,
    /// Data is unavailable.
    Unavailable,
    /// Unexpected end of data.
    UnexpectedEnd,
    /// Data after the end of the payload.
    DataAfterEnd,
    /// Stream is not an archive.
    IsNotArc,
    /// Corrupted headers.
    HeadersError,
    /// Wrong password.
    WrongPassword,
    /// Unrecognised result value.
    Other(i32),
}

impl OperationResult {
    /// Decodes a raw operation result.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Ok,
            1 => Self::UnsupportedMethod,
            2 => Self::DataError,
            3 => Self::CrcError,
            4 => Self::Unavailable,
            5 => Self::UnexpectedEnd,
            6 => Self::DataAfterEnd,
            7 => Self::IsNotArc,
            8 => Self::HeadersError,
            9 => Self::WrongPassword,
            other => Self::Other(other),
        }
    }

    /// Raw operation result.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::UnsupportedMethod => 1,
            Self::DataError => 2,
            Self::CrcError => 3,
            Self::Unavailable => 4,
            Self::UnexpectedEnd => 5,
            Self::DataAfterEnd => 6,
            Self::IsNotArc => 7,
            Self::HeadersError => 8,
            Self::WrongPassword => 9,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::UnsupportedMethod => f.write_str("unsupported method"),
            Self::DataError => f.write_str("data error"),
            Self::CrcError => f.write_str("CRC error"),
            Self::Unavailable => f.write_str("data unavailable"),
            Self::UnexpectedEnd => f.write_str("unexpected end of data"),
            Self::DataAfterEnd => f.write_str("data after end"),
            Self::IsNotArc => f.write_str("not an archive"),
            Self::HeadersError => f.write_str("headers error"),
            Self::WrongPassword => f.write_str("wrong password"),
            Self::Other(raw) => write!(f, "result {}", raw),
        }
    }
}

/// Callback used by [`InArchive::extract`].
pub trait ArchiveExtractCallback {
    /// Announces the total number of bytes to unpack.
    fn set_total(&self, total: u64) -> EngineResult<()>;

    /// Reports unpacked bytes so far.
    fn set_completed(&self, completed: Option<u64>) -> EngineResult<()>;

    /// Asks where item `index` should go. `Ok(None)` means "discard".
    fn get_stream(&self, index: u32, mode: AskMode) -> EngineResult<Option<Rc<dyn OutStream>>>;

    /// Called right before the item's data is produced.
    fn prepare_operation(&self, mode: AskMode) -> EngineResult<()>;

    /// Reports the outcome for the item announced by the last `get_stream`.
    fn set_operation_result(&self, result: OperationResult) -> EngineResult<()>;

    /// Password for encrypted items; `NeedPassword` if none is known.
    fn password(&self) -> EngineResult<Password>;
}

/// How an item participates in an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateItemInfo {
    /// The engine must fetch new data for the item.
    pub new_data: bool,
    /// The engine must fetch new properties for the item.
    pub new_properties: bool,
    /// Index of the item in an existing archive, `None` for new items.
    pub index_in_archive: Option<u32>,
}

/// Callback used by [`OutArchive::update_items`].
pub trait ArchiveUpdateCallback {
    /// Announces the total number of bytes to pack.
    fn set_total(&self, total: u64) -> EngineResult<()>;

    /// Reports packed bytes so far.
    fn set_completed(&self, completed: Option<u64>) -> EngineResult<()>;

    /// Describes how item `index` participates.
    fn update_item_info(&self, index: u32) -> EngineResult<UpdateItemInfo>;

    /// Property of item `index`.
    fn property(&self, index: u32, id: PropId) -> EngineResult<PropValue>;

    /// Data stream for item `index`.
    fn stream(&self, index: u32) -> EngineResult<Rc<dyn InStream>>;

    /// Reports the outcome for the item whose stream was handed out last.
    fn set_operation_result(&self, result: OperationResult) -> EngineResult<()>;

    /// Size of output volume `index`; `FalseCondition` means "do not split".
    fn volume_size(&self, index: u32) -> EngineResult<u64>;

    /// Sink for output volume `index`; `FalseCondition` means "do not split".
    fn volume_stream(&self, index: u32) -> EngineResult<Rc<dyn OutStream>>;

    /// Password for encryption, `None` when the archive is not encrypted.
    fn password(&self) -> EngineResult<Option<Password>>;
}
