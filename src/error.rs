//! Error types for engine sessions.
//!
//! Two layers of errors meet at the engine boundary:
//!
//! - [`ResultCode`] is the small, closed taxonomy the engine and the callback
//!   objects exchange. Engine-facing traits return
//!   [`EngineResult<T>`](crate::engine::EngineResult), whose error side is a
//!   `ResultCode`.
//! - [`Error`] is what the public session API returns. It keeps the
//!   originating `ResultCode` reachable through [`Error::result_code`] and adds
//!   context such as the entry that failed.
//!
//! # Example
//!
//! ```rust
//! use sevenlink::{Error, ResultCode};
//!
//! fn describe(error: &Error) -> &'static str {
//!     match error.result_code() {
//!         ResultCode::NeedPassword => "a password is required",
//!         ResultCode::NotSupported => "the engine cannot handle this archive",
//!         ResultCode::FalseCondition => "nothing to do",
//!         _ => "operation failed",
//!     }
//! }
//!
//! assert_eq!(describe(&Error::AlreadyOpen), "nothing to do");
//! ```

use std::fmt;
use std::io;

use crate::engine::OperationResult;
use crate::property::{PropId, PropType};

/// Result code exchanged with the engine.
///
/// Values map one-to-one onto the 32-bit status words of the engine ABI, see
/// [`ResultCode::from_raw`] and [`ResultCode::as_raw`]. Codes the taxonomy
/// does not name are carried unchanged in [`ResultCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// The call succeeded.
    Ok,
    /// Benign negative answer, e.g. "no more volumes" or "not this format".
    FalseCondition,
    /// The callee does not implement the operation.
    NotImplemented,
    /// The requested interface is not available on the object.
    NoInterface,
    /// The operation was aborted.
    Aborted,
    /// Generic failure.
    Fail,
    /// The format, method or operation is not supported.
    NotSupported,
    /// A password is needed and none was supplied.
    NeedPassword,
    /// An argument was out of range.
    InvalidArgument,
    /// Any other engine status word, passed through unchanged.
    Other(i32),
}

impl ResultCode {
    /// `S_OK`.
    pub const RAW_OK: i32 = 0;
    /// `S_FALSE`.
    pub const RAW_FALSE: i32 = 1;
    /// `E_NOTIMPL`.
    pub const RAW_NOT_IMPLEMENTED: i32 = 0x8000_4001_u32 as i32;
    /// `E_NOINTERFACE`.
    pub const RAW_NO_INTERFACE: i32 = 0x8000_4002_u32 as i32;
    /// `E_ABORT`.
    pub const RAW_ABORTED: i32 = 0x8000_4004_u32 as i32;
    /// `E_FAIL`.
    pub const RAW_FAIL: i32 = 0x8000_4005_u32 as i32;
    /// `HRESULT_FROM_WIN32(ERROR_NOT_SUPPORTED)`.
    pub const RAW_NOT_SUPPORTED: i32 = 0x8007_0032_u32 as i32;
    /// Password required.
    pub const RAW_NEED_PASSWORD: i32 = 0x8004_0001_u32 as i32;
    /// `E_INVALIDARG`.
    pub const RAW_INVALID_ARGUMENT: i32 = 0x8007_0057_u32 as i32;

    /// Decodes a raw engine status word.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            Self::RAW_OK => Self::Ok,
            Self::RAW_FALSE => Self::FalseCondition,
            Self::RAW_NOT_IMPLEMENTED => Self::NotImplemented,
            Self::RAW_NO_INTERFACE => Self::NoInterface,
            Self::RAW_ABORTED => Self::Aborted,
            Self::RAW_FAIL => Self::Fail,
            Self::RAW_NOT_SUPPORTED => Self::NotSupported,
            Self::RAW_NEED_PASSWORD => Self::NeedPassword,
            Self::RAW_INVALID_ARGUMENT => Self::InvalidArgument,
            other => Self::Other(other),
        }
    }

    /// Encodes this code as a raw engine status word.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Ok => Self::RAW_OK,
            Self::FalseCondition => Self::RAW_FALSE,
            Self::NotImplemented => Self::RAW_NOT_IMPLEMENTED,
            Self::NoInterface => Self::RAW_NO_INTERFACE,
            Self::Aborted => Self::RAW_ABORTED,
            Self::Fail => Self::RAW_FAIL,
            Self::NotSupported => Self::RAW_NOT_SUPPORTED,
            Self::NeedPassword => Self::RAW_NEED_PASSWORD,
            Self::InvalidArgument => Self::RAW_INVALID_ARGUMENT,
            Self::Other(raw) => raw,
        }
    }

    /// Returns `true` for codes the engine treats as success (`Ok` and
    /// `FalseCondition`, i.e. a non-negative status word).
    pub fn succeeded(self) -> bool {
        self.as_raw() >= 0
    }

    /// Returns `true` only for [`ResultCode::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Short human readable description.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::FalseCondition => "false condition",
            Self::NotImplemented => "not implemented",
            Self::NoInterface => "no such interface",
            Self::Aborted => "aborted",
            Self::Fail => "failure",
            Self::NotSupported => "not supported",
            Self::NeedPassword => "need password",
            Self::InvalidArgument => "invalid argument",
            Self::Other(_) => "engine error",
        }
    }

    /// Translates a caller I/O error into the code handed back to the engine.
    ///
    /// `NotFound` maps to `Fail` here; only volume acquisition treats it as
    /// the end of the sequence.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Unsupported => Self::NotSupported,
            io::ErrorKind::InvalidInput => Self::InvalidArgument,
            io::ErrorKind::Interrupted => Self::Aborted,
            _ => Self::Fail,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "{} ({:#010x})", self.message(), *raw as u32),
            _ => f.write_str(self.message()),
        }
    }
}

/// Helper struct for formatting per-entry error messages.
struct EntryDisplay<'a> {
    what: &'static str,
    entry_index: Option<u32>,
    entry_name: Option<&'a str>,
}

impl fmt::Display for EntryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.what)?;
        match (self.entry_index, self.entry_name) {
            (Some(idx), Some(name)) => write!(f, " for entry {} ({})", idx, name),
            (Some(idx), None) => write!(f, " for entry {}", idx),
            (None, Some(name)) => write!(f, " for entry '{}'", name),
            (None, None) => Ok(()),
        }
    }
}

/// The main error type for engine sessions.
///
/// | Category | Variants | Result code |
/// |----------|----------|-------------|
/// | I/O | [`Io`][Self::Io] | derived from the [`io::ErrorKind`] |
/// | Detection | [`UnsupportedFormat`][Self::UnsupportedFormat] | `NotSupported` |
/// | Engine | [`Engine`][Self::Engine] | passed through |
/// | Credentials | [`PasswordRequired`][Self::PasswordRequired], [`WrongPassword`][Self::WrongPassword] | `NeedPassword` |
/// | Extraction | [`UnsupportedMethod`][Self::UnsupportedMethod], [`ExtractionFailed`][Self::ExtractionFailed] | `NotSupported` / `Fail` |
/// | Session state | [`AlreadyOpen`][Self::AlreadyOpen], [`NotOpen`][Self::NotOpen], [`IndexOutOfRange`][Self::IndexOutOfRange] | `FalseCondition` / `Fail` / `InvalidArgument` |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied stream failed.
    ///
    /// Opening the input by name, closing an extracted file or any other
    /// capability call made directly by a session surfaces here.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No registered format recognises the stream.
    ///
    /// Signature matching (with and without the extension hint) and the
    /// extension lookup all came back empty.
    #[error("Unsupported archive format: '{name}'")]
    UnsupportedFormat {
        /// The stream name used for the extension hint.
        name: String,
    },

    /// The engine returned a failure code.
    #[error("{operation} failed: {code}")]
    Engine {
        /// Engine operation that failed.
        operation: &'static str,
        /// Code returned by the engine, unchanged.
        code: ResultCode,
    },

    /// The archive needs a password and none was supplied.
    #[error("Password required")]
    PasswordRequired,

    /// The engine reported a wrong password while extracting an entry.
    #[error("{}", EntryDisplay { what: "Wrong password", entry_index: *entry_index, entry_name: entry_name.as_deref() })]
    WrongPassword {
        /// Entry being extracted, if known.
        entry_index: Option<u32>,
        /// Path of that entry, if known.
        entry_name: Option<String>,
    },

    /// The engine cannot decode the method used by an entry.
    #[error("{}", EntryDisplay { what: "Unsupported method", entry_index: *entry_index, entry_name: entry_name.as_deref() })]
    UnsupportedMethod {
        /// Entry being extracted, if known.
        entry_index: Option<u32>,
        /// Path of that entry, if known.
        entry_name: Option<String>,
    },

    /// The engine reported a non-success result for an entry.
    #[error("Extraction failed ({result}) for entry {entry_index:?}")]
    ExtractionFailed {
        /// Entry being extracted, if known.
        entry_index: Option<u32>,
        /// Path of that entry, if known.
        entry_name: Option<String>,
        /// Result reported by the engine.
        result: OperationResult,
    },

    /// `open` was called on a session that already holds an archive.
    #[error("Archive is already open")]
    AlreadyOpen,

    /// A query was made on a session that holds no archive.
    #[error("Archive is not open")]
    NotOpen,

    /// An item index is outside `0..count`.
    #[error("Item index {index} out of range (archive has {count} items)")]
    IndexOutOfRange {
        /// Requested index.
        index: u32,
        /// Number of items in the active archive.
        count: u32,
    },

    /// The sub-archive chain exceeded the configured depth.
    #[error("Sub-archive chain deeper than {limit} levels")]
    ChainTooDeep {
        /// The configured maximum chain length.
        limit: usize,
    },

    /// A property held a different type than the accessor expects.
    #[error("Property {id} has type {found}, expected {expected}")]
    PropertyType {
        /// Property identifier.
        id: PropId,
        /// Type the accessor expects.
        expected: PropType,
        /// Type actually returned by the engine.
        found: PropType,
    },
}

impl Error {
    /// Wraps an engine failure code with the operation that produced it.
    pub fn engine(operation: &'static str, code: ResultCode) -> Self {
        Self::Engine { operation, code }
    }

    /// The taxonomy code equivalent to this error.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Io(e) => ResultCode::from_io(e),
            Self::UnsupportedFormat { .. } => ResultCode::NotSupported,
            Self::Engine { code, .. } => *code,
            Self::PasswordRequired | Self::WrongPassword { .. } => ResultCode::NeedPassword,
            Self::UnsupportedMethod { .. } => ResultCode::NotSupported,
            Self::ExtractionFailed { .. } => ResultCode::Fail,
            Self::AlreadyOpen => ResultCode::FalseCondition,
            Self::NotOpen => ResultCode::Fail,
            Self::IndexOutOfRange { .. } => ResultCode::InvalidArgument,
            Self::ChainTooDeep { .. } => ResultCode::Fail,
            Self::PropertyType { .. } => ResultCode::Fail,
        }
    }

    /// Returns `true` if this is a benign negative result rather than a
    /// failure (misuse of the session state machine, or an engine
    /// `FalseCondition`).
    pub fn is_benign(&self) -> bool {
        self.result_code() == ResultCode::FalseCondition
    }

    /// Returns `true` if supplying (another) password may help.
    pub fn is_password_error(&self) -> bool {
        self.result_code() == ResultCode::NeedPassword
    }

    /// Returns `true` if the engine cannot handle the archive or entry.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.result_code(),
            ResultCode::NotSupported | ResultCode::NotImplemented | ResultCode::NoInterface
        )
    }

    /// Entry index associated with this error, if any.
    pub fn entry_index(&self) -> Option<u32> {
        match self {
            Self::WrongPassword { entry_index, .. }
            | Self::UnsupportedMethod { entry_index, .. }
            | Self::ExtractionFailed { entry_index, .. } => *entry_index,
            Self::IndexOutOfRange { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Entry path associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::WrongPassword { entry_name, .. }
            | Self::UnsupportedMethod { entry_name, .. }
            | Self::ExtractionFailed { entry_name, .. } => entry_name.as_deref(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for engine sessions.
pub type Result<T> = std::result::Result<T, Error>;
