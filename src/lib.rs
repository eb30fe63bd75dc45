//! # sevenlink
//!
//! Glue that makes a 7-Zip-style archive engine usable from arbitrary,
//! caller-supplied I/O.
//!
//! The engine itself (codecs, container parsing) is an external collaborator
//! reached through the traits in [`engine`]. This crate provides everything
//! around it:
//!
//! - **Capabilities**: the caller implements [`stream::InputStream`] and
//!   [`stream::OutputStream`] (or uses the ready-made memory and filesystem
//!   ones); every byte the engine touches passes through them.
//! - **Format detection**: by extension and by binary signature, including
//!   trailer signatures and alternate-signature records
//!   ([`format::SignatureMatcher`]).
//! - **Chained archives**: envelope containers that embed the real archive
//!   are followed automatically ([`Archive`]).
//! - **Multivolume sets**: volumes are requested on demand from clones of
//!   the input; a missing volume ends the set instead of failing.
//! - **Transfer callbacks**: extraction into named files and directories with
//!   metadata, and archive creation from queued paths ([`Writer`]).
//!
//! ## Quick Start
//!
//! ### Listing and Extracting
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use sevenlink::{Archive, ExtractOptions, Library, OpenOptions, Result};
//! use sevenlink::stream::{fs::{FsInput, FsOutput}, shared_input, shared_output};
//!
//! fn main() -> Result<()> {
//!     // `load_engine` is the binding's explicit load step.
//!     let library = Library::new(Rc::new(load_engine()?));
//!
//!     let mut archive = Archive::new(&library);
//!     archive.open(shared_input(FsInput::new(".")), "photos.tar.gz", &OpenOptions::default())?;
//!     for item in archive.items()? {
//!         println!("{}: {} bytes", item.path, item.size);
//!     }
//!     archive.extract(shared_output(FsOutput::new("./output")), ExtractOptions::new())?;
//!     Ok(())
//! }
//! ```
//!
//! ### Creating an Archive
//!
//! ```rust,ignore
//! use sevenlink::{Writer, WriteOptions, Result};
//! use sevenlink::stream::{fs::{FsInput, FsOutput}, shared_input, shared_output};
//!
//! fn create(library: &sevenlink::Library) -> Result<()> {
//!     let mut writer = Writer::new(library);
//!     writer.open(shared_output(FsOutput::new(".")), "notes.7z", WriteOptions::new())?;
//!     writer.add_item("notes.txt");
//!     writer.update(shared_input(FsInput::new("home")))?;
//!     writer.close()
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Every [`Error`] maps back to the
//! engine's [`ResultCode`] taxonomy through [`Error::result_code`]:
//!
//! ```rust
//! use sevenlink::{Error, ResultCode};
//!
//! let err = Error::AlreadyOpen;
//! assert_eq!(err.result_code(), ResultCode::FalseCondition);
//! assert!(err.is_benign());
//! ```
//!
//! ## Threading
//!
//! Sessions are single-threaded: the engine calls back strictly serially on
//! the thread that started an operation, and callback objects are shared
//! with the engine through [`Rc`](std::rc::Rc).
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod engine;
pub mod error;
pub mod format;
pub mod library;
pub mod password;
pub mod progress;
pub mod property;
pub mod read;
pub mod stream;
pub mod timestamp;
pub mod write;

pub use error::{Error, Result, ResultCode};
pub use library::Library;
pub use password::Password;
pub use property::{PropId, PropType, PropValue, PropertyInfo};
pub use timestamp::Timestamp;

pub use format::{FormatDescriptor, FormatId, FormatRegistry, SignatureMatcher};
pub use read::{Archive, ExtractOptions, FormatSelection, Item, OpenOptions};
pub use write::{WriteOptions, WriteResult, Writer};

pub use progress::{NoProgress, ProgressReporter, StatisticsProgress};
