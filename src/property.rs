//! Property identifiers and typed property values.
//!
//! Archive-level and item-level metadata travel between the engine and this
//! crate as `(PropId, PropValue)` pairs. The identifier table is the engine's
//! stable external contract; [`PropId::name`] gives the conventional name of
//! every known identifier.
//!
//! Typed accessors follow one rule set: an empty value reads as `None`, a
//! value of another type is an [`Error::PropertyType`].

use std::fmt;

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;

/// Numeric property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropId(pub u32);

macro_rules! prop_ids {
    ($($(#[$doc:meta])* $name:ident = $value:literal, $label:literal;)*) => {
        impl PropId {
            $(
                $(#[$doc])*
                pub const $name: PropId = PropId($value);
            )*

            /// Conventional name of this identifier, or `None` for ids outside
            /// the table (including user-defined ids).
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($label),)*
                    _ => None,
                }
            }
        }
    };
}

prop_ids! {
    /// No property.
    NO_PROPERTY = 0, "NoProperty";
    /// Index of the item that holds the embedded archive (envelope formats).
    MAIN_SUBFILE = 1, "MainSubfile";
    /// Index of the item inside the handler.
    HANDLER_ITEM_INDEX = 2, "HandlerItemIndex";
    /// Full item path.
    PATH = 3, "Path";
    /// Item or archive name.
    NAME = 4, "Name";
    /// File name extension.
    EXTENSION = 5, "Extension";
    /// Whether the item is a directory.
    IS_DIR = 6, "IsDir";
    /// Unpacked size.
    SIZE = 7, "Size";
    /// Packed size.
    PACK_SIZE = 8, "PackSize";
    /// Windows attributes, optionally with a POSIX mode overlay.
    ATTRIB = 9, "Attrib";
    /// Creation time.
    CTIME = 10, "CTime";
    /// Access time.
    ATIME = 11, "ATime";
    /// Modification time.
    MTIME = 12, "MTime";
    /// Solid archive flag.
    SOLID = 13, "Solid";
    /// Item has a comment.
    COMMENTED = 14, "Commented";
    /// Item is encrypted.
    ENCRYPTED = 15, "Encrypted";
    /// Item continues from a previous volume.
    SPLIT_BEFORE = 16, "SplitBefore";
    /// Item continues in the next volume.
    SPLIT_AFTER = 17, "SplitAfter";
    /// Dictionary size.
    DICTIONARY_SIZE = 18, "DictionarySize";
    /// CRC-32 of the item data.
    CRC = 19, "CRC";
    /// Archive type.
    TYPE = 20, "Type";
    /// Anti-item (deletion marker).
    IS_ANTI = 21, "IsAnti";
    /// Compression method.
    METHOD = 22, "Method";
    /// Host operating system.
    HOST_OS = 23, "HostOS";
    /// File system.
    FILE_SYSTEM = 24, "FileSystem";
    /// Owner user name.
    USER = 25, "User";
    /// Owner group name.
    GROUP = 26, "Group";
    /// Block index.
    BLOCK = 27, "Block";
    /// Comment.
    COMMENT = 28, "Comment";
    /// Position.
    POSITION = 29, "Position";
    /// Path prefix.
    PREFIX = 30, "Prefix";
    /// Number of sub-directories.
    NUM_SUB_DIRS = 31, "NumSubDirs";
    /// Number of sub-files.
    NUM_SUB_FILES = 32, "NumSubFiles";
    /// Version needed to extract.
    UNPACK_VER = 33, "UnpackVer";
    /// Volume number.
    VOLUME = 34, "Volume";
    /// Archive is a volume of a multivolume set.
    IS_VOLUME = 35, "IsVolume";
    /// Offset.
    OFFSET = 36, "Offset";
    /// Number of links.
    LINKS = 37, "Links";
    /// Number of blocks.
    NUM_BLOCKS = 38, "NumBlocks";
    /// Number of volumes.
    NUM_VOLUMES = 39, "NumVolumes";
    /// Time precision type.
    TIME_TYPE = 40, "TimeType";
    /// 64-bit image.
    BIT64 = 41, "Bit64";
    /// Big-endian image.
    BIG_ENDIAN = 42, "BigEndian";
    /// CPU type.
    CPU = 43, "Cpu";
    /// Physical size.
    PHY_SIZE = 44, "PhySize";
    /// Headers size.
    HEADERS_SIZE = 45, "HeadersSize";
    /// Checksum.
    CHECKSUM = 46, "Checksum";
    /// Characteristics.
    CHARACTS = 47, "Characts";
    /// Virtual address.
    VA = 48, "Va";
    /// Identifier.
    ID = 49, "Id";
    /// Short (8.3) name.
    SHORT_NAME = 50, "ShortName";
    /// Creator application.
    CREATOR_APP = 51, "CreatorApp";
    /// Sector size.
    SECTOR_SIZE = 52, "SectorSize";
    /// POSIX mode bits.
    POSIX_ATTRIB = 53, "PosixAttrib";
    /// Symbolic link target.
    SYM_LINK = 54, "SymLink";
    /// Error message.
    ERROR = 55, "Error";
    /// Total size.
    TOTAL_SIZE = 56, "TotalSize";
    /// Free space.
    FREE_SPACE = 57, "FreeSpace";
    /// Cluster size.
    CLUSTER_SIZE = 58, "ClusterSize";
    /// Volume label.
    VOLUME_NAME = 59, "VolumeName";
    /// Local name.
    LOCAL_NAME = 60, "LocalName";
    /// Provider.
    PROVIDER = 61, "Provider";
    /// NT security descriptor.
    NT_SECURE = 62, "NtSecure";
    /// Item is an alternate data stream.
    IS_ALT_STREAM = 63, "IsAltStream";
    /// Auxiliary item.
    IS_AUX = 64, "IsAux";
    /// Deleted item.
    IS_DELETED = 65, "IsDeleted";
    /// Tree item.
    IS_TREE = 66, "IsTree";
    /// SHA-1 digest.
    SHA1 = 67, "Sha1";
    /// SHA-256 digest.
    SHA256 = 68, "Sha256";
    /// Error type.
    ERROR_TYPE = 69, "ErrorType";
    /// Number of errors.
    NUM_ERRORS = 70, "NumErrors";
    /// Error flags.
    ERROR_FLAGS = 71, "ErrorFlags";
    /// Warning flags.
    WARNING_FLAGS = 72, "WarningFlags";
    /// Warning message.
    WARNING = 73, "Warning";
    /// Number of streams.
    NUM_STREAMS = 74, "NumStreams";
    /// Number of alternate streams.
    NUM_ALT_STREAMS = 75, "NumAltStreams";
    /// Size of alternate streams.
    ALT_STREAMS_SIZE = 76, "AltStreamsSize";
    /// Virtual size.
    VIRTUAL_SIZE = 77, "VirtualSize";
    /// Unpacked size of the archive.
    UNPACK_SIZE = 78, "UnpackSize";
    /// Total physical size of all volumes.
    TOTAL_PHY_SIZE = 79, "TotalPhySize";
    /// Index of the volume.
    VOLUME_INDEX = 80, "VolumeIndex";
    /// Archive subtype.
    SUB_TYPE = 81, "SubType";
    /// Short comment.
    SHORT_COMMENT = 82, "ShortComment";
    /// Code page of names.
    CODE_PAGE = 83, "CodePage";
    /// Stream is not an archive of this type.
    IS_NOT_ARC_TYPE = 84, "IsNotArcType";
    /// Physical size cannot be detected.
    PHY_SIZE_CANT_BE_DETECTED = 85, "PhySizeCantBeDetected";
    /// Trailing zeros are allowed.
    ZEROS_TAIL_IS_ALLOWED = 86, "ZerosTailIsAllowed";
    /// Tail size.
    TAIL_SIZE = 87, "TailSize";
    /// Embedded stub size.
    EMBEDDED_STUB_SIZE = 88, "EmbeddedStubSize";
    /// NT reparse data.
    NT_REPARSE = 89, "NtReparse";
    /// Hard link target.
    HARD_LINK = 90, "HardLink";
    /// Inode number.
    INODE = 91, "INode";
    /// Stream identifier.
    STREAM_ID = 92, "StreamId";
    /// Read-only flag.
    READ_ONLY = 93, "ReadOnly";
    /// Output name.
    OUT_NAME = 94, "OutName";
    /// Copy link.
    COPY_LINK = 95, "CopyLink";
    /// First user-defined identifier.
    USER_DEFINED = 0x10000, "UserDefined";
}

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// Type tag of a [`PropValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropType {
    /// No value.
    Empty,
    /// Boolean.
    Bool,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Text.
    String,
    /// FILETIME timestamp.
    Time,
    /// Raw bytes (signatures, class ids).
    Bytes,
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Bool => "bool",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::String => "string",
            Self::Time => "time",
            Self::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropValue {
    /// The property is absent.
    #[default]
    Empty,
    /// Boolean value.
    Bool(bool),
    /// 32-bit value.
    UInt32(u32),
    /// 64-bit value.
    UInt64(u64),
    /// Text value.
    String(String),
    /// Timestamp value.
    Time(Timestamp),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl PropValue {
    /// Type tag of this value.
    pub fn prop_type(&self) -> PropType {
        match self {
            Self::Empty => PropType::Empty,
            Self::Bool(_) => PropType::Bool,
            Self::UInt32(_) => PropType::UInt32,
            Self::UInt64(_) => PropType::UInt64,
            Self::String(_) => PropType::String,
            Self::Time(_) => PropType::Time,
            Self::Bytes(_) => PropType::Bytes,
        }
    }

    /// Returns `true` for [`PropValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn mismatch(&self, id: PropId, expected: PropType) -> Error {
        Error::PropertyType {
            id,
            expected,
            found: self.prop_type(),
        }
    }

    /// Reads a string property.
    pub fn into_string(self, id: PropId) -> Result<Option<String>> {
        match self {
            Self::Empty => Ok(None),
            Self::String(s) => Ok(Some(s)),
            other => Err(other.mismatch(id, PropType::String)),
        }
    }

    /// Reads a boolean property.
    pub fn to_bool(&self, id: PropId) -> Result<Option<bool>> {
        match self {
            Self::Empty => Ok(None),
            Self::Bool(b) => Ok(Some(*b)),
            other => Err(other.mismatch(id, PropType::Bool)),
        }
    }

    /// Reads a 32-bit property.
    pub fn to_u32(&self, id: PropId) -> Result<Option<u32>> {
        match self {
            Self::Empty => Ok(None),
            Self::UInt32(v) => Ok(Some(*v)),
            other => Err(other.mismatch(id, PropType::UInt32)),
        }
    }

    /// Reads a 64-bit property.
    pub fn to_u64(&self, id: PropId) -> Result<Option<u64>> {
        match self {
            Self::Empty => Ok(None),
            Self::UInt64(v) => Ok(Some(*v)),
            other => Err(other.mismatch(id, PropType::UInt64)),
        }
    }

    /// Reads a time property as 32-bit Unix seconds.
    ///
    /// Times outside the representable range read as `None`.
    pub fn to_unix_time(&self, id: PropId) -> Result<Option<u32>> {
        match self {
            Self::Empty => Ok(None),
            Self::Time(ts) => Ok(ts.to_unix_u32()),
            other => Err(other.mismatch(id, PropType::Time)),
        }
    }

    /// Reads a raw byte property. Strings are accepted as their UTF-8 bytes.
    pub fn into_bytes(self, id: PropId) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Empty => Ok(None),
            Self::Bytes(b) => Ok(Some(b)),
            Self::String(s) => Ok(Some(s.into_bytes())),
            other => Err(other.mismatch(id, PropType::Bytes)),
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for PropValue {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Timestamp> for PropValue {
    fn from(v: Timestamp) -> Self {
        Self::Time(v)
    }
}

/// Description of one property an archive can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Display name, if the engine provides one.
    pub name: Option<String>,
    /// Property identifier.
    pub id: PropId,
    /// Declared value type.
    pub prop_type: PropType,
}

/// Windows file attribute bits carried by [`PropId::ATTRIB`].
///
/// When [`UNIX_EXTENSION`](attributes::UNIX_EXTENSION) is set, the upper 16
/// bits hold a POSIX mode.
pub mod attributes {
    /// Read-only file.
    pub const READONLY: u32 = 0x01;
    /// Hidden file.
    pub const HIDDEN: u32 = 0x02;
    /// System file.
    pub const SYSTEM: u32 = 0x04;
    /// Directory.
    pub const DIRECTORY: u32 = 0x10;
    /// Archive file.
    pub const ARCHIVE: u32 = 0x20;
    /// POSIX mode overlay present in the high 16 bits.
    pub const UNIX_EXTENSION: u32 = 0x8000;

    /// Attribute bits with the overlay flag removed.
    pub fn without_overlay(attr: u32) -> u32 {
        if attr & UNIX_EXTENSION != 0 {
            attr & 0x7FFF
        } else {
            attr
        }
    }

    /// POSIX mode packed in the overlay, if the overlay flag is set.
    pub fn overlay_mode(attr: u32) -> Option<u32> {
        (attr & UNIX_EXTENSION != 0).then_some(attr >> 16)
    }
}
