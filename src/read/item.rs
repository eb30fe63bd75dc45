//! Item projections over an opened container.

use crate::engine::InArchive;
use crate::error::{Error, Result};
use crate::property::{PropId, PropValue, attributes};

/// Path reported for items that carry no path of their own (single-stream
/// formats such as gzip).
pub const CONTENT_ALIAS: &str = "[Content]";

/// Snapshot of one item's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    /// Index in the active container.
    pub index: u32,
    /// Path inside the archive, [`CONTENT_ALIAS`] if the item has none.
    pub path: String,
    /// Unpacked size.
    pub size: u64,
    /// Packed size, 0 if unknown.
    pub packed_size: u64,
    /// POSIX mode, 0 if unknown.
    pub mode: u32,
    /// Windows attributes as stored (overlay bit included).
    pub attributes: u32,
    /// Modification time in Unix seconds, 0 if unknown.
    pub mtime: u32,
    /// Whether the item is a directory.
    pub is_dir: bool,
    /// CRC-32 of the data, if the format records one.
    pub crc: Option<u32>,
}

/// Property reads for one item, computed per query.
pub(crate) struct ItemProps<'a> {
    archive: &'a dyn InArchive,
    index: u32,
}

impl<'a> ItemProps<'a> {
    pub(crate) fn new(archive: &'a dyn InArchive, index: u32) -> Self {
        Self { archive, index }
    }

    pub(crate) fn get(&self, id: PropId) -> Result<PropValue> {
        self.archive
            .property(self.index, id)
            .map_err(|code| Error::engine("item property", code))
    }

    pub(crate) fn path(&self) -> Result<String> {
        let path = self.get(PropId::PATH)?.into_string(PropId::PATH)?;
        Ok(path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| CONTENT_ALIAS.to_string()))
    }

    /// 64-bit value, else 32-bit value, else 0.
    pub(crate) fn size(&self, id: PropId) -> Result<u64> {
        match self.get(id)? {
            PropValue::UInt64(v) => Ok(v),
            PropValue::UInt32(v) => Ok(u64::from(v)),
            PropValue::Empty => Ok(0),
            other => other.to_u64(id).map(|v| v.unwrap_or(0)),
        }
    }

    pub(crate) fn attributes(&self) -> Result<u32> {
        Ok(self.get(PropId::ATTRIB)?.to_u32(PropId::ATTRIB)?.unwrap_or(0))
    }

    /// POSIX mode property, else the attribute overlay, else 0.
    pub(crate) fn mode(&self) -> Result<u32> {
        let posix = self
            .get(PropId::POSIX_ATTRIB)?
            .to_u32(PropId::POSIX_ATTRIB)?
            .unwrap_or(0);
        if posix != 0 {
            return Ok(posix);
        }
        Ok(attributes::overlay_mode(self.attributes()?).unwrap_or(0))
    }

    pub(crate) fn mtime(&self) -> Result<u32> {
        Ok(self
            .get(PropId::MTIME)?
            .to_unix_time(PropId::MTIME)?
            .unwrap_or(0))
    }

    pub(crate) fn is_dir(&self) -> Result<bool> {
        Ok(self.get(PropId::IS_DIR)?.to_bool(PropId::IS_DIR)?.unwrap_or(false))
    }

    pub(crate) fn crc(&self) -> Result<Option<u32>> {
        self.get(PropId::CRC)?.to_u32(PropId::CRC)
    }

    pub(crate) fn item(&self) -> Result<Item> {
        Ok(Item {
            index: self.index,
            path: self.path()?,
            size: self.size(PropId::SIZE)?,
            packed_size: self.size(PropId::PACK_SIZE)?,
            mode: self.mode()?,
            attributes: self.attributes()?,
            mtime: self.mtime()?,
            is_dir: self.is_dir()?,
            crc: self.crc()?,
        })
    }
}
