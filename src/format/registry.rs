//! Format enumeration.

use crate::engine::{Engine, HandlerProperty};
use crate::format::{FormatDescriptor, FormatId};
use crate::property::{PropId, PropValue};

/// Formats known to a loaded engine.
///
/// Descriptors are read once, when the registry is built. Handler properties
/// the engine fails to provide read as absent values (empty name, no
/// extensions, no signature, zero id), so detection degrades instead of
/// failing.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

fn handler_value(engine: &dyn Engine, index: u32, property: HandlerProperty) -> PropValue {
    engine
        .handler_property(index, property)
        .unwrap_or_else(|code| {
            log::debug!("handler property {:?} of format {}: {}", property, index, code);
            PropValue::Empty
        })
}

fn non_empty(bytes: Option<Vec<u8>>) -> Option<Vec<u8>> {
    bytes.filter(|b| !b.is_empty())
}

impl FormatRegistry {
    /// Enumerates every format of `engine`.
    pub fn load(engine: &dyn Engine) -> Self {
        let count = engine.format_count().unwrap_or_else(|code| {
            log::warn!("engine did not report its formats: {}", code);
            0
        });
        let formats = (0..count)
            .map(|index| Self::describe(engine, index))
            .collect::<Vec<_>>();
        log::debug!("registered {} formats", formats.len());
        Self { formats }
    }

    fn describe(engine: &dyn Engine, index: u32) -> FormatDescriptor {
        let value = |property| handler_value(engine, index, property);
        let id = PropId::NO_PROPERTY;

        let name = value(HandlerProperty::Name)
            .into_string(id)
            .ok()
            .flatten()
            .unwrap_or_default();
        let extensions = value(HandlerProperty::Extension)
            .into_string(id)
            .ok()
            .flatten()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let format_id = value(HandlerProperty::ClassId)
            .into_bytes(id)
            .ok()
            .flatten()
            .and_then(|b| FormatId::from_slice(&b))
            .unwrap_or_default();
        let signature = non_empty(value(HandlerProperty::Signature).into_bytes(id).ok().flatten());
        let multi_signature = non_empty(
            value(HandlerProperty::MultiSignature)
                .into_bytes(id)
                .ok()
                .flatten(),
        );
        let signature_offset = value(HandlerProperty::SignatureOffset)
            .to_u32(id)
            .ok()
            .flatten()
            .map_or(0, u64::from);
        let updatable = value(HandlerProperty::Update)
            .to_bool(id)
            .ok()
            .flatten()
            .unwrap_or(false);

        FormatDescriptor {
            index: index as usize,
            name,
            extensions,
            signature_offset,
            signature,
            multi_signature,
            updatable,
            format_id,
        }
    }

    /// Builds a registry from ready-made descriptors. Indices are reassigned
    /// to match positions.
    pub fn from_descriptors(formats: Vec<FormatDescriptor>) -> Self {
        let formats = formats
            .into_iter()
            .enumerate()
            .map(|(index, d)| FormatDescriptor { index, ..d })
            .collect();
        Self { formats }
    }

    /// Number of formats.
    pub fn count(&self) -> usize {
        self.formats.len()
    }

    /// Returns `true` if the engine reported no formats.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Descriptor of format `index`.
    pub fn descriptor(&self, index: usize) -> Option<&FormatDescriptor> {
        self.formats.get(index)
    }

    /// All descriptors, in engine order.
    pub fn iter(&self) -> std::slice::Iter<'_, FormatDescriptor> {
        self.formats.iter()
    }

    /// First format whose extension tokens contain `ext`.
    pub fn by_extension(&self, ext: &str) -> Option<usize> {
        if ext.is_empty() {
            return None;
        }
        self.formats.iter().position(|d| d.supports_extension(ext))
    }

    /// Format with the given name.
    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.formats.iter().position(|d| d.name == name)
    }

    /// Class id of format `index`.
    pub fn guid(&self, index: usize) -> Option<FormatId> {
        self.formats.get(index).map(|d| d.format_id)
    }
}

impl<'a> IntoIterator for &'a FormatRegistry {
    type Item = &'a FormatDescriptor;
    type IntoIter = std::slice::Iter<'a, FormatDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
