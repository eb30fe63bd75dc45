//! The loaded engine and its format registry.

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::format::{FormatDescriptor, FormatId, FormatRegistry, SignatureMatcher};
use crate::stream::{InStreamAdapter, SharedInput};

/// An explicit engine session.
///
/// Produced once per loaded engine and passed by reference to every
/// [`Archive`](crate::Archive) and [`Writer`](crate::Writer). Cloning is
/// cheap: clones share the engine and the registry.
#[derive(Clone)]
pub struct Library {
    engine: Rc<dyn Engine>,
    registry: Rc<FormatRegistry>,
}

impl Library {
    /// Wraps a loaded engine and enumerates its formats.
    pub fn new(engine: Rc<dyn Engine>) -> Self {
        let registry = Rc::new(FormatRegistry::load(engine.as_ref()));
        log::debug!(
            "engine {}.{} loaded with {} formats",
            engine.version() >> 16,
            engine.version() & 0xFFFF,
            registry.count()
        );
        Self { engine, registry }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Rc<dyn Engine> {
        &self.engine
    }

    /// The format registry.
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Engine version, `major << 16 | minor`.
    pub fn version(&self) -> u32 {
        self.engine.version()
    }

    /// Number of formats.
    pub fn format_count(&self) -> usize {
        self.registry.count()
    }

    /// Descriptor of format `index`.
    pub fn format(&self, index: usize) -> Option<&FormatDescriptor> {
        self.registry.descriptor(index)
    }

    /// Name of format `index`.
    pub fn format_name(&self, index: usize) -> Option<&str> {
        self.format(index).map(|d| d.name.as_str())
    }

    /// Extension tokens of format `index`.
    pub fn format_extensions(&self, index: usize) -> Option<&[String]> {
        self.format(index).map(|d| d.extensions.as_slice())
    }

    /// Whether archives of format `index` can be created.
    pub fn format_updatable(&self, index: usize) -> bool {
        self.format(index).is_some_and(|d| d.updatable)
    }

    /// Class id of format `index`.
    pub fn format_guid(&self, index: usize) -> Option<FormatId> {
        self.registry.guid(index)
    }

    /// First format claiming extension `ext`.
    pub fn format_by_extension(&self, ext: &str) -> Option<usize> {
        self.registry.by_extension(ext)
    }

    /// Format with the given name.
    pub fn format_by_name(&self, name: &str) -> Option<usize> {
        self.registry.by_name(name)
    }

    /// Detects the format of an already opened input from its signature.
    pub fn format_by_signature(&self, input: &SharedInput, extension_hint: Option<&str>) -> Option<usize> {
        let adapter = InStreamAdapter::borrowed(Rc::clone(input));
        SignatureMatcher::new(&self.registry).detect(&adapter, extension_hint)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("version", &self.engine.version())
            .field("formats", &self.registry.count())
            .finish_non_exhaustive()
    }
}
