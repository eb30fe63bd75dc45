//! Options for opening and extracting archives.

use crate::Password;
use crate::progress::ProgressReporter;

use super::DEFAULT_MAX_CHECK_START;

/// How the format of an input is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatSelection {
    /// Signature with the name's extension as hint, then signature over the
    /// whole registry, then extension alone.
    #[default]
    Auto,
    /// Signature over the whole registry only.
    SignatureOnly,
    /// Use this format index without detection.
    Forced(usize),
}

/// Default limit on the length of a sub-archive chain.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 32;

/// Options for [`Archive::open`](super::Archive::open).
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Format selection for the outermost container.
    pub format: FormatSelection,
    /// Password for encrypted headers.
    pub password: Option<Password>,
    /// How far the engine may scan for the start of a container.
    pub max_check_start: u64,
    /// Maximum number of chained containers, `None` for no limit.
    pub max_chain_depth: Option<usize>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            format: FormatSelection::Auto,
            password: None,
            max_check_start: DEFAULT_MAX_CHECK_START,
            max_chain_depth: Some(DEFAULT_MAX_CHAIN_DEPTH),
        }
    }
}

impl OpenOptions {
    /// Creates open options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the format selection.
    pub fn format(mut self, format: FormatSelection) -> Self {
        self.format = format;
        self
    }

    /// Sets the password for encrypted headers.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the engine's scan budget.
    pub fn max_check_start(mut self, bytes: u64) -> Self {
        self.max_check_start = bytes;
        self
    }

    /// Sets the sub-archive chain limit.
    pub fn max_chain_depth(mut self, depth: Option<usize>) -> Self {
        self.max_chain_depth = depth;
        self
    }
}

/// Options for [`Archive::extract`](super::Archive::extract).
#[derive(Default)]
pub struct ExtractOptions {
    /// Single item to extract, `None` for all items.
    pub index: Option<u32>,
    /// Password for encrypted items; falls back to the open password.
    pub password: Option<Password>,
    /// Progress reporter (optional).
    pub progress: Option<Box<dyn ProgressReporter>>,
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("index", &self.index)
            .field("password", &self.password)
            .finish_non_exhaustive()
    }
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts extraction to one item.
    pub fn index(mut self, index: impl Into<Option<u32>>) -> Self {
        self.index = index.into();
        self
    }

    /// Sets the password for encrypted items.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the progress reporter.
    pub fn progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }
}
