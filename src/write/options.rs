//! Options for archive creation.

use crate::Password;
use crate::progress::ProgressReporter;

/// Options for [`Writer::open`](super::Writer::open).
#[derive(Default)]
pub struct WriteOptions {
    /// Output format index; `None` picks by the output name's extension,
    /// falling back to 7z.
    pub format: Option<usize>,
    /// Password for encryption.
    pub password: Option<Password>,
    /// Progress reporter (optional).
    pub progress: Option<Box<dyn ProgressReporter>>,
}

impl std::fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteOptions")
            .field("format", &self.format)
            .field("password", &self.password)
            .finish_non_exhaustive()
    }
}

impl WriteOptions {
    /// Creates write options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the output format.
    pub fn format(mut self, index: usize) -> Self {
        self.format = Some(index);
        self
    }

    /// Sets the password for encryption.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the progress reporter.
    pub fn progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }

    /// Returns `true` if a password is set.
    pub fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }
}

/// Outcome of [`Writer::update`](super::Writer::update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Items the engine reported as written.
    pub entries_written: usize,
    /// Items the engine reported a failure for.
    pub entries_failed: usize,
}
