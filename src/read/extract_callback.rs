//! Callback handed to the engine for one `extract` call.

use std::cell::{RefCell, RefMut};
use std::io;
use std::rc::Rc;

use crate::Password;
use crate::engine::{ArchiveExtractCallback, AskMode, EngineResult, InArchive, OperationResult, OutStream};
use crate::error::{Error, ResultCode};
use crate::progress::ProgressReporter;
use crate::property::{PropId, attributes};
use crate::stream::OutStreamAdapter;

use super::item::ItemProps;

/// Mode applied to extracted directories that carry no mode of their own.
const DEFAULT_DIR_MODE: u32 = 0o700;

/// The item announced by the last `get_stream`.
#[derive(Debug)]
struct Pending {
    index: u32,
    path: String,
    is_dir: bool,
    /// The output was opened for this item and must be closed on success.
    opened: bool,
}

#[derive(Default)]
struct ExtractState {
    pending: Option<Pending>,
    error: Option<Error>,
    total: u64,
    progress: Option<Box<dyn ProgressReporter>>,
}

impl ExtractState {
    fn record(&mut self, error: Error) -> ResultCode {
        let code = error.result_code();
        self.error.get_or_insert(error);
        code
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        if let Some(progress) = self.progress.as_mut() {
            progress.on_warning(&message);
        }
    }
}

/// Routes extracted items to the caller's output capability.
///
/// Directories are created with `mkdir` and never receive data. Files are
/// opened by path, handed to the engine as the sink and closed once the
/// engine reports success, after which time, attributes and mode are applied
/// in that order. Metadata that cannot be applied is a warning, not an error.
pub(crate) struct ExtractCallback {
    archive: Rc<dyn InArchive>,
    output: Rc<OutStreamAdapter>,
    password: Option<Password>,
    state: RefCell<ExtractState>,
}

impl ExtractCallback {
    pub(crate) fn new(
        archive: Rc<dyn InArchive>,
        output: Rc<OutStreamAdapter>,
        password: Option<Password>,
        progress: Option<Box<dyn ProgressReporter>>,
    ) -> Self {
        Self {
            archive,
            output,
            password,
            state: RefCell::new(ExtractState {
                progress,
                ..ExtractState::default()
            }),
        }
    }

    /// The first error recorded while translating engine results.
    pub(crate) fn take_error(&self) -> Option<Error> {
        self.state.try_borrow_mut().ok()?.error.take()
    }

    fn state(&self) -> EngineResult<RefMut<'_, ExtractState>> {
        self.state.try_borrow_mut().map_err(|_| ResultCode::Fail)
    }

    fn open_item(&self, index: u32) -> crate::error::Result<Pending> {
        let props = ItemProps::new(self.archive.as_ref(), index);
        let path = props.path()?;
        let is_dir = props.is_dir()?;
        let size = props.size(PropId::SIZE)?;

        if let Ok(mut state) = self.state() {
            if let Some(progress) = state.progress.as_mut() {
                progress.on_entry_start(&path, size);
            }
        }

        if is_dir {
            match self.output.mkdir(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                    log::debug!("output cannot create directory '{}'", path);
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            self.output.open(&path)?;
        }

        Ok(Pending {
            index,
            opened: !is_dir,
            path,
            is_dir,
        })
    }

    fn apply_metadata(&self, pending: &Pending, state: &mut ExtractState) {
        let props = ItemProps::new(self.archive.as_ref(), pending.index);
        let path = &pending.path;

        let outcome = |state: &mut ExtractState, what: &str, result: io::Result<()>| match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                log::debug!("output does not support {} for '{}'", what, path);
            }
            Err(e) => state.warn(format!("cannot set {} of '{}': {}", what, path, e)),
        };

        match props.mtime() {
            Ok(0) => {}
            Ok(time) => outcome(state, "time", self.output.set_time(path, time)),
            Err(e) => state.warn(format!("cannot read time of '{}': {}", path, e)),
        }

        match props.attributes() {
            Ok(0) => {}
            Ok(attr) => outcome(
                state,
                "attributes",
                self.output.set_attributes(path, attributes::without_overlay(attr)),
            ),
            Err(e) => state.warn(format!("cannot read attributes of '{}': {}", path, e)),
        }

        match props.mode() {
            Ok(0) if pending.is_dir => outcome(state, "mode", self.output.set_mode(path, DEFAULT_DIR_MODE)),
            Ok(0) => {}
            Ok(mode) => outcome(state, "mode", self.output.set_mode(path, mode)),
            Err(e) => state.warn(format!("cannot read mode of '{}': {}", path, e)),
        }
    }
}

impl ArchiveExtractCallback for ExtractCallback {
    fn set_total(&self, total: u64) -> EngineResult<()> {
        let mut state = self.state()?;
        state.total = total;
        if let Some(progress) = state.progress.as_mut() {
            progress.on_total(total);
        }
        Ok(())
    }

    fn set_completed(&self, completed: Option<u64>) -> EngineResult<()> {
        let mut state = self.state()?;
        let total = state.total;
        if let (Some(completed), Some(progress)) = (completed, state.progress.as_mut()) {
            progress.on_progress(completed, total);
        }
        Ok(())
    }

    fn get_stream(&self, index: u32, mode: AskMode) -> EngineResult<Option<Rc<dyn OutStream>>> {
        log::trace!("extract get_stream {} {:?}", index, mode);
        self.state()?.pending = None;
        if mode != AskMode::Extract {
            return Ok(None);
        }

        match self.open_item(index) {
            Ok(pending) => {
                let opened = pending.opened;
                self.state()?.pending = Some(pending);
                if opened {
                    let sink: Rc<dyn OutStream> = self.output.clone();
                    Ok(Some(sink))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                log::debug!("item {} cannot be routed to the output: {}", index, e);
                Err(self.state()?.record(e))
            }
        }
    }

    fn prepare_operation(&self, mode: AskMode) -> EngineResult<()> {
        log::trace!("extract prepare {:?}", mode);
        Ok(())
    }

    fn set_operation_result(&self, result: OperationResult) -> EngineResult<()> {
        log::trace!("extract result {}", result);
        let mut state = self.state()?;
        let pending = state.pending.take();
        let entry_index = pending.as_ref().map(|p| p.index);
        let entry_name = pending.as_ref().map(|p| p.path.clone());

        if let (Some(p), Some(progress)) = (pending.as_ref(), state.progress.as_mut()) {
            progress.on_entry_complete(&p.path, result == OperationResult::Ok);
        }

        if result != OperationResult::Ok {
            if let Some(p) = pending.as_ref().filter(|p| p.opened) {
                if let Err(e) = self.output.close() {
                    log::debug!("closing '{}' after a failed item: {}", p.path, e);
                }
            }
        }

        match result {
            OperationResult::Ok => {
                let Some(pending) = pending else {
                    return Ok(());
                };
                if pending.opened {
                    if let Err(e) = self.output.close() {
                        return Err(state.record(e.into()));
                    }
                }
                self.apply_metadata(&pending, &mut state);
                Ok(())
            }
            OperationResult::WrongPassword => Err(state.record(Error::WrongPassword {
                entry_index,
                entry_name,
            })),
            OperationResult::UnsupportedMethod => Err(state.record(Error::UnsupportedMethod {
                entry_index,
                entry_name,
            })),
            other => Err(state.record(Error::ExtractionFailed {
                entry_index,
                entry_name,
                result: other,
            })),
        }
    }

    fn password(&self) -> EngineResult<Password> {
        self.password.clone().ok_or(ResultCode::NeedPassword)
    }
}
