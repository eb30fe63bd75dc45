//! Callback handed to the engine while a container is being opened.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

use crate::Password;
use crate::engine::{ArchiveOpenCallback, EngineResult, Volume};
use crate::error::ResultCode;
use crate::property::{PropId, PropValue};
use crate::stream::InStreamAdapter;
use crate::timestamp::Timestamp;

#[derive(Debug, Default)]
struct OpenState {
    /// Name of the stream the engine is currently looking at.
    pathname: String,
    /// Set once the callback serves an embedded archive.
    sub_archive: Option<String>,
}

/// Answers property, volume and password requests during `open`.
///
/// One callback serves the whole open sequence, outer container first. Once
/// [`set_sub_archive_name`](ArchiveOpenCallback::set_sub_archive_name) is
/// called it describes the embedded archive instead and refuses volumes.
pub(crate) struct OpenCallback {
    input: Rc<InStreamAdapter>,
    password: Option<Password>,
    password_requested: Cell<bool>,
    state: RefCell<OpenState>,
}

impl OpenCallback {
    pub(crate) fn new(input: Rc<InStreamAdapter>, name: &str, password: Option<Password>) -> Self {
        Self {
            input,
            password,
            password_requested: Cell::new(false),
            state: RefCell::new(OpenState {
                pathname: name.to_string(),
                sub_archive: None,
            }),
        }
    }

    /// Whether the engine asked for a password that was not supplied.
    pub(crate) fn missing_password(&self) -> bool {
        self.password_requested.get() && self.password.is_none()
    }

    fn stream_property(&self, pathname: &str, id: PropId) -> PropValue {
        let input = &self.input;
        match id {
            PropId::PATH | PropId::NAME => PropValue::String(pathname.to_string()),
            PropId::IS_DIR => PropValue::Bool(input.is_dir(pathname)),
            PropId::SIZE => PropValue::UInt64(input.size(pathname)),
            PropId::ATTRIB => PropValue::UInt32(input.attributes(pathname)),
            PropId::POSIX_ATTRIB => PropValue::UInt32(input.mode(pathname)),
            PropId::CTIME | PropId::ATIME | PropId::MTIME => match input.mtime(pathname) {
                0 => PropValue::Empty,
                secs => PropValue::Time(Timestamp::from_unix_u32(secs)),
            },
            _ => PropValue::Empty,
        }
    }
}

impl ArchiveOpenCallback for OpenCallback {
    fn set_total(&self, files: Option<u64>, bytes: Option<u64>) -> EngineResult<()> {
        log::trace!("open total files={:?} bytes={:?}", files, bytes);
        Ok(())
    }

    fn set_completed(&self, files: Option<u64>, bytes: Option<u64>) -> EngineResult<()> {
        log::trace!("open completed files={:?} bytes={:?}", files, bytes);
        Ok(())
    }

    fn property(&self, id: PropId) -> EngineResult<PropValue> {
        let state = self.state.try_borrow().map_err(|_| ResultCode::Fail)?;
        let value = match &state.sub_archive {
            Some(name) if id == PropId::NAME => PropValue::String(name.clone()),
            Some(_) => PropValue::Empty,
            None => self.stream_property(&state.pathname, id),
        };
        log::trace!("open property {} -> {:?}", id, value);
        Ok(value)
    }

    fn volume_stream(&self, name: &str) -> EngineResult<Volume> {
        let mut state = self.state.try_borrow_mut().map_err(|_| ResultCode::Fail)?;
        if state.sub_archive.is_some() {
            return Ok(Volume::NoMoreVolumes);
        }

        let Some(clone) = self.input.try_clone() else {
            log::debug!("volume '{}' requested but the input cannot be cloned", name);
            return Err(ResultCode::Fail);
        };
        let adapter = InStreamAdapter::cloned(clone);
        match adapter.open(name) {
            Ok(()) => {
                log::debug!("opened volume '{}'", name);
                state.pathname = name.to_string();
                Ok(Volume::Stream(Rc::new(adapter)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("volume '{}' not found, sequence ends", name);
                Ok(Volume::NoMoreVolumes)
            }
            Err(e) => {
                log::warn!("volume '{}' could not be opened: {}", name, e);
                Err(ResultCode::from_io(&e))
            }
        }
    }

    fn set_sub_archive_name(&self, name: &str) -> EngineResult<()> {
        let mut state = self.state.try_borrow_mut().map_err(|_| ResultCode::Fail)?;
        log::debug!("entering sub-archive '{}'", name);
        state.sub_archive = Some(name.to_string());
        Ok(())
    }

    fn password(&self) -> EngineResult<Password> {
        self.password_requested.set(true);
        self.password.clone().ok_or(ResultCode::NeedPassword)
    }
}
