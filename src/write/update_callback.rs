//! Callback handed to the engine for one `update` call.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crate::Password;
use crate::engine::{ArchiveUpdateCallback, EngineResult, InStream, OperationResult, OutStream, UpdateItemInfo};
use crate::error::ResultCode;
use crate::progress::ProgressReporter;
use crate::property::{PropId, PropValue};
use crate::stream::InStreamAdapter;
use crate::timestamp::Timestamp;

use super::WriteResult;

#[derive(Default)]
struct UpdateState {
    current: Option<usize>,
    total: u64,
    result: WriteResult,
    progress: Option<Box<dyn ProgressReporter>>,
}

/// Describes queued items to the engine and streams their data.
///
/// Item properties are read from the input capability on every request. An
/// item's stream is opened when the engine asks for it and closed when the
/// engine reports the item's result, whatever that result is.
pub(crate) struct UpdateCallback {
    input: Rc<InStreamAdapter>,
    items: Vec<String>,
    password: Option<Password>,
    state: RefCell<UpdateState>,
}

impl UpdateCallback {
    pub(crate) fn new(
        input: Rc<InStreamAdapter>,
        items: Vec<String>,
        password: Option<Password>,
        progress: Option<Box<dyn ProgressReporter>>,
    ) -> Self {
        Self {
            input,
            items,
            password,
            state: RefCell::new(UpdateState {
                progress,
                ..UpdateState::default()
            }),
        }
    }

    /// Counters and the progress reporter, once the engine is done.
    pub(crate) fn finish(&self) -> (WriteResult, Option<Box<dyn ProgressReporter>>) {
        match self.state.try_borrow_mut() {
            Ok(mut state) => (state.result, state.progress.take()),
            Err(_) => (WriteResult::default(), None),
        }
    }

    fn state(&self) -> EngineResult<RefMut<'_, UpdateState>> {
        self.state.try_borrow_mut().map_err(|_| ResultCode::Fail)
    }

    fn item(&self, index: u32) -> EngineResult<&str> {
        self.items
            .get(index as usize)
            .map(String::as_str)
            .ok_or(ResultCode::InvalidArgument)
    }
}

impl ArchiveUpdateCallback for UpdateCallback {
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

    fn update_item_info(&self, index: u32) -> EngineResult<UpdateItemInfo> {
        self.item(index)?;
        Ok(UpdateItemInfo {
            new_data: true,
            new_properties: true,
            index_in_archive: None,
        })
    }

    fn property(&self, index: u32, id: PropId) -> EngineResult<PropValue> {
        let name = self.item(index)?;
        let input = &self.input;
        let non_zero = |v: u32| if v == 0 { PropValue::Empty } else { PropValue::UInt32(v) };
        let value = match id {
            PropId::IS_ANTI => PropValue::Bool(false),
            PropId::PATH => PropValue::String(name.to_string()),
            PropId::IS_DIR => PropValue::Bool(input.is_dir(name)),
            PropId::SIZE => PropValue::UInt64(input.size(name)),
            PropId::CTIME | PropId::ATIME | PropId::MTIME => match input.mtime(name) {
                0 => PropValue::Empty,
                secs => PropValue::Time(Timestamp::from_unix_u32(secs)),
            },
            PropId::ATTRIB => non_zero(input.attributes(name)),
            PropId::POSIX_ATTRIB => non_zero(input.mode(name)),
            _ => PropValue::Empty,
        };
        log::trace!("update property {} of '{}' -> {:?}", id, name, value);
        Ok(value)
    }

    fn stream(&self, index: u32) -> EngineResult<Rc<dyn InStream>> {
        let name = self.item(index)?;
        if let Err(e) = self.input.open(name) {
            log::warn!("cannot open '{}' for archiving: {}", name, e);
            return Err(ResultCode::from_io(&e));
        }

        let mut state = self.state()?;
        state.current = Some(index as usize);
        let size = self.input.size(name);
        if let Some(progress) = state.progress.as_mut() {
            progress.on_entry_start(name, size);
        }
        let stream: Rc<dyn InStream> = self.input.clone();
        Ok(stream)
    }

    fn set_operation_result(&self, result: OperationResult) -> EngineResult<()> {
        self.input.close();

        let mut state = self.state()?;
        let current = state.current.take();
        let success = result == OperationResult::Ok;
        if success {
            state.result.entries_written += 1;
        } else {
            state.result.entries_failed += 1;
        }
        let name = current.and_then(|i| self.items.get(i)).map_or("", String::as_str);
        if !success {
            log::warn!("engine reported {} for '{}'", result, name);
        }
        if let Some(progress) = state.progress.as_mut() {
            progress.on_entry_complete(name, success);
        }
        Ok(())
    }

    fn volume_size(&self, index: u32) -> EngineResult<u64> {
        log::trace!("volume size {} requested, splitting is not supported", index);
        Err(ResultCode::FalseCondition)
    }

    fn volume_stream(&self, index: u32) -> EngineResult<Rc<dyn OutStream>> {
        log::trace!("volume stream {} requested, splitting is not supported", index);
        Err(ResultCode::FalseCondition)
    }

    fn password(&self) -> EngineResult<Option<Password>> {
        Ok(self.password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::memory::MemoryInput;
    use crate::stream::shared_input;

    fn callback(items: &[&str]) -> UpdateCallback {
        let mut files = MemoryInput::new();
        files
            .add_file("a.txt", b"hello".to_vec())
            .add_dir("dir")
            .set_mtime("a.txt", 1_234_567)
            .set_mode("a.txt", 0o100644);
        UpdateCallback::new(
            Rc::new(InStreamAdapter::borrowed(shared_input(files))),
            items.iter().map(|s| s.to_string()).collect(),
            None,
            None,
        )
    }

    #[test]
    fn test_item_properties_from_input() {
        let cb = callback(&["a.txt", "dir"]);
        assert_eq!(cb.property(0, PropId::PATH).unwrap(), PropValue::String("a.txt".into()));
        assert_eq!(cb.property(0, PropId::SIZE).unwrap(), PropValue::UInt64(5));
        assert_eq!(cb.property(0, PropId::IS_ANTI).unwrap(), PropValue::Bool(false));
        assert_eq!(
            cb.property(0, PropId::MTIME).unwrap(),
            PropValue::Time(Timestamp::from_unix_u32(1_234_567))
        );
        assert_eq!(cb.property(0, PropId::POSIX_ATTRIB).unwrap(), PropValue::UInt32(0o100644));
        assert_eq!(cb.property(0, PropId::ATTRIB).unwrap(), PropValue::Empty);
        assert_eq!(cb.property(1, PropId::IS_DIR).unwrap(), PropValue::Bool(true));
        assert_eq!(cb.property(2, PropId::PATH).unwrap_err(), ResultCode::InvalidArgument);
    }

    #[test]
    fn test_stream_opened_and_always_closed() {
        let cb = callback(&["a.txt"]);
        let stream = cb.stream(0).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        cb.set_operation_result(OperationResult::DataError).unwrap();
        // Closed: the input no longer has a current file.
        assert!(stream.read(&mut buf).is_err());
        let (result, _) = cb.finish();
        assert_eq!(result.entries_failed, 1);
        assert_eq!(result.entries_written, 0);
    }

    #[test]
    fn test_missing_item_stream_fails() {
        let cb = callback(&["ghost"]);
        assert_eq!(cb.stream(0).err(), Some(ResultCode::Fail));
    }

    #[test]
    fn test_no_volume_splitting() {
        let cb = callback(&[]);
        assert_eq!(cb.volume_size(0).unwrap_err(), ResultCode::FalseCondition);
        assert_eq!(cb.volume_stream(0).err(), Some(ResultCode::FalseCondition));
    }

    #[test]
    fn test_item_info_new_data() {
        let cb = callback(&["a.txt"]);
        let info = cb.update_item_info(0).unwrap();
        assert!(info.new_data && info.new_properties);
        assert_eq!(info.index_in_archive, None);
        assert!(cb.password().unwrap().is_none());
    }
}
