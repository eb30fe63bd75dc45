//! In-memory capabilities.
//!
//! [`MemoryInput`] serves a set of named files from memory and clones cheaply,
//! so it works for single archives, multivolume sets and update sources alike.
//! [`MemoryOutput`] records written files, created directories, applied
//! metadata and the exact sequence of capability calls.

use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::rc::Rc;

use super::{InputStream, OutputStream, resolve_seek};

/// One named file or directory held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEntry {
    /// File contents; empty for directories.
    pub data: Vec<u8>,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// POSIX mode.
    pub mode: u32,
    /// Windows attribute bits.
    pub attributes: u32,
    /// Modification time in Unix seconds.
    pub mtime: u32,
}

/// In-memory [`InputStream`] over named files.
#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
    entries: Rc<BTreeMap<String, MemoryEntry>>,
    failures: Rc<BTreeMap<String, io::ErrorKind>>,
    current: Option<String>,
    pos: u64,
}

impl MemoryInput {
    /// Creates an empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pre-opened stream over `data`, registered under the empty
    /// name.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let mut input = Self::new();
        input.add_file("", data.into());
        input.current = Some(String::new());
        input
    }

    fn entry_mut(&mut self, name: &str) -> &mut MemoryEntry {
        Rc::make_mut(&mut self.entries)
            .entry(name.to_string())
            .or_default()
    }

    /// Adds (or replaces) a file.
    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) -> &mut Self {
        let name = name.into();
        *self.entry_mut(&name) = MemoryEntry {
            data,
            ..MemoryEntry::default()
        };
        self
    }

    /// Adds a directory.
    pub fn add_dir(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        *self.entry_mut(&name) = MemoryEntry {
            is_dir: true,
            ..MemoryEntry::default()
        };
        self
    }

    /// Sets the modification time reported for `name`.
    pub fn set_mtime(&mut self, name: &str, mtime: u32) -> &mut Self {
        self.entry_mut(name).mtime = mtime;
        self
    }

    /// Sets the POSIX mode reported for `name`.
    pub fn set_mode(&mut self, name: &str, mode: u32) -> &mut Self {
        self.entry_mut(name).mode = mode;
        self
    }

    /// Sets the attribute bits reported for `name`.
    pub fn set_attributes(&mut self, name: &str, attributes: u32) -> &mut Self {
        self.entry_mut(name).attributes = attributes;
        self
    }

    /// Makes `open(name)` fail with `kind`, regardless of whether the file
    /// exists.
    pub fn fail_open(&mut self, name: impl Into<String>, kind: io::ErrorKind) -> &mut Self {
        Rc::make_mut(&mut self.failures).insert(name.into(), kind);
        self
    }

    /// Looks up an entry.
    pub fn entry(&self, name: &str) -> Option<&MemoryEntry> {
        self.entries.get(name)
    }

    fn current_data(&self) -> io::Result<&[u8]> {
        self.current
            .as_deref()
            .and_then(|name| self.entries.get(name))
            .map(|e| e.data.as_slice())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no file is open"))
    }
}

impl InputStream for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.current_data()?;
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn open(&mut self, name: &str) -> io::Result<()> {
        if let Some(kind) = self.failures.get(name) {
            return Err(io::Error::new(*kind, format!("cannot open '{name}'")));
        }
        if !self.entries.contains_key(name) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{name}' does not exist"),
            ));
        }
        self.current = Some(name.to_string());
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.current = None;
        self.pos = 0;
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.current_data()?.len() as u64;
        self.pos = resolve_seek(pos, self.pos, len)?;
        Ok(self.pos)
    }

    fn size(&self, name: &str) -> u64 {
        self.entries.get(name).map_or(0, |e| e.data.len() as u64)
    }

    fn is_dir(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.is_dir)
    }

    fn mode(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |e| e.mode)
    }

    fn attributes(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |e| e.attributes)
    }

    fn mtime(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |e| e.mtime)
    }

    fn try_clone(&self) -> Option<Box<dyn InputStream>> {
        Some(Box::new(Self {
            entries: Rc::clone(&self.entries),
            failures: Rc::clone(&self.failures),
            current: None,
            pos: 0,
        }))
    }
}

/// A capability call observed by [`MemoryOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCall {
    /// `open(name)`.
    Open(String),
    /// `write` of the given length into the named file.
    Write(String, usize),
    /// `close()` of the named file.
    Close(String),
    /// `mkdir(name)`.
    Mkdir(String),
    /// `set_time(name, time)`.
    SetTime(String, u32),
    /// `set_attributes(name, attributes)`.
    SetAttributes(String, u32),
    /// `set_mode(name, mode)`.
    SetMode(String, u32),
}

/// In-memory [`OutputStream`] that records everything it receives.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    entries: BTreeMap<String, MemoryEntry>,
    current: Option<String>,
    pos: u64,
    calls: Vec<OutputCall>,
}

impl MemoryOutput {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a written file or created directory.
    pub fn entry(&self, name: &str) -> Option<&MemoryEntry> {
        self.entries.get(name)
    }

    /// Contents of a written file.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .get(name)
            .filter(|e| !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Names of everything written or created, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Capability calls in the order they were made.
    pub fn calls(&self) -> &[OutputCall] {
        &self.calls
    }

    /// Converts the recorded files into an input set, e.g. to read back an
    /// archive that was just written.
    pub fn into_input(self) -> MemoryInput {
        let mut input = MemoryInput::new();
        input.entries = Rc::new(self.entries);
        input
    }

    fn current_entry(&mut self) -> io::Result<(&str, &mut MemoryEntry)> {
        let name = self
            .current
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no file is open"))?;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no file is open"))?;
        Ok((name, entry))
    }

    fn existing(&mut self, name: &str) -> io::Result<&mut MemoryEntry> {
        self.entries.get_mut(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("'{name}' does not exist"))
        })
    }
}

impl OutputStream for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pos = self.pos;
        let (name, entry) = self.current_entry()?;
        let name = name.to_string();
        let start = usize::try_from(pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position too large"))?;
        let end = start + buf.len();
        if entry.data.len() < end {
            entry.data.resize(end, 0);
        }
        entry.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        self.calls.push(OutputCall::Write(name, buf.len()));
        Ok(buf.len())
    }

    fn open(&mut self, name: &str) -> io::Result<()> {
        self.entries.insert(name.to_string(), MemoryEntry::default());
        self.current = Some(name.to_string());
        self.pos = 0;
        self.calls.push(OutputCall::Open(name.to_string()));
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(name) = self.current.take() {
            self.calls.push(OutputCall::Close(name));
        }
        self.pos = 0;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = self.pos;
        let (_, entry) = self.current_entry()?;
        let len = entry.data.len() as u64;
        self.pos = resolve_seek(pos, current, len)?;
        Ok(self.pos)
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        let size = usize::try_from(size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "size too large"))?;
        let (_, entry) = self.current_entry()?;
        entry.data.resize(size, 0);
        Ok(())
    }

    fn mkdir(&mut self, name: &str) -> io::Result<()> {
        self.entries.insert(
            name.to_string(),
            MemoryEntry {
                is_dir: true,
                ..MemoryEntry::default()
            },
        );
        self.calls.push(OutputCall::Mkdir(name.to_string()));
        Ok(())
    }

    fn set_mode(&mut self, name: &str, mode: u32) -> io::Result<()> {
        self.existing(name)?.mode = mode;
        self.calls.push(OutputCall::SetMode(name.to_string(), mode));
        Ok(())
    }

    fn set_attributes(&mut self, name: &str, attributes: u32) -> io::Result<()> {
        self.existing(name)?.attributes = attributes;
        self.calls
            .push(OutputCall::SetAttributes(name.to_string(), attributes));
        Ok(())
    }

    fn set_time(&mut self, name: &str, time: u32) -> io::Result<()> {
        self.existing(name)?.mtime = time;
        self.calls.push(OutputCall::SetTime(name.to_string(), time));
        Ok(())
    }
}
