//! Shared test utilities for integration tests.
//!
//! Provides a scripted in-process engine with a handful of toy container
//! formats, so sessions can be driven end to end without a native library.
//!
//! Note: `#![allow(dead_code)]` is needed because each integration test file
//! is compiled as a separate crate. Helpers used by only some test files would
//! otherwise trigger dead code warnings in others.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io::SeekFrom;
use std::rc::Rc;

use sevenlink::engine::{
    ArchiveExtractCallback, ArchiveOpenCallback, ArchiveUpdateCallback, AskMode, Engine,
    EngineResult, HandlerProperty, InArchive, InStream, OperationResult, OutArchive, OutStream,
    Volume,
};
use sevenlink::stream::memory::{MemoryInput, MemoryOutput};
use sevenlink::stream::{SharedInput, SharedOutput};
use sevenlink::{FormatId, Library, PropId, PropType, PropValue, PropertyInfo, ResultCode, Timestamp};

/// Events recorded by the toy engine: `open:<format>` and `close:<format>`.
pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Options accepted by the toy writer through `set_property`.
pub type OptionLog = Rc<RefCell<Vec<(String, PropValue)>>>;

pub const STORE_MAGIC: &[u8] = b"STOR";
pub const WRAP_MAGIC: &[u8] = b"WRAP";
pub const TAIL_MAGIC: &[u8] = b"TAIL";
pub const SPLIT_MAGIC: &[u8] = b"VOLS";
pub const LATE_MAGIC: &[u8] = b"LATE";
pub const LATE_OFFSET: u32 = 4000;
pub const TRAILER_LEN: usize = 512;

const HEADER_ENCRYPTED: u32 = 0x8000_0000;
const FLAG_DIR: u8 = 1;
const FLAG_ENCRYPTED: u8 = 2;

/// The toy formats, in engine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Named items with metadata and checksums; writable.
    Store,
    /// Envelope holding one embedded stream, optionally flagged as the main
    /// subfile.
    Wrap,
    /// Signature in the last 512 bytes; one item with everything before it.
    Tail,
    /// No signature; the whole stream is one unnamed item. Writable.
    Raw,
    /// Multivolume: `name.001`, `name.002`, ... joined into one item.
    Split,
    /// Alternate signatures only; no items.
    Alt,
    /// Signature far past the primary detection window; no items.
    Late,
}

pub const KINDS: [Kind; 7] = [
    Kind::Store,
    Kind::Wrap,
    Kind::Tail,
    Kind::Raw,
    Kind::Split,
    Kind::Alt,
    Kind::Late,
];

impl Kind {
    pub fn index(self) -> usize {
        KINDS.iter().position(|k| *k == self).unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Store => "7z",
            Kind::Wrap => "wrap",
            Kind::Tail => "dmg",
            Kind::Raw => "raw",
            Kind::Split => "split",
            Kind::Alt => "alt",
            Kind::Late => "late",
        }
    }

    fn extensions(self) -> &'static str {
        match self {
            Kind::Store => "7z sto",
            Kind::Wrap => "wrp",
            Kind::Tail => "dmg",
            Kind::Raw => "raw bin",
            Kind::Split => "001",
            Kind::Alt => "alt",
            Kind::Late => "late",
        }
    }

    fn format_byte(self) -> u8 {
        match self {
            Kind::Store => 0x07,
            Kind::Wrap => 0x10,
            Kind::Tail => 0xE4,
            Kind::Raw => 0x20,
            Kind::Split => 0x30,
            Kind::Alt => 0x40,
            Kind::Late => 0x50,
        }
    }

    fn from_format_byte(byte: u8) -> Option<Self> {
        KINDS.iter().copied().find(|k| k.format_byte() == byte)
    }

    fn signature(self) -> Option<&'static [u8]> {
        match self {
            Kind::Store => Some(STORE_MAGIC),
            Kind::Wrap => Some(WRAP_MAGIC),
            Kind::Tail => Some(TAIL_MAGIC),
            Kind::Split => Some(SPLIT_MAGIC),
            Kind::Late => Some(LATE_MAGIC),
            Kind::Raw | Kind::Alt => None,
        }
    }

    fn updatable(self) -> bool {
        matches!(self, Kind::Store | Kind::Raw)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// In-process engine over the toy formats.
#[derive(Default)]
pub struct ToyEngine {
    pub events: EventLog,
    pub options: OptionLog,
}

impl ToyEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for ToyEngine {
    fn version(&self) -> u32 {
        (24 << 16) | 9
    }

    fn format_count(&self) -> EngineResult<u32> {
        Ok(KINDS.len() as u32)
    }

    fn handler_property(&self, index: u32, property: HandlerProperty) -> EngineResult<PropValue> {
        let kind = *KINDS.get(index as usize).ok_or(ResultCode::InvalidArgument)?;
        let value = match property {
            HandlerProperty::Name => PropValue::String(kind.name().to_string()),
            HandlerProperty::ClassId => {
                PropValue::Bytes(FormatId::stock(kind.format_byte()).as_bytes().to_vec())
            }
            HandlerProperty::Extension => PropValue::String(kind.extensions().to_string()),
            HandlerProperty::Update => PropValue::Bool(kind.updatable()),
            HandlerProperty::Signature => match kind.signature() {
                Some(sig) => PropValue::Bytes(sig.to_vec()),
                None => PropValue::Empty,
            },
            HandlerProperty::MultiSignature if kind == Kind::Alt => {
                PropValue::Bytes(b"\x03AL1\x03AL2".to_vec())
            }
            HandlerProperty::SignatureOffset if kind == Kind::Late => PropValue::UInt32(LATE_OFFSET),
            _ => PropValue::Empty,
        };
        Ok(value)
    }

    fn create_in_archive(&self, format: &FormatId) -> EngineResult<Rc<dyn InArchive>> {
        let kind = Kind::from_format_byte(format.format_byte()).ok_or(ResultCode::NoInterface)?;
        Ok(Rc::new(ToyInArchive {
            kind,
            events: Rc::clone(&self.events),
            parsed: RefCell::new(None),
        }))
    }

    fn create_out_archive(&self, format: &FormatId) -> EngineResult<Rc<dyn OutArchive>> {
        match Kind::from_format_byte(format.format_byte()) {
            Some(Kind::Store) => Ok(Rc::new(StoreWriter {
                options: Rc::clone(&self.options),
            })),
            Some(Kind::Raw) => Ok(Rc::new(RawWriter)),
            Some(_) => Err(ResultCode::NotImplemented),
            None => Err(ResultCode::NoInterface),
        }
    }
}

// ---------------------------------------------------------------------------
// Items and the store encoding
// ---------------------------------------------------------------------------

/// One item of a toy container, as stored (data may be enciphered).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToyItem {
    pub path: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
    pub mtime: u32,
    pub attributes: u32,
    pub mode: u32,
    pub crc: u32,
    pub encrypted: bool,
}

impl ToyItem {
    pub fn file(path: &str, data: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            data: data.to_vec(),
            crc: crc32fast::hash(data),
            ..Self::default()
        }
    }

    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_string(),
            is_dir: true,
            ..Self::default()
        }
    }
}

/// Key byte derived from a password by the toy cipher.
pub fn cipher_key(password: &str) -> u8 {
    password
        .bytes()
        .fold(0x5Au8, |k, b| k.wrapping_mul(31).wrapping_add(b))
        | 1
}

fn xor(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|b| b ^ key).collect()
}

/// Builds store archives for tests.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    items: Vec<ToyItem>,
    header_password: Option<String>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.items.push(ToyItem::file(path, data));
        self
    }

    pub fn file_with(mut self, path: &str, data: &[u8], mtime: u32, attributes: u32, mode: u32) -> Self {
        self.items.push(ToyItem {
            mtime,
            attributes,
            mode,
            ..ToyItem::file(path, data)
        });
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.items.push(ToyItem::dir(path));
        self
    }

    pub fn dir_with(mut self, path: &str, mtime: u32, mode: u32) -> Self {
        self.items.push(ToyItem {
            mtime,
            mode,
            ..ToyItem::dir(path)
        });
        self
    }

    /// A file whose stored checksum does not match its data.
    pub fn corrupt_file(mut self, path: &str, data: &[u8]) -> Self {
        let mut item = ToyItem::file(path, data);
        item.crc ^= 0xFFFF_FFFF;
        self.items.push(item);
        self
    }

    pub fn encrypted_file(mut self, path: &str, data: &[u8], password: &str) -> Self {
        let mut item = ToyItem::file(path, data);
        item.data = xor(data, cipher_key(password));
        item.encrypted = true;
        self.items.push(item);
        self
    }

    /// Requires `password` before the item list can be read.
    pub fn header_password(mut self, password: &str) -> Self {
        self.header_password = Some(password.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        encode_store(&self.items, self.header_password.as_deref().map(cipher_key))
    }
}

pub fn encode_store(items: &[ToyItem], header_key: Option<u8>) -> Vec<u8> {
    let mut out = STORE_MAGIC.to_vec();
    let mut count = items.len() as u32;
    if header_key.is_some() {
        count |= HEADER_ENCRYPTED;
    }
    out.extend_from_slice(&count.to_le_bytes());
    if let Some(key) = header_key {
        out.push(key);
    }
    for item in items {
        out.extend_from_slice(&(item.path.len() as u16).to_le_bytes());
        out.extend_from_slice(item.path.as_bytes());
        let mut flags = 0;
        if item.is_dir {
            flags |= FLAG_DIR;
        }
        if item.encrypted {
            flags |= FLAG_ENCRYPTED;
        }
        out.push(flags);
        out.extend_from_slice(&item.mtime.to_le_bytes());
        out.extend_from_slice(&item.attributes.to_le_bytes());
        out.extend_from_slice(&item.mode.to_le_bytes());
        out.extend_from_slice(&item.crc.to_le_bytes());
        out.extend_from_slice(&(item.data.len() as u64).to_le_bytes());
        out.extend_from_slice(&item.data);
    }
    out
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(ResultCode::Fail)?;
        let bytes = self.data.get(self.pos..end).ok_or(ResultCode::Fail)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> EngineResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> EngineResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> EngineResult<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    fn string(&mut self) -> EngineResult<String> {
        let len = self.u16()? as usize;
        String::from_utf8(self.take(len)?.to_vec()).map_err(|_| ResultCode::Fail)
    }
}

/// Builds an envelope around `payload`.
pub fn wrap(name: &str, payload: &[u8], main_subfile: Option<u32>) -> Vec<u8> {
    let mut out = WRAP_MAGIC.to_vec();
    match main_subfile {
        Some(index) => {
            out.push(1);
            out.extend_from_slice(&index.to_le_bytes());
        }
        None => out.push(0),
    }
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Builds an envelope whose main-subfile property is broken: the query fails
/// with `Fail`, or with `mistyped` it answers a string.
pub fn wrap_broken(name: &str, payload: &[u8], mistyped: bool) -> Vec<u8> {
    let mut out = WRAP_MAGIC.to_vec();
    out.push(if mistyped { 3 } else { 2 });
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Appends a 512-byte trailer to `payload`.
pub fn tail(payload: &[u8]) -> Vec<u8> {
    let mut out = payload.to_vec();
    let mut trailer = vec![0u8; TRAILER_LEN];
    trailer[..TAIL_MAGIC.len()].copy_from_slice(TAIL_MAGIC);
    out.extend_from_slice(&trailer);
    out
}

/// One volume of a split set.
pub fn volume(chunk: &[u8]) -> Vec<u8> {
    let mut out = SPLIT_MAGIC.to_vec();
    out.extend_from_slice(chunk);
    out
}

/// A stream carrying the late signature at its offset.
pub fn late() -> Vec<u8> {
    let mut out = vec![0u8; LATE_OFFSET as usize];
    out.extend_from_slice(LATE_MAGIC);
    out
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn read_all(stream: &dyn InStream) -> EngineResult<Vec<u8>> {
    stream.seek(SeekFrom::Start(0))?;
    read_rest(stream)
}

fn read_rest(stream: &dyn InStream) -> EngineResult<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Ok(data);
        }
        data.extend_from_slice(&buf[..n]);
    }
}

fn write_all(stream: &dyn OutStream, mut data: &[u8]) -> EngineResult<()> {
    while !data.is_empty() {
        // Small chunks, so sinks see several writes.
        let n = stream.write(&data[..data.len().min(7)])?;
        if n == 0 {
            return Err(ResultCode::Fail);
        }
        data = &data[n..];
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
enum MainSubfile {
    #[default]
    Absent,
    Index(u32),
    QueryFails,
    Mistyped,
}

#[derive(Debug, Default)]
struct Parsed {
    items: Vec<ToyItem>,
    main_subfile: MainSubfile,
    physical_size: u64,
    volumes: u32,
}

/// Reader object shared by all toy formats.
pub struct ToyInArchive {
    kind: Kind,
    events: EventLog,
    parsed: RefCell<Option<Parsed>>,
}

impl ToyInArchive {
    fn log(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    fn with<R>(&self, f: impl FnOnce(&Parsed) -> EngineResult<R>) -> EngineResult<R> {
        let parsed = self.parsed.borrow();
        f(parsed.as_ref().ok_or(ResultCode::Fail)?)
    }

    fn parse(&self, stream: &dyn InStream, callback: &dyn ArchiveOpenCallback) -> EngineResult<Parsed> {
        match self.kind {
            Kind::Store => parse_store(&read_all(stream)?, callback),
            Kind::Wrap => parse_wrap(&read_all(stream)?),
            Kind::Tail => parse_tail(stream),
            Kind::Raw => {
                let data = read_all(stream)?;
                Ok(Parsed {
                    physical_size: data.len() as u64,
                    items: vec![ToyItem::file("", &data)],
                    ..Parsed::default()
                })
            }
            Kind::Split => parse_split(&read_all(stream)?, callback),
            Kind::Alt => {
                let data = read_all(stream)?;
                if !(data.starts_with(b"AL1") || data.starts_with(b"AL2")) {
                    return Err(ResultCode::FalseCondition);
                }
                Ok(Parsed::default())
            }
            Kind::Late => {
                let data = read_all(stream)?;
                let start = LATE_OFFSET as usize;
                if data.get(start..start + LATE_MAGIC.len()) != Some(LATE_MAGIC) {
                    return Err(ResultCode::FalseCondition);
                }
                Ok(Parsed::default())
            }
        }
    }
}

fn parse_store(data: &[u8], callback: &dyn ArchiveOpenCallback) -> EngineResult<Parsed> {
    if !data.starts_with(STORE_MAGIC) {
        return Err(ResultCode::FalseCondition);
    }
    let mut cur = Cursor {
        data,
        pos: STORE_MAGIC.len(),
    };
    let raw_count = cur.u32()?;
    if raw_count & HEADER_ENCRYPTED != 0 {
        let check = cur.u8()?;
        // No password, or the wrong one: not readable as this format.
        let password = match callback.password() {
            Ok(password) => password,
            Err(_) => return Err(ResultCode::FalseCondition),
        };
        if cipher_key(password.as_str()) != check {
            return Err(ResultCode::FalseCondition);
        }
    }
    let count = raw_count & !HEADER_ENCRYPTED;
    callback.set_total(Some(u64::from(count)), Some(data.len() as u64))?;

    let mut items = Vec::new();
    for _ in 0..count {
        let path = cur.string()?;
        let flags = cur.u8()?;
        let mtime = cur.u32()?;
        let attributes = cur.u32()?;
        let mode = cur.u32()?;
        let crc = cur.u32()?;
        let size = usize::try_from(cur.u64()?).map_err(|_| ResultCode::Fail)?;
        let data = cur.take(size)?.to_vec();
        items.push(ToyItem {
            path,
            data,
            is_dir: flags & FLAG_DIR != 0,
            mtime,
            attributes,
            mode,
            crc,
            encrypted: flags & FLAG_ENCRYPTED != 0,
        });
        callback.set_completed(Some(items.len() as u64), Some(cur.pos as u64))?;
    }
    Ok(Parsed {
        items,
        physical_size: data.len() as u64,
        ..Parsed::default()
    })
}

fn parse_wrap(data: &[u8]) -> EngineResult<Parsed> {
    if !data.starts_with(WRAP_MAGIC) {
        return Err(ResultCode::FalseCondition);
    }
    let mut cur = Cursor {
        data,
        pos: WRAP_MAGIC.len(),
    };
    let main_subfile = match cur.u8()? {
        0 => MainSubfile::Absent,
        2 => MainSubfile::QueryFails,
        3 => MainSubfile::Mistyped,
        _ => MainSubfile::Index(cur.u32()?),
    };
    let name = cur.string()?;
    let payload = &data[cur.pos..];
    Ok(Parsed {
        items: vec![ToyItem::file(&name, payload)],
        main_subfile,
        physical_size: data.len() as u64,
        volumes: 0,
    })
}

fn parse_tail(stream: &dyn InStream) -> EngineResult<Parsed> {
    let len = stream.seek(SeekFrom::End(0))?;
    let len = usize::try_from(len).map_err(|_| ResultCode::Fail)?;
    if len < TRAILER_LEN {
        return Err(ResultCode::FalseCondition);
    }
    let data = read_all(stream)?;
    let (payload, trailer) = data.split_at(len - TRAILER_LEN);
    if !trailer.starts_with(TAIL_MAGIC) {
        return Err(ResultCode::FalseCondition);
    }
    Ok(Parsed {
        items: vec![ToyItem::file("payload", payload)],
        physical_size: len as u64,
        ..Parsed::default()
    })
}

fn parse_split(first: &[u8], callback: &dyn ArchiveOpenCallback) -> EngineResult<Parsed> {
    if !first.starts_with(SPLIT_MAGIC) {
        return Err(ResultCode::FalseCondition);
    }
    let name = callback
        .property(PropId::NAME)?
        .into_string(PropId::NAME)
        .ok()
        .flatten()
        .unwrap_or_default();
    let base = name.strip_suffix(".001").unwrap_or(&name).to_string();

    let mut joined = first[SPLIT_MAGIC.len()..].to_vec();
    let mut volumes = 1;
    loop {
        let next = format!("{}.{:03}", base, volumes + 1);
        match callback.volume_stream(&next)? {
            Volume::Stream(stream) => {
                let data = read_rest(stream.as_ref())?;
                if !data.starts_with(SPLIT_MAGIC) {
                    return Err(ResultCode::Fail);
                }
                joined.extend_from_slice(&data[SPLIT_MAGIC.len()..]);
                volumes += 1;
            }
            Volume::NoMoreVolumes => break,
        }
    }
    let file = base.rsplit('/').next().unwrap_or(&base).to_string();
    Ok(Parsed {
        physical_size: joined.len() as u64,
        items: vec![ToyItem::file(&file, &joined)],
        main_subfile: MainSubfile::Absent,
        volumes,
    })
}

impl InArchive for ToyInArchive {
    fn open(
        &self,
        stream: Rc<dyn InStream>,
        _max_check_start: u64,
        callback: Rc<dyn ArchiveOpenCallback>,
    ) -> EngineResult<()> {
        let parsed = self.parse(stream.as_ref(), callback.as_ref())?;
        self.log(format!("open:{}", self.kind.name()));
        *self.parsed.borrow_mut() = Some(parsed);
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        self.log(format!("close:{}", self.kind.name()));
        self.parsed.borrow_mut().take();
        Ok(())
    }

    fn item_count(&self) -> EngineResult<u32> {
        self.with(|p| Ok(p.items.len() as u32))
    }

    fn property(&self, index: u32, id: PropId) -> EngineResult<PropValue> {
        self.with(|p| {
            let item = p.items.get(index as usize).ok_or(ResultCode::InvalidArgument)?;
            let non_zero = |v: u32| if v == 0 { PropValue::Empty } else { PropValue::UInt32(v) };
            Ok(match id {
                PropId::PATH if item.path.is_empty() => PropValue::Empty,
                PropId::PATH => PropValue::String(item.path.clone()),
                PropId::IS_DIR => PropValue::Bool(item.is_dir),
                PropId::SIZE => PropValue::UInt64(item.data.len() as u64),
                PropId::PACK_SIZE => PropValue::UInt32(item.data.len() as u32),
                PropId::MTIME if item.mtime != 0 => PropValue::Time(Timestamp::from_unix_u32(item.mtime)),
                PropId::ATTRIB => non_zero(item.attributes),
                PropId::POSIX_ATTRIB => non_zero(item.mode),
                PropId::CRC if !item.is_dir => PropValue::UInt32(item.crc),
                PropId::ENCRYPTED => PropValue::Bool(item.encrypted),
                _ => PropValue::Empty,
            })
        })
    }

    fn extract(
        &self,
        indices: Option<&[u32]>,
        test: bool,
        callback: Rc<dyn ArchiveExtractCallback>,
    ) -> EngineResult<()> {
        let items = self.with(|p| Ok(p.items.clone()))?;
        let indices: Vec<u32> = match indices {
            Some(list) => list.to_vec(),
            None => (0..items.len() as u32).collect(),
        };
        let total = indices
            .iter()
            .filter_map(|&i| items.get(i as usize))
            .map(|item| item.data.len() as u64)
            .sum();
        callback.set_total(total)?;

        let mode = if test { AskMode::Test } else { AskMode::Extract };
        let mut completed = 0;
        for index in indices {
            let item = items.get(index as usize).ok_or(ResultCode::InvalidArgument)?;
            let out = callback.get_stream(index, mode)?;
            callback.prepare_operation(mode)?;

            let (data, mut result) = if item.encrypted {
                match callback.password() {
                    Ok(password) => (xor(&item.data, cipher_key(password.as_str())), OperationResult::Ok),
                    Err(_) => (Vec::new(), OperationResult::WrongPassword),
                }
            } else {
                (item.data.clone(), OperationResult::Ok)
            };
            if result == OperationResult::Ok && !item.is_dir && crc32fast::hash(&data) != item.crc {
                result = if item.encrypted {
                    OperationResult::WrongPassword
                } else {
                    OperationResult::CrcError
                };
            }
            if let (Some(out), OperationResult::Ok) = (out, result) {
                write_all(out.as_ref(), &data)?;
            }

            callback.set_operation_result(result)?;
            completed += item.data.len() as u64;
            callback.set_completed(Some(completed))?;
        }
        Ok(())
    }

    fn archive_property(&self, id: PropId) -> EngineResult<PropValue> {
        self.with(|p| {
            Ok(match id {
                PropId::MAIN_SUBFILE => match p.main_subfile {
                    MainSubfile::Absent => PropValue::Empty,
                    MainSubfile::Index(index) => PropValue::UInt32(index),
                    MainSubfile::QueryFails => return Err(ResultCode::Fail),
                    MainSubfile::Mistyped => PropValue::String("first".to_string()),
                },
                PropId::PHY_SIZE => PropValue::UInt64(p.physical_size),
                PropId::NUM_VOLUMES if p.volumes > 0 => PropValue::UInt32(p.volumes),
                _ => PropValue::Empty,
            })
        })
    }

    fn property_count(&self) -> EngineResult<u32> {
        Ok(ITEM_PROPERTIES.len() as u32)
    }

    fn property_info(&self, index: u32) -> EngineResult<PropertyInfo> {
        let (id, prop_type) = *ITEM_PROPERTIES
            .get(index as usize)
            .ok_or(ResultCode::InvalidArgument)?;
        Ok(PropertyInfo {
            name: None,
            id,
            prop_type,
        })
    }

    fn archive_property_count(&self) -> EngineResult<u32> {
        Ok(1)
    }

    fn archive_property_info(&self, index: u32) -> EngineResult<PropertyInfo> {
        match index {
            0 => Ok(PropertyInfo {
                name: Some("Physical Size".to_string()),
                id: PropId::PHY_SIZE,
                prop_type: PropType::UInt64,
            }),
            _ => Err(ResultCode::InvalidArgument),
        }
    }

    fn sub_stream(&self, index: u32) -> EngineResult<Rc<dyn InStream>> {
        if self.kind != Kind::Wrap {
            return Err(ResultCode::NoInterface);
        }
        let data = self.with(|p| {
            p.items
                .get(index as usize)
                .map(|item| item.data.clone())
                .ok_or(ResultCode::InvalidArgument)
        })?;
        Ok(Rc::new(BytesStream::new(data)))
    }
}

const ITEM_PROPERTIES: [(PropId, PropType); 4] = [
    (PropId::PATH, PropType::String),
    (PropId::SIZE, PropType::UInt64),
    (PropId::MTIME, PropType::Time),
    (PropId::CRC, PropType::UInt32),
];

/// Engine-side stream over owned bytes.
pub struct BytesStream {
    data: Vec<u8>,
    pos: Cell<u64>,
}

impl BytesStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: Cell::new(0),
        }
    }
}

impl InStream for BytesStream {
    fn read(&self, buf: &mut [u8]) -> EngineResult<usize> {
        let start = (self.pos.get() as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos.set((start + n) as u64);
        Ok(n)
    }

    fn seek(&self, pos: SeekFrom) -> EngineResult<u64> {
        let len = self.data.len() as u64;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.get().checked_add_signed(delta),
        };
        let target = target.ok_or(ResultCode::InvalidArgument)?;
        self.pos.set(target);
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn item_from_callback(callback: &dyn ArchiveUpdateCallback, index: u32) -> EngineResult<ToyItem> {
    let prop = |id| callback.property(index, id);
    let path = match prop(PropId::PATH)? {
        PropValue::String(s) => s,
        _ => String::new(),
    };
    let is_dir = matches!(prop(PropId::IS_DIR)?, PropValue::Bool(true));
    let mtime = match prop(PropId::MTIME)? {
        PropValue::Time(t) => t.to_unix_u32().unwrap_or(0),
        _ => 0,
    };
    let u32_of = |value: PropValue| match value {
        PropValue::UInt32(v) => v,
        _ => 0,
    };
    Ok(ToyItem {
        path,
        is_dir,
        mtime,
        attributes: u32_of(prop(PropId::ATTRIB)?),
        mode: u32_of(prop(PropId::POSIX_ATTRIB)?),
        ..ToyItem::default()
    })
}

fn collect_items(callback: &dyn ArchiveUpdateCallback, count: u32) -> EngineResult<Vec<ToyItem>> {
    let mut total = 0;
    for index in 0..count {
        let info = callback.update_item_info(index)?;
        if !info.new_data {
            return Err(ResultCode::NotImplemented);
        }
        if let PropValue::UInt64(size) = callback.property(index, PropId::SIZE)? {
            total += size;
        }
    }
    callback.set_total(total)?;

    let mut items = Vec::new();
    let mut completed = 0;
    for index in 0..count {
        let mut item = item_from_callback(callback, index)?;
        if !item.is_dir {
            let stream = callback.stream(index)?;
            let data = read_rest(stream.as_ref());
            let result = if data.is_ok() {
                OperationResult::Ok
            } else {
                OperationResult::DataError
            };
            callback.set_operation_result(result)?;
            item.data = data?;
            item.crc = crc32fast::hash(&item.data);
            completed += item.data.len() as u64;
            callback.set_completed(Some(completed))?;
        }
        items.push(item);
    }
    Ok(items)
}

/// Writer for the store format.
pub struct StoreWriter {
    options: OptionLog,
}

impl OutArchive for StoreWriter {
    fn update_items(
        &self,
        stream: Rc<dyn OutStream>,
        count: u32,
        callback: Rc<dyn ArchiveUpdateCallback>,
    ) -> EngineResult<()> {
        // Single-volume output only.
        match callback.volume_size(0) {
            Err(ResultCode::FalseCondition) => {}
            _ => return Err(ResultCode::NotImplemented),
        }
        let key = callback.password()?.map(|p| cipher_key(p.as_str()));
        let mut items = collect_items(callback.as_ref(), count)?;
        if let Some(key) = key {
            for item in items.iter_mut().filter(|i| !i.is_dir) {
                item.data = xor(&item.data, key);
                item.encrypted = true;
            }
        }
        write_all(stream.as_ref(), &encode_store(&items, None))
    }

    fn set_property(&self, name: &str, value: &PropValue) -> EngineResult<()> {
        match (name, value) {
            ("x", PropValue::UInt32(level)) if *level <= 9 => {}
            ("s", PropValue::Bool(_)) | ("mt", PropValue::UInt32(_)) => {}
            _ => return Err(ResultCode::InvalidArgument),
        }
        self.options.borrow_mut().push((name.to_string(), value.clone()));
        Ok(())
    }
}

/// Writer for the raw format: the first item's bytes, verbatim.
pub struct RawWriter;

impl OutArchive for RawWriter {
    fn update_items(
        &self,
        stream: Rc<dyn OutStream>,
        count: u32,
        callback: Rc<dyn ArchiveUpdateCallback>,
    ) -> EngineResult<()> {
        let items = collect_items(callback.as_ref(), count)?;
        let data = items.first().map(|i| i.data.clone()).unwrap_or_default();
        write_all(stream.as_ref(), &data)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A library over a fresh toy engine, with the engine's logs.
pub fn toy_library() -> (Library, EventLog, OptionLog) {
    let engine = ToyEngine::new();
    let events = Rc::clone(&engine.events);
    let options = Rc::clone(&engine.options);
    (Library::new(Rc::new(engine)), events, options)
}

/// A library over a fresh toy engine.
pub fn library() -> Library {
    toy_library().0
}

/// An input set holding one file.
pub fn input_with(name: &str, data: Vec<u8>) -> SharedInput {
    let mut input = MemoryInput::new();
    input.add_file(name, data);
    Rc::new(RefCell::new(input))
}

/// A recording sink, plus the same sink as a session handle.
pub fn memory_output() -> (Rc<RefCell<MemoryOutput>>, SharedOutput) {
    let output = Rc::new(RefCell::new(MemoryOutput::new()));
    let shared: SharedOutput = output.clone();
    (output, shared)
}

/// Events of one kind (`"open"` or `"close"`), without the prefix.
pub fn events(log: &EventLog, kind: &str) -> Vec<String> {
    let prefix = format!("{kind}:");
    log.borrow()
        .iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}
