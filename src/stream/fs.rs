//! Filesystem capabilities rooted at a directory.
//!
//! Names handed to [`FsInput`] and [`FsOutput`] are resolved relative to the
//! root. Absolute names and `..` components are rejected, so an archive
//! cannot write outside the root during extraction.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;

use super::{InputStream, OutputStream};
use crate::property::attributes;
use crate::timestamp::Timestamp;

fn resolve(root: &Path, name: &str) -> io::Result<PathBuf> {
    let relative = Path::new(name);
    let mut path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsafe path '{name}'"),
                ));
            }
        }
    }
    Ok(path)
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no file is open")
}

/// Reads named files below a root directory.
#[derive(Debug)]
pub struct FsInput {
    root: PathBuf,
    file: Option<File>,
}

impl FsInput {
    /// Creates an input rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata(&self, name: &str) -> Option<fs::Metadata> {
        let path = resolve(&self.root, name).ok()?;
        fs::metadata(path).ok()
    }
}

impl InputStream for FsInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(not_open()),
        }
    }

    fn open(&mut self, name: &str) -> io::Result<()> {
        let path = resolve(&self.root, name)?;
        // Directories are "opened" as empty streams so updates can list them.
        if path.is_dir() {
            self.file = None;
            return Ok(());
        }
        self.file = Some(File::open(path)?);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.file.as_mut() {
            Some(file) => file.seek(pos),
            None => Err(not_open()),
        }
    }

    fn size(&self, name: &str) -> u64 {
        self.metadata(name)
            .filter(|m| m.is_file())
            .map_or(0, |m| m.len())
    }

    fn is_dir(&self, name: &str) -> bool {
        self.metadata(name).is_some_and(|m| m.is_dir())
    }

    fn mode(&self, name: &str) -> u32 {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            self.metadata(name).map_or(0, |m| m.permissions().mode())
        }
        #[cfg(not(unix))]
        {
            let _ = name;
            0
        }
    }

    fn attributes(&self, name: &str) -> u32 {
        let Some(meta) = self.metadata(name) else {
            return 0;
        };
        let mut attr = if meta.is_dir() {
            attributes::DIRECTORY
        } else {
            attributes::ARCHIVE
        };
        if meta.permissions().readonly() {
            attr |= attributes::READONLY;
        }
        attr
    }

    fn mtime(&self, name: &str) -> u32 {
        self.metadata(name)
            .and_then(|m| m.modified().ok())
            .and_then(Timestamp::from_system_time)
            .and_then(|ts| ts.to_unix_u32())
            .unwrap_or(0)
    }

    fn try_clone(&self) -> Option<Box<dyn InputStream>> {
        Some(Box::new(Self::new(self.root.clone())))
    }
}

/// Writes named files below a root directory.
#[derive(Debug)]
pub struct FsOutput {
    root: PathBuf,
    file: Option<File>,
}

impl FsOutput {
    /// Creates an output rooted at `root`. The root is created on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(not_open)
    }
}

impl OutputStream for FsOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn open(&mut self, name: &str) -> io::Result<()> {
        let path = resolve(&self.root, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        self.file()?.set_len(size)
    }

    fn mkdir(&mut self, name: &str) -> io::Result<()> {
        fs::create_dir_all(resolve(&self.root, name)?)
    }

    fn set_mode(&mut self, name: &str, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = resolve(&self.root, name)?;
            fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        }
        #[cfg(not(unix))]
        {
            let _ = (name, mode);
            Err(super::unsupported("set_mode"))
        }
    }

    fn set_attributes(&mut self, name: &str, attr: u32) -> io::Result<()> {
        if attr & attributes::READONLY == 0 {
            return Ok(());
        }
        let path = resolve(&self.root, name)?;
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(path, permissions)
    }

    fn set_time(&mut self, name: &str, time: u32) -> io::Result<()> {
        let path = resolve(&self.root, name)?;
        filetime::set_file_mtime(path, FileTime::from_unix_time(i64::from(time), 0))
    }
}
