use super::path::NormalizedPath;
use super::Shared;
use crate::error::Result;
use crate::fs::types::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Streaming handle onto an in-memory file.
///
/// The handle only keeps a cursor. Reads see the live content and every
/// write lands in the tree immediately, so changes made through other
/// handles or through the file system in between are never overwritten.
/// Append-mode writes always go to the current end of the file.
pub struct MemoryFile {
    shared: Arc<Shared>,
    path: NormalizedPath,
    position: u64,
    readable: bool,
    writable: bool,
    append: bool,
}

impl MemoryFile {
    pub(crate) fn new(
        shared: Arc<Shared>,
        path: NormalizedPath,
        options: &OpenOptions,
    ) -> Result<Self> {
        let writable = options.is_writable();
        let position = if options.append {
            shared.file_len(&path)?
        } else {
            0
        };
        Ok(Self {
            shared,
            path,
            position,
            readable: options.read || !writable,
            writable,
            append: options.append,
        })
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current length of the underlying file.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.shared.file_len(&self.path)?)
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.check_writable()?;
        self.shared.set_len(&self.path, len)?;
        Ok(())
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} was not opened for writing", self.path),
            ))
        }
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.readable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} was not opened for reading", self.path),
            ));
        }
        let n = self.shared.read_at(&self.path, self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_writable()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let offset = if self.append { None } else { Some(self.position) };
        self.position = self.shared.write_at(&self.path, offset, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.len()?, delta),
        };
        let target = base.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.position = target;
        Ok(target)
    }
}

impl std::fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFile")
            .field("path", &self.path.as_str())
            .field("position", &self.position)
            .field("append", &self.append)
            .finish()
    }
}
