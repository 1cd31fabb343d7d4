//! In-memory stream.

use std::io::SeekFrom;

use super::{FileIo, resolve_seek};
use crate::{Error, Result};

/// A stream over an owned byte buffer.
///
/// Useful for tests and for layering over data that has already been
/// extracted.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    data: Vec<u8>,
    offset: u64,
    open: bool,
}

impl MemoryFile {
    /// Creates a stream positioned at offset 0.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            offset: 0,
            open: true,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open { Ok(()) } else { Err(Error::NotOpen) }
    }
}

impl FileIo for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let start = match usize::try_from(self.offset) {
            Ok(start) if start < self.data.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.offset += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        self.offset = resolve_seek(self.offset, self.data.len() as u64, pos)?;
        Ok(self.offset)
    }

    fn offset(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.offset)
    }

    fn size(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.data.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.data = Vec::new();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
