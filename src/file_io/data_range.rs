//! A window onto a parent stream.

use std::io::SeekFrom;

use super::{FileIo, FileObject, resolve_seek};
use crate::path::{PathSpec, PathSpecKind};
use crate::resolver::{Context, Resolver};
use crate::{Error, Result};

/// Exposes bytes `[range_offset, range_offset + range_size)` of a parent
/// stream as a stream of its own.
///
/// The window is clamped to the parent's size when reading, so a range
/// that extends past the parent simply ends early.
#[derive(Debug)]
pub struct DataRange {
    parent: Option<FileObject>,
    range_offset: u64,
    range_size: u64,
    offset: u64,
}

impl DataRange {
    /// Opens a data range layer, resolving its parent through `context`.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        let PathSpecKind::DataRange {
            range_offset,
            range_size,
        } = *path_spec.kind()
        else {
            return Err(Error::invalid_spec(format!(
                "expected a DATA_RANGE path specification, got {}",
                path_spec.type_indicator()
            )));
        };
        let parent_spec = path_spec
            .parent()
            .ok_or_else(|| Error::invalid_spec("DATA_RANGE path specification requires a parent"))?;
        let parent = Resolver::open_file_object(parent_spec, context)?;
        Ok(Self::with_parent(parent, range_offset, range_size))
    }

    /// Builds a window over a caller-supplied stream.
    ///
    /// The window keeps a borrowed view; closing it leaves `parent` open.
    pub fn from_file_object(parent: &FileObject, range_offset: u64, range_size: u64) -> Result<Self> {
        if range_offset.checked_add(range_size).is_none() {
            return Err(Error::invalid_spec(format!(
                "data range {}+{} overflows",
                range_offset, range_size
            )));
        }
        Ok(Self::with_parent(parent.share()?, range_offset, range_size))
    }

    pub(crate) fn with_parent(parent: FileObject, range_offset: u64, range_size: u64) -> Self {
        Self {
            parent: Some(parent),
            range_offset,
            range_size,
            offset: 0,
        }
    }

    fn parent(&self) -> Result<&FileObject> {
        self.parent.as_ref().ok_or(Error::NotOpen)
    }
}

impl FileIo for DataRange {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let parent = self.parent()?;
        if self.offset >= self.range_size {
            return Ok(0);
        }
        let available = self.range_size - self.offset;
        let len = usize::try_from(available).map_or(buf.len(), |a| a.min(buf.len()));
        let n = parent.read_at(self.range_offset + self.offset, &mut buf[..len])?;
        self.offset += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.parent()?;
        self.offset = resolve_seek(self.offset, self.range_size, pos)?;
        Ok(self.offset)
    }

    fn offset(&self) -> Result<u64> {
        self.parent()?;
        Ok(self.offset)
    }

    fn size(&self) -> Result<u64> {
        self.parent()?;
        Ok(self.range_size)
    }

    fn close(&mut self) -> Result<()> {
        match self.parent.take() {
            Some(mut parent) => parent.close(),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.parent.is_some()
    }
}
