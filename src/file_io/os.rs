//! Host file stream.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use super::{FileIo, read_fully, resolve_seek};
use crate::path::{PathSpec, PathSpecKind};
use crate::{Error, Result};

/// A stream over a file of the host operating system.
///
/// The file is the root of a chain; it has no parent.
#[derive(Debug)]
pub struct OsFile {
    location: String,
    file: Option<File>,
    size: u64,
    offset: u64,
}

impl OsFile {
    /// Opens the file named by an OS path specification.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSpec`] if the specification is not an OS one.
    /// - [`Error::Access`] if permission is denied.
    /// - [`Error::PathSpec`] if the location is a directory.
    /// - [`Error::Io`] for any other host failure.
    pub fn open(path_spec: &PathSpec) -> Result<Self> {
        let PathSpecKind::Os { location } = path_spec.kind() else {
            return Err(Error::invalid_spec(format!(
                "expected an OS path specification, got {}",
                path_spec.type_indicator()
            )));
        };

        let file = File::open(location).map_err(|e| access_error(location, e))?;
        let metadata = file.metadata().map_err(|e| access_error(location, e))?;
        if metadata.is_dir() {
            return Err(Error::PathSpec(format!("{} is a directory", location)));
        }
        log::trace!("opened host file {} ({} bytes)", location, metadata.len());

        Ok(Self {
            location: location.clone(),
            file: Some(file),
            size: metadata.len(),
            offset: 0,
        })
    }

    /// Returns the host path.
    pub fn location(&self) -> &str {
        &self.location
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(Error::NotOpen)
    }
}

/// Maps a host error, singling out permission failures.
pub(crate) fn access_error(location: &str, error: io::Error) -> Error {
    if error.kind() == io::ErrorKind::PermissionDenied {
        Error::Access {
            location: location.to_string(),
            source: error,
        }
    } else {
        Error::Io(error)
    }
}

impl FileIo for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let offset = self.offset;
        let size = self.size;
        let file = self.file()?;
        if offset >= size {
            return Ok(0);
        }
        file.seek(SeekFrom::Start(offset))?;
        let n = read_fully(&mut file.by_ref().take(size - offset), buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file()?;
        self.offset = resolve_seek(self.offset, self.size, pos)?;
        Ok(self.offset)
    }

    fn offset(&self) -> Result<u64> {
        self.file.as_ref().ok_or(Error::NotOpen)?;
        Ok(self.offset)
    }

    fn size(&self) -> Result<u64> {
        self.file.as_ref().ok_or(Error::NotOpen)?;
        Ok(self.size)
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            log::trace!("closed host file {}", self.location);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}
