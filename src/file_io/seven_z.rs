//! Data streams of 7z members.

use std::io::SeekFrom;

use super::{FileIo, MemoryFile};
use crate::path::{PathSpec, PathSpecKind};
use crate::resolver::{Context, Resolver};
use crate::vfs::{EntryRecord, FileSystemHandle, MemberKind};
use crate::{Error, Result};

/// The decoded data of one regular 7z member.
///
/// The member is decoded in full when opened; the stream keeps the
/// archive's file system open while it exists.
#[derive(Debug)]
pub struct SevenZFile {
    data: MemoryFile,
    file_system: Option<FileSystemHandle>,
}

impl SevenZFile {
    /// Opens the member named by a 7z path specification.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if the archive has no such member.
    /// - [`Error::BackEnd`] if the member is not a regular file, its
    ///   folder uses an unsupported method or its data fails the CRC check.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        let PathSpecKind::SevenZ { location } = path_spec.kind() else {
            return Err(Error::invalid_spec(format!(
                "expected a SEVEN_Z path specification, got {}",
                path_spec.type_indicator()
            )));
        };

        let file_system = Resolver::open_file_system(path_spec, context)?;
        let member = match file_system.lookup(path_spec)? {
            Some(EntryRecord::Member(member)) if member.kind == MemberKind::Regular => member,
            Some(_) => {
                return Err(Error::back_end(format!(
                    "7z entry {} is not a regular file",
                    location
                )));
            }
            None => {
                return Err(Error::EntryNotFound {
                    location: location.clone(),
                });
            }
        };
        let data = file_system.extract_member(&member)?;
        log::trace!("opened 7z member {} ({} bytes)", member.name, data.len());

        Ok(Self {
            data: MemoryFile::new(data),
            file_system: Some(file_system),
        })
    }
}

impl FileIo for SevenZFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.data.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.data.seek(pos)
    }

    fn offset(&self) -> Result<u64> {
        self.data.offset()
    }

    fn size(&self) -> Result<u64> {
        self.data.size()
    }

    fn close(&mut self) -> Result<()> {
        let result = self.data.close();
        if let Some(mut file_system) = self.file_system.take() {
            file_system.close()?;
        }
        result
    }

    fn is_open(&self) -> bool {
        self.data.is_open()
    }
}
