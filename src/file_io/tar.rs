//! Data streams of TAR members.

use std::io::SeekFrom;

use super::{DataRange, FileIo, MemoryFile};
use crate::path::{PathSpec, PathSpecKind};
use crate::resolver::{Context, Resolver};
use crate::vfs::{EntryRecord, FileSystemHandle, MemberKind};
use crate::{Error, Result};

#[derive(Debug)]
enum MemberData {
    Window(DataRange),
    Reassembled(MemoryFile),
}

impl MemberData {
    fn io(&self) -> &dyn FileIo {
        match self {
            MemberData::Window(range) => range,
            MemberData::Reassembled(data) => data,
        }
    }

    fn io_mut(&mut self) -> &mut dyn FileIo {
        match self {
            MemberData::Window(range) => range,
            MemberData::Reassembled(data) => data,
        }
    }
}

/// The data of one regular TAR member.
///
/// The stream is a window onto the archive's parent stream; it keeps the
/// archive's file system open while it exists. GNU sparse members are
/// reassembled into memory when opened.
#[derive(Debug)]
pub struct TarFile {
    data: MemberData,
    file_system: Option<FileSystemHandle>,
}

impl TarFile {
    /// Opens the member named by a TAR path specification.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if the archive has no such member.
    /// - [`Error::BackEnd`] if the member is not a regular file or its
    ///   sparse map is damaged.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        let PathSpecKind::Tar { location } = path_spec.kind() else {
            return Err(Error::invalid_spec(format!(
                "expected a TAR path specification, got {}",
                path_spec.type_indicator()
            )));
        };
        let parent_spec = path_spec
            .parent()
            .ok_or_else(|| Error::invalid_spec("TAR path specification requires a parent"))?;

        let file_system = Resolver::open_file_system(path_spec, context)?;
        let member = match file_system.lookup(path_spec)? {
            Some(EntryRecord::Member(member)) if member.kind == MemberKind::Regular => member,
            Some(_) => {
                return Err(Error::back_end(format!(
                    "TAR entry {} is not a regular file",
                    location
                )));
            }
            None => {
                return Err(Error::EntryNotFound {
                    location: location.clone(),
                });
            }
        };

        let data = if member.is_contiguous() {
            let parent = Resolver::open_file_object(parent_spec, context)?;
            MemberData::Window(DataRange::with_parent(parent, member.data_offset, member.size))
        } else {
            MemberData::Reassembled(MemoryFile::new(file_system.extract_member(&member)?))
        };
        Ok(Self {
            data,
            file_system: Some(file_system),
        })
    }
}

impl FileIo for TarFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.data.io_mut().read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.data.io_mut().seek(pos)
    }

    fn offset(&self) -> Result<u64> {
        self.data.io().offset()
    }

    fn size(&self) -> Result<u64> {
        self.data.io().size()
    }

    fn close(&mut self) -> Result<()> {
        let result = self.data.io_mut().close();
        if let Some(mut file_system) = self.file_system.take() {
            file_system.close()?;
        }
        result
    }

    fn is_open(&self) -> bool {
        self.data.io().is_open()
    }
}
