use std::fmt;

use once_cell::sync::OnceCell;

use super::location::basename;
use super::{EntryRecord, FileSystemHandle, FileType, Stat};
use crate::file_io::FileObject;
use crate::path::PathSpec;
use crate::resolver::Resolver;
use crate::{Error, Result};

/// An entry of a file system.
///
/// The format record and the stat snapshot are fetched on first use and
/// kept for the life of the entry. Entries are cheap to create and are not
/// cached; each holds its own reference to the file system.
pub struct FileEntry {
    file_system: FileSystemHandle,
    path_spec: PathSpec,
    record: OnceCell<EntryRecord>,
    stat: OnceCell<Stat>,
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry")
            .field("type_indicator", &self.path_spec.type_indicator())
            .field("location", &self.path_spec.location())
            .field("record", &self.record.get())
            .finish_non_exhaustive()
    }
}

impl FileEntry {
    pub(crate) fn new(
        file_system: FileSystemHandle,
        path_spec: PathSpec,
        record: Option<EntryRecord>,
    ) -> Self {
        let cell = OnceCell::new();
        if let Some(record) = record {
            let _ = cell.set(record);
        }
        Self {
            file_system,
            path_spec,
            record: cell,
            stat: OnceCell::new(),
        }
    }

    /// Returns the specification of the entry.
    pub fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    /// Returns the file system the entry belongs to.
    pub fn file_system(&self) -> &FileSystemHandle {
        &self.file_system
    }

    /// Returns the format record of the entry.
    pub fn record(&self) -> Result<&EntryRecord> {
        self.record.get_or_try_init(|| {
            self.file_system
                .lookup(&self.path_spec)?
                .ok_or_else(|| Error::EntryNotFound {
                    location: self.path_spec.location().unwrap_or_default().to_string(),
                })
        })
    }

    /// Returns the last segment of the location; empty for the root.
    pub fn name(&self) -> &str {
        self.path_spec.location().map_or("", basename)
    }

    /// Returns the stat snapshot of the entry.
    pub fn stat(&self) -> Result<&Stat> {
        self.stat.get_or_try_init(|| Ok(self.record()?.stat()))
    }

    fn file_type(&self) -> Option<FileType> {
        self.stat().ok().and_then(|stat| stat.file_type)
    }

    /// Returns `true` for the root entry of the file system.
    pub fn is_root(&self) -> bool {
        self.file_system
            .inner()
            .is_ok_and(|fs| fs.is_root(&self.path_spec))
    }

    /// Returns `true` if the entry has no backing format record.
    pub fn is_virtual(&self) -> bool {
        self.record().is_ok_and(EntryRecord::is_virtual)
    }

    /// Returns `true` if the entry is allocated. Deleted-entry recovery is
    /// not supported, so every reachable entry is allocated.
    pub fn is_allocated(&self) -> bool {
        true
    }

    /// Returns `true` for regular files.
    pub fn is_file(&self) -> bool {
        self.file_type() == Some(FileType::File)
    }

    /// Returns `true` for directories, recorded or inferred.
    pub fn is_directory(&self) -> bool {
        self.file_type() == Some(FileType::Directory)
    }

    /// Returns `true` for symbolic and hard links.
    pub fn is_link(&self) -> bool {
        self.file_type() == Some(FileType::Link)
    }

    /// Returns `true` for devices.
    pub fn is_device(&self) -> bool {
        self.file_type() == Some(FileType::Device)
    }

    /// Returns `true` for named pipes.
    pub fn is_pipe(&self) -> bool {
        self.file_type() == Some(FileType::Pipe)
    }

    /// Returns `true` for sockets.
    pub fn is_socket(&self) -> bool {
        self.file_type() == Some(FileType::Socket)
    }

    /// Returns the target of a link entry.
    pub fn link(&self) -> Result<Option<&str>> {
        Ok(self.record()?.link_target())
    }

    /// Returns the directory view of a directory entry.
    pub fn directory(&self) -> Option<Directory<'_>> {
        self.is_directory().then_some(Directory { entry: self })
    }

    /// Returns the children of a directory entry; empty for other entries.
    pub fn sub_file_entries(&self) -> Result<Box<dyn Iterator<Item = Result<FileEntry>> + '_>> {
        let Some(directory) = self.directory() else {
            return Ok(Box::new(std::iter::empty()));
        };
        let children = directory.entries()?;
        Ok(Box::new(children.map(move |child| {
            Ok(FileEntry::new(self.file_system.try_clone()?, child?, None))
        })))
    }

    /// Returns the number of children of a directory entry.
    pub fn number_of_sub_file_entries(&self) -> Result<usize> {
        match self.directory() {
            Some(directory) => directory.entries()?.try_fold(0, |n, child| child.map(|_| n + 1)),
            None => Ok(0),
        }
    }

    /// Returns the parent entry, or `None` for the root and for file
    /// systems without locations.
    ///
    /// The parent specification is derived from the location, so this
    /// works for directories the archive never recorded.
    pub fn parent_file_entry(&self) -> Result<Option<FileEntry>> {
        if self.is_root() {
            return Ok(None);
        }
        let Some(parent) = self.file_system.inner()?.parent_path_spec(&self.path_spec)? else {
            return Ok(None);
        };
        self.file_system.get_file_entry_by_path_spec(&parent)
    }

    /// Returns the number of data streams: 1 for files, 0 otherwise.
    pub fn number_of_data_streams(&self) -> usize {
        usize::from(self.is_file())
    }

    /// Opens the data stream of a file entry; `None` for other entries.
    pub fn get_file_object(&self) -> Result<Option<FileObject>> {
        if !self.is_file() {
            return Ok(None);
        }
        Resolver::open_file_object(&self.path_spec, self.file_system.context()).map(Some)
    }
}

/// The listing of a directory entry.
#[derive(Debug, Clone, Copy)]
pub struct Directory<'e> {
    entry: &'e FileEntry,
}

impl<'e> Directory<'e> {
    /// Returns the directory entry.
    pub fn file_entry(&self) -> &'e FileEntry {
        self.entry
    }

    /// Returns the specifications of the children.
    ///
    /// Each call rescans the file system, so the listing can be restarted
    /// by calling again.
    pub fn entries(&self) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'e>> {
        let entry: &'e FileEntry = self.entry;
        entry
            .file_system
            .inner()?
            .directory_entries(&entry.path_spec)
    }
}
