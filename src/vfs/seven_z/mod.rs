//! 7z archives as file systems.
//!
//! The archive header is read once when the file system opens and turned
//! into a [`MemberTable`]. Member data is compressed in folders, so
//! [`SevenZFile`](crate::file_io::SevenZFile) streams serve a member from
//! its decoded folder held in memory; the most recently decoded folder is
//! kept so that members of one solid folder decode it once.

mod coder;
mod header;
mod reader;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::location::{member_name, normalize_member_name};
use super::member::{DataLayout, Member, MemberKind, MemberTable};
use super::stat::StatTime;
use super::{EntryRecord, FileSystem};
use crate::definitions::TypeIndicator;
use crate::file_io::FileObject;
use crate::path::{PathSpec, PathSpecKind};
use crate::resolver::{Context, Resolver};
use crate::sync::lock_or_recover;
use crate::{Error, Result};

use coder::{check_crc, unpack_folder};
use header::{Archive, Entry, Folder};

pub use header::SIGNATURE;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SECOND: u64 = 10_000_000;

const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
/// Set when the high 16 bits of the attributes hold a Unix mode.
const FILE_ATTRIBUTE_UNIX_EXTENSION: u32 = 0x8000;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_SYMLINK: u32 = 0o120000;

/// Converts a Windows FILETIME to a timestamp with nanosecond precision.
pub fn filetime_to_stat_time(filetime: u64) -> Option<StatTime> {
    let seconds = i64::try_from(filetime / FILETIME_TICKS_PER_SECOND).ok()?;
    let ticks = u32::try_from(filetime % FILETIME_TICKS_PER_SECOND).ok()?;
    Some(StatTime::new(seconds - FILETIME_EPOCH_OFFSET, ticks * 100))
}

fn member_from_entry(entry: &Entry) -> Member {
    let unix_mode = entry
        .attributes
        .filter(|attributes| attributes & FILE_ATTRIBUTE_UNIX_EXTENSION != 0)
        .map(|attributes| attributes >> 16);
    let is_directory = entry.is_directory
        || entry
            .attributes
            .is_some_and(|attributes| attributes & FILE_ATTRIBUTE_DIRECTORY != 0);
    let kind = if is_directory {
        MemberKind::Directory
    } else if unix_mode.is_some_and(|mode| mode & UNIX_FILE_TYPE_MASK == UNIX_SYMLINK) {
        MemberKind::Symlink
    } else {
        MemberKind::Regular
    };

    let mut member = Member::new(&entry.name, kind, entry.size, entry.folder_offset);
    if let Some(folder) = entry.folder {
        member.layout = DataLayout::Block(folder);
    }
    member.modification_time = entry.modification_time.and_then(filetime_to_stat_time);
    member.access_time = entry.access_time.and_then(filetime_to_stat_time);
    member.creation_time = entry.creation_time.and_then(filetime_to_stat_time);
    member.mode = unix_mode.map(|mode| mode & 0o7777);
    member
}

/// A 7z archive stored in a parent stream.
#[derive(Debug)]
pub struct SevenZFileSystem {
    path_spec: PathSpec,
    parent: Mutex<Option<FileObject>>,
    members: MemberTable,
    folders: Vec<Folder>,
    digests: HashMap<String, u32>,
    decoded: Mutex<Option<(usize, Arc<Vec<u8>>)>>,
}

impl SevenZFileSystem {
    /// Opens the archive holding a 7z path specification, resolving the
    /// parent stream through `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackEnd`] if the parent is not a readable 7z
    /// archive.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        if !matches!(path_spec.kind(), PathSpecKind::SevenZ { .. }) {
            return Err(Error::invalid_spec(format!(
                "expected a SEVEN_Z path specification, got {}",
                path_spec.type_indicator()
            )));
        }
        let parent_spec = path_spec
            .parent()
            .ok_or_else(|| Error::invalid_spec("SEVEN_Z path specification requires a parent"))?;
        let parent = Resolver::open_file_object(parent_spec, context)?;
        let archive = Archive::read(&parent)?;

        let mut members = MemberTable::new();
        let mut digests = HashMap::new();
        for entry in archive.entries.iter().filter(|entry| !entry.is_anti) {
            let member = member_from_entry(entry);
            if let Some(crc) = entry.crc {
                digests.insert(member.name.clone(), crc);
            }
            log::trace!("7z member {} ({:?})", member.name, member.kind);
            members.push(member);
        }
        log::debug!(
            "read {} 7z members in {} folders",
            members.len(),
            archive.folders.len()
        );

        Ok(Self {
            path_spec: path_spec.clone(),
            parent: Mutex::new(Some(parent)),
            members,
            folders: archive.folders,
            digests,
            decoded: Mutex::new(None),
        })
    }

    /// Returns the member table.
    pub fn members(&self) -> &MemberTable {
        &self.members
    }

    fn folder_data(&self, index: usize) -> Result<Arc<Vec<u8>>> {
        let mut decoded = lock_or_recover(&self.decoded);
        if let Some((cached, data)) = decoded.as_ref() {
            if *cached == index {
                return Ok(Arc::clone(data));
            }
        }
        let folder = self
            .folders
            .get(index)
            .ok_or_else(|| Error::back_end(format!("7z folder {} does not exist", index)))?;
        let data = {
            let parent = lock_or_recover(&self.parent);
            let parent = parent.as_ref().ok_or(Error::NotOpen)?;
            Arc::new(unpack_folder(parent, folder)?)
        };
        *decoded = Some((index, Arc::clone(&data)));
        Ok(data)
    }
}

impl FileSystem for SevenZFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::SevenZ
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn close(&self) -> Result<()> {
        lock_or_recover(&self.decoded).take();
        match lock_or_recover(&self.parent).take() {
            Some(mut parent) => parent.close(),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        lock_or_recover(&self.parent).is_some()
    }

    fn root_path_spec(&self) -> Result<PathSpec> {
        self.path_spec.with_location("/")
    }

    fn is_root(&self, path_spec: &PathSpec) -> bool {
        path_spec.type_indicator() == TypeIndicator::SevenZ
            && path_spec
                .location()
                .is_some_and(|location| member_name(location).is_empty())
    }

    fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>> {
        Ok(path_spec
            .location()
            .and_then(|location| self.members.entry_record(location)))
    }

    fn directory_entries<'a>(
        &'a self,
        path_spec: &PathSpec,
    ) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'a>> {
        let location = path_spec
            .location()
            .ok_or_else(|| Error::PathSpec("7z directory listing requires a location".into()))?;
        let template = path_spec.clone();
        let directory = normalize_member_name(location);
        Ok(Box::new(
            self.members
                .directory_entries(&directory)
                .map(move |child| template.with_location(child)),
        ))
    }

    fn extract_member(&self, member: &Member) -> Result<Vec<u8>> {
        let DataLayout::Block(folder) = member.layout else {
            // Members without a data stream are empty.
            return Ok(Vec::new());
        };
        let data = self.folder_data(folder)?;
        let range = usize::try_from(member.data_offset)
            .ok()
            .zip(usize::try_from(member.size).ok())
            .and_then(|(start, size)| data.get(start..start.checked_add(size)?))
            .ok_or_else(|| {
                Error::back_end(format!("7z member {} lies outside its folder", member.name))
            })?;
        if let Some(&crc) = self.digests.get(&member.name) {
            check_crc(range, crc)?;
        }
        Ok(range.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_conversion() {
        assert_eq!(
            filetime_to_stat_time(116_444_736_000_000_000),
            Some(StatTime::new(0, 0))
        );
        assert_eq!(
            filetime_to_stat_time(130_000_000_001_234_567),
            Some(StatTime::new(1_355_526_400, 123_456_700))
        );
        assert_eq!(filetime_to_stat_time(0), Some(StatTime::new(-FILETIME_EPOCH_OFFSET, 0)));
    }

    #[test]
    fn test_member_from_entry_attributes() {
        let entry = Entry {
            name: "bin/sh".into(),
            has_stream: true,
            size: 7,
            attributes: Some((0o120777 << 16) | FILE_ATTRIBUTE_UNIX_EXTENSION),
            folder: Some(1),
            folder_offset: 40,
            modification_time: Some(116_444_736_015_000_000),
            ..Entry::default()
        };
        let member = member_from_entry(&entry);
        assert_eq!(member.kind, MemberKind::Symlink);
        assert_eq!(member.mode, Some(0o777));
        assert_eq!(member.layout, DataLayout::Block(1));
        assert_eq!(member.data_offset, 40);
        assert_eq!(member.modification_time, Some(StatTime::new(1, 500_000_000)));

        let directory = Entry {
            name: "etc/".into(),
            attributes: Some(FILE_ATTRIBUTE_DIRECTORY),
            ..Entry::default()
        };
        let member = member_from_entry(&directory);
        assert_eq!(member.kind, MemberKind::Directory);
        assert_eq!(member.name, "etc");
        assert_eq!(member.mode, None);
        assert!(member.is_contiguous());
    }
}
