//! TAR archives as file systems.
//!
//! The member table is read once when the file system opens; member data
//! stays in the parent stream and is exposed through
//! [`TarFile`](crate::file_io::TarFile) windows. GNU sparse members are
//! the exception: their stored pieces are reassembled, holes zero-filled,
//! when the member is opened.

use std::io::{Read, SeekFrom};
use std::sync::Mutex;

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

/// A TAR archive stored in a parent stream.
#[derive(Debug)]
pub struct TarFileSystem {
    path_spec: PathSpec,
    parent: Mutex<Option<FileObject>>,
    members: MemberTable,
}

impl TarFileSystem {
    /// Opens the archive holding a TAR path specification, resolving the
    /// parent stream through `context`.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        if !matches!(path_spec.kind(), PathSpecKind::Tar { .. }) {
            return Err(Error::invalid_spec(format!(
                "expected a TAR path specification, got {}",
                path_spec.type_indicator()
            )));
        }
        let parent_spec = path_spec
            .parent()
            .ok_or_else(|| Error::invalid_spec("TAR path specification requires a parent"))?;
        let parent = Resolver::open_file_object(parent_spec, context)?;
        let members = read_members(&parent)?;
        log::debug!("read {} TAR members", members.len());

        Ok(Self {
            path_spec: path_spec.clone(),
            parent: Mutex::new(Some(parent)),
            members,
        })
    }

    /// Returns the member table.
    pub fn members(&self) -> &MemberTable {
        &self.members
    }
}

fn tar_error(error: std::io::Error) -> Error {
    Error::back_end(format!("invalid TAR archive: {}", error))
}

fn member_kind(entry_type: tar::EntryType) -> MemberKind {
    if entry_type.is_dir() {
        MemberKind::Directory
    } else if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
        // Sparse members are reassembled through `extract_member`.
        MemberKind::Regular
    } else if entry_type.is_symlink() {
        MemberKind::Symlink
    } else if entry_type.is_hard_link() {
        MemberKind::HardLink
    } else if entry_type.is_character_special() {
        MemberKind::CharDevice
    } else if entry_type.is_block_special() {
        MemberKind::BlockDevice
    } else if entry_type.is_fifo() {
        MemberKind::Fifo
    } else {
        MemberKind::Other
    }
}

/// Header mtime in seconds; values past `i64::MAX` are dropped.
fn modification_time(header: &tar::Header) -> Option<StatTime> {
    header
        .mtime()
        .ok()
        .and_then(|t| i64::try_from(t).ok())
        .map(StatTime::from_seconds)
}

/// Returns a view of the archive stream positioned at its start; the tar
/// reader tracks positions relative to where it begins.
fn archive_reader(parent: &FileObject) -> Result<tar::Archive<FileObject>> {
    let view = parent.share()?;
    view.seek(SeekFrom::Start(0))?;
    Ok(tar::Archive::new(view))
}

fn read_members(parent: &FileObject) -> Result<MemberTable> {
    let mut archive = archive_reader(parent)?;
    let mut table = MemberTable::new();
    for entry in archive.entries_with_seek().map_err(tar_error)? {
        let entry = entry.map_err(tar_error)?;
        let header = entry.header();
        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let sparse = header.entry_type().is_gnu_sparse();

        // The entry size of a sparse member is its expanded size.
        let mut member = Member::new(
            &raw_name,
            member_kind(header.entry_type()),
            entry.size(),
            if sparse {
                entry.raw_header_position()
            } else {
                entry.raw_file_position()
            },
        );
        if sparse {
            member.layout = DataLayout::Sparse;
        }
        member.modification_time = modification_time(header);
        member.mode = header.mode().ok();
        member.uid = header.uid().ok();
        member.gid = header.gid().ok();
        member.link_target = entry
            .link_name_bytes()
            .map(|target| String::from_utf8_lossy(&target).into_owned());
        log::trace!("TAR member {} ({:?})", member.name, member.kind);
        table.push(member);
    }
    Ok(table)
}

impl FileSystem for TarFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Tar
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn close(&self) -> Result<()> {
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
        path_spec.type_indicator() == TypeIndicator::Tar
            && path_spec
                .location()
                .is_some_and(|location| member_name(location).is_empty())
    }

    fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>> {
        let Some(location) = path_spec.location() else {
            return Ok(None);
        };
        Ok(self.members.entry_record(location))
    }

    fn directory_entries<'a>(
        &'a self,
        path_spec: &PathSpec,
    ) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'a>> {
        let location = path_spec
            .location()
            .ok_or_else(|| Error::PathSpec("TAR directory listing requires a location".into()))?;
        let template = path_spec.clone();
        let directory = normalize_member_name(location);
        Ok(Box::new(
            self.members
                .directory_entries(&directory)
                .map(move |child| template.with_location(child)),
        ))
    }

    fn extract_member(&self, member: &Member) -> Result<Vec<u8>> {
        if member.layout != DataLayout::Sparse {
            return Err(Error::back_end(format!(
                "TAR member {} is stored contiguously",
                member.name
            )));
        }
        let guard = lock_or_recover(&self.parent);
        let parent = guard.as_ref().ok_or(Error::NotOpen)?;
        let mut archive = archive_reader(parent)?;
        for entry in archive.entries_with_seek().map_err(tar_error)? {
            let mut entry = entry.map_err(tar_error)?;
            if entry.raw_header_position() != member.data_offset {
                continue;
            }
            let mut data = Vec::with_capacity(usize::try_from(member.size).unwrap_or(0));
            entry.read_to_end(&mut data).map_err(tar_error)?;
            log::trace!("reassembled sparse TAR member {} ({} bytes)", member.name, data.len());
            return Ok(data);
        }
        Err(Error::back_end(format!(
            "TAR member {} vanished from the archive",
            member.name
        )))
    }
}
