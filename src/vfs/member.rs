//! Member tables of archive formats.
//!
//! A [`MemberTable`] is the format-neutral view of an archive's entry list:
//! it answers `get_member(name)`, enumerates all members and reconstructs
//! directory listings, including directories the archive never recorded.

use std::collections::{HashMap, HashSet};

use super::EntryRecord;
use super::location::{member_name, normalize_member_name, split_child};
use super::stat::{FileType, Stat, StatTime};

/// Kind of an archive member as recorded by its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Regular, contiguous or sparse file.
    Regular,
    /// Directory record.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Hard link to another member.
    HardLink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Anything the format defines that has no classification here.
    Other,
}

impl MemberKind {
    /// Returns the file type of this kind, or `None` when unclassified.
    pub fn file_type(self) -> Option<FileType> {
        match self {
            MemberKind::Regular => Some(FileType::File),
            MemberKind::Directory => Some(FileType::Directory),
            MemberKind::Symlink | MemberKind::HardLink => Some(FileType::Link),
            MemberKind::CharDevice | MemberKind::BlockDevice => Some(FileType::Device),
            MemberKind::Fifo => Some(FileType::Pipe),
            MemberKind::Other => None,
        }
    }
}

/// Where the data of a member lives in the archive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataLayout {
    /// One contiguous run starting at [`Member::data_offset`].
    #[default]
    Contiguous,
    /// Pieces separated by holes, as in GNU sparse TAR members;
    /// [`Member::data_offset`] is the position of the member's header.
    Sparse,
    /// Compressed together with other members in the given block;
    /// [`Member::data_offset`] is the member's position in the block's
    /// unpacked output.
    Block(usize),
}

/// One record of a member table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Member {
    /// Normalized name: no leading `/` or `./`, no trailing `/`.
    pub name: String,
    /// Data size in bytes.
    pub size: u64,
    /// Modification time.
    pub modification_time: Option<StatTime>,
    /// Access time.
    pub access_time: Option<StatTime>,
    /// Creation time.
    pub creation_time: Option<StatTime>,
    /// Permission bits.
    pub mode: Option<u32>,
    /// Owner identifier.
    pub uid: Option<u64>,
    /// Group identifier.
    pub gid: Option<u64>,
    /// Member kind.
    pub kind: MemberKind,
    /// Target of a symbolic or hard link.
    pub link_target: Option<String>,
    /// Offset of the member's data; its meaning depends on `layout`.
    pub data_offset: u64,
    /// Storage layout of the member's data.
    pub layout: DataLayout,
}

impl Member {
    /// Creates a member with no optional metadata.
    pub fn new(raw_name: &str, kind: MemberKind, size: u64, data_offset: u64) -> Self {
        Self {
            name: normalize_member_name(raw_name),
            size,
            modification_time: None,
            access_time: None,
            creation_time: None,
            mode: None,
            uid: None,
            gid: None,
            kind,
            link_target: None,
            data_offset,
            layout: DataLayout::Contiguous,
        }
    }

    /// Returns `true` if the data can be served as a window of the archive
    /// stream.
    pub fn is_contiguous(&self) -> bool {
        self.layout == DataLayout::Contiguous
    }

    /// Returns the file type of the member, if classifiable.
    pub fn file_type(&self) -> Option<FileType> {
        self.kind.file_type()
    }

    /// Builds the stat snapshot of the member.
    pub fn stat(&self) -> Stat {
        Stat {
            size: Some(self.size),
            access_time: self.access_time,
            creation_time: self.creation_time,
            modification_time: self.modification_time,
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            file_type: self.file_type(),
        }
    }
}

/// Ordered member list with name lookup.
///
/// When an archive records the same name twice, lookups return the later
/// record, matching how extraction tools overwrite earlier members.
#[derive(Debug, Clone, Default)]
pub struct MemberTable {
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl MemberTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member.
    pub fn push(&mut self, member: Member) {
        self.index.insert(member.name.clone(), self.members.len());
        self.members.push(member);
    }

    /// Looks a member up by normalized name.
    pub fn get_member(&self, name: &str) -> Option<&Member> {
        self.index.get(name).map(|&i| &self.members[i])
    }

    /// Returns all members in archive order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the table has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if some member lies below `directory`, which makes
    /// `directory` exist even without a record of its own.
    pub fn has_descendants(&self, directory: &str) -> bool {
        if directory.is_empty() {
            return !self.members.is_empty();
        }
        self.members.iter().any(|member| {
            member
                .name
                .strip_prefix(directory)
                .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
        })
    }

    /// Resolves an absolute location to its record.
    ///
    /// The root and directories implied by deeper members are virtual; a
    /// recorded member wins over an implied directory of the same name.
    pub fn entry_record(&self, location: &str) -> Option<EntryRecord> {
        let name = member_name(location);
        if name.is_empty() {
            return Some(EntryRecord::VirtualDirectory);
        }
        if let Some(member) = self.get_member(name) {
            return Some(EntryRecord::Member(member.clone()));
        }
        self.has_descendants(name)
            .then_some(EntryRecord::VirtualDirectory)
    }

    /// Lists the direct children of `directory` ("" for the root) as
    /// absolute locations.
    ///
    /// The scan runs over the whole table each time the returned iterator
    /// is created and yields each child once, inferring directories from
    /// members nested below them.
    pub fn directory_entries<'a>(&'a self, directory: &str) -> DirectoryEntries<'a> {
        let directory = directory.trim_matches('/');
        let prefix = if directory.is_empty() {
            String::new()
        } else {
            format!("{}/", directory)
        };
        DirectoryEntries {
            members: self.members.iter(),
            prefix,
            processed: HashSet::new(),
        }
    }
}

/// Lazy, deduplicating iterator over the children of one directory.
#[derive(Debug)]
pub struct DirectoryEntries<'a> {
    members: std::slice::Iter<'a, Member>,
    prefix: String,
    processed: HashSet<&'a str>,
}

impl Iterator for DirectoryEntries<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for member in self.members.by_ref() {
            // The archive's own root record has an empty name.
            if member.name.is_empty() {
                continue;
            }
            let Some(remainder) = member.name.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            let (segment, _suffix) = split_child(remainder);
            if segment.is_empty() || !self.processed.insert(segment) {
                continue;
            }
            return Some(format!("/{}{}", self.prefix, segment));
        }
        None
    }
}
