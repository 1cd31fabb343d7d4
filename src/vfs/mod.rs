//! Hierarchical views over layered resources.
//!
//! A [`FileSystem`] interprets one stream (or the host) as a tree of
//! entries addressed by path specifications. Callers reach it through a
//! [`FileSystemHandle`] from the resolver and navigate with
//! [`FileEntry`] values, which are created on demand and never cached;
//! only the file system underneath them is shared.
//!
//! ```rust,no_run
//! use stackvfs::{Context, PathSpec, Resolver};
//!
//! # fn main() -> stackvfs::Result<()> {
//! stackvfs::register_all();
//! let context = Context::new();
//! let archive = PathSpec::os("/cases/evidence.tar")?;
//! let root = PathSpec::tar("/", archive)?;
//!
//! let file_system = Resolver::open_file_system(&root, &context)?;
//! let root_entry = file_system.get_root_file_entry()?;
//! for child in root_entry.sub_file_entries()? {
//!     let child = child?;
//!     println!("{} {:?}", child.name(), child.stat()?.file_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod encrypted_stream;
mod file_entry;
pub mod location;
pub mod member;
pub mod os;
#[cfg(feature = "sevenz")]
pub mod seven_z;
pub mod stat;
#[cfg(feature = "tar")]
pub mod tar;

use std::fmt;
use std::sync::Arc;

use crate::definitions::TypeIndicator;
use crate::path::PathSpec;
use crate::resolver::{Context, Lease};
use crate::{Error, Result};

pub use encrypted_stream::EncryptedStreamFileSystem;
pub use file_entry::{Directory, FileEntry};
pub use member::{DataLayout, Member, MemberKind, MemberTable};
pub use os::OsFileSystem;
#[cfg(feature = "sevenz")]
pub use seven_z::SevenZFileSystem;
pub use stat::{FileType, Stat, StatTime};
#[cfg(feature = "tar")]
pub use tar::TarFileSystem;

/// The format record behind one entry.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EntryRecord {
    /// A directory without a record of its own: an archive root or a
    /// directory inferred from members below it.
    VirtualDirectory,
    /// A file without a record of its own, such as the plaintext of an
    /// encrypted stream.
    VirtualFile {
        /// Size in bytes.
        size: u64,
    },
    /// An archive member.
    Member(Member),
    /// A host file system object.
    Os {
        /// Metadata of the object itself, not of a link target.
        metadata: std::fs::Metadata,
        /// Target of a symbolic link.
        link_target: Option<String>,
    },
}

impl EntryRecord {
    /// Returns `true` for entries with no backing record.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            EntryRecord::VirtualDirectory | EntryRecord::VirtualFile { .. }
        )
    }

    /// Returns the link target of link entries.
    pub fn link_target(&self) -> Option<&str> {
        match self {
            EntryRecord::Member(member) => member.link_target.as_deref(),
            EntryRecord::Os { link_target, .. } => link_target.as_deref(),
            _ => None,
        }
    }

    /// Builds the stat snapshot of the entry.
    pub fn stat(&self) -> Stat {
        match self {
            EntryRecord::VirtualDirectory => Stat::of_type(FileType::Directory),
            EntryRecord::VirtualFile { size } => Stat {
                size: Some(*size),
                ..Stat::of_type(FileType::File)
            },
            EntryRecord::Member(member) => member.stat(),
            EntryRecord::Os { metadata, .. } => os::metadata_stat(metadata),
        }
    }
}

/// A format-specific hierarchical view.
///
/// Implementations are shared between threads through the resolver cache,
/// so every method takes `&self`.
pub trait FileSystem: Send + Sync {
    /// Returns the kind of the file system.
    fn type_indicator(&self) -> TypeIndicator;

    /// Returns the specification the file system was opened with.
    fn path_spec(&self) -> &PathSpec;

    /// Closes the file system and releases its parent stream. Closing twice
    /// is not an error.
    fn close(&self) -> Result<()>;

    /// Returns `true` until the file system is closed.
    fn is_open(&self) -> bool;

    /// Returns the specification of the root entry.
    fn root_path_spec(&self) -> Result<PathSpec>;

    /// Looks up the record of an entry; `Ok(None)` when it does not exist.
    fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>>;

    /// Lists the children of a directory entry.
    ///
    /// The iterator is computed afresh on every call.
    fn directory_entries<'a>(
        &'a self,
        path_spec: &PathSpec,
    ) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'a>>;

    /// Returns `true` if the entry exists. Never fails.
    fn file_entry_exists(&self, path_spec: &PathSpec) -> bool {
        matches!(self.lookup(path_spec), Ok(Some(_)))
    }

    /// Returns `true` if the specification names the root entry.
    ///
    /// The default suits file systems with a single entry, such as an
    /// encrypted stream, whose specifications carry no location: those
    /// count as the root. File systems addressed by location override it so
    /// that a specification without a location is never the root.
    fn is_root(&self, path_spec: &PathSpec) -> bool {
        path_spec.location().is_none_or(|location| location == "/")
    }

    /// Reads the whole data of a member that is not stored as one
    /// contiguous run of the parent stream.
    ///
    /// The default reports [`Error::BackEnd`]; archive formats with sparse
    /// or compressed members override it.
    fn extract_member(&self, member: &Member) -> Result<Vec<u8>> {
        Err(Error::back_end(format!(
            "{} cannot extract member {}",
            self.type_indicator(),
            member.name
        )))
    }

    /// Returns the specification of the parent entry, or `None` for the
    /// root.
    fn parent_path_spec(&self, path_spec: &PathSpec) -> Result<Option<PathSpec>> {
        match path_spec.location().and_then(location::dirname) {
            Some(parent) => path_spec.with_location(parent).map(Some),
            None => Ok(None),
        }
    }
}

enum Tenure {
    Leased(Lease),
    Owned,
    Borrowed,
    Closed,
}

/// A handle to an open file system.
///
/// Like [`FileObject`](crate::FileObject), a handle from the resolver is
/// leased from the context cache; a handle built with
/// [`FileSystemHandle::new`] owns its file system.
pub struct FileSystemHandle {
    file_system: Arc<dyn FileSystem>,
    context: Context,
    tenure: Tenure,
}

impl fmt::Debug for FileSystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemHandle")
            .field("type_indicator", &self.file_system.type_indicator())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl FileSystemHandle {
    /// Wraps a file system in a handle that owns it.
    ///
    /// `context` is used to open streams of its entries.
    pub fn new(file_system: Arc<dyn FileSystem>, context: &Context) -> Self {
        Self {
            file_system,
            context: context.clone(),
            tenure: Tenure::Owned,
        }
    }

    pub(crate) fn leased(file_system: Arc<dyn FileSystem>, context: &Context, lease: Lease) -> Self {
        Self {
            file_system,
            context: context.clone(),
            tenure: Tenure::Leased(lease),
        }
    }

    /// Takes another handle to the same file system.
    ///
    /// Clones of a leased handle hold their own lease; clones of an owning
    /// handle borrow.
    pub fn try_clone(&self) -> Result<FileSystemHandle> {
        let tenure = match &self.tenure {
            Tenure::Leased(lease) => Tenure::Leased(lease.try_clone().ok_or(Error::NotOpen)?),
            Tenure::Owned | Tenure::Borrowed => Tenure::Borrowed,
            Tenure::Closed => return Err(Error::NotOpen),
        };
        Ok(Self {
            file_system: Arc::clone(&self.file_system),
            context: self.context.clone(),
            tenure,
        })
    }

    fn file_system(&self) -> Result<&dyn FileSystem> {
        if matches!(self.tenure, Tenure::Closed) || !self.file_system.is_open() {
            return Err(Error::NotOpen);
        }
        Ok(self.file_system.as_ref())
    }

    /// Returns the context entries of this file system resolve through.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the kind of the file system.
    pub fn type_indicator(&self) -> TypeIndicator {
        self.file_system.type_indicator()
    }

    /// Returns the specification the file system was opened with.
    pub fn path_spec(&self) -> &PathSpec {
        self.file_system.path_spec()
    }

    /// Returns `true` if the handle and its file system are open.
    pub fn is_open(&self) -> bool {
        !matches!(self.tenure, Tenure::Closed) && self.file_system.is_open()
    }

    /// Returns `true` if both handles refer to the same file system instance.
    pub fn is_same_resource(&self, other: &FileSystemHandle) -> bool {
        Arc::ptr_eq(&self.file_system, &other.file_system)
    }

    /// Looks up the record of an entry.
    pub fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>> {
        self.file_system()?.lookup(path_spec)
    }

    /// Returns the root entry.
    pub fn get_root_file_entry(&self) -> Result<FileEntry> {
        let fs = self.file_system()?;
        let root = fs.root_path_spec()?;
        let record = fs.lookup(&root)?.ok_or_else(|| Error::EntryNotFound {
            location: root.location().unwrap_or("/").to_string(),
        })?;
        Ok(FileEntry::new(self.try_clone()?, root, Some(record)))
    }

    /// Returns the entry of a specification, or `None` if it does not exist.
    pub fn get_file_entry_by_path_spec(&self, path_spec: &PathSpec) -> Result<Option<FileEntry>> {
        match self.lookup(path_spec)? {
            Some(record) => Ok(Some(FileEntry::new(
                self.try_clone()?,
                path_spec.clone(),
                Some(record),
            ))),
            None => Ok(None),
        }
    }

    /// Returns `true` if the entry exists. Never fails.
    pub fn file_entry_exists_by_path_spec(&self, path_spec: &PathSpec) -> bool {
        self.file_system()
            .is_ok_and(|fs| fs.file_entry_exists(path_spec))
    }

    /// Reads the whole data of a sparse or compressed member.
    pub fn extract_member(&self, member: &Member) -> Result<Vec<u8>> {
        self.file_system()?.extract_member(member)
    }

    pub(crate) fn inner(&self) -> Result<&dyn FileSystem> {
        self.file_system()
    }

    /// Closes the handle.
    ///
    /// A leased handle releases its cache reference, an owning handle closes
    /// the file system. Closing twice is not an error.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.tenure, Tenure::Closed) {
            Tenure::Leased(lease) => {
                drop(lease);
                Ok(())
            }
            Tenure::Owned => self.file_system.close(),
            Tenure::Borrowed | Tenure::Closed => Ok(()),
        }
    }
}

impl Drop for FileSystemHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("failed to close dropped file system handle: {}", e);
        }
    }
}
