//! The host file system.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::stat::{FileType, Stat, StatTime};
use super::{EntryRecord, FileSystem};
use crate::definitions::TypeIndicator;
use crate::file_io::os::access_error;
use crate::path::{PathSpec, PathSpecKind};
use crate::{Error, Result};

/// The host operating system's file system.
///
/// Entries are addressed by OS path specifications; links are reported as
/// links and not followed.
#[derive(Debug)]
pub struct OsFileSystem {
    path_spec: PathSpec,
    open: AtomicBool,
}

impl OsFileSystem {
    /// Opens the host file system for an OS path specification.
    pub fn open(path_spec: &PathSpec) -> Result<Self> {
        if !matches!(path_spec.kind(), PathSpecKind::Os { .. }) {
            return Err(Error::invalid_spec(format!(
                "expected an OS path specification, got {}",
                path_spec.type_indicator()
            )));
        }
        Ok(Self {
            path_spec: path_spec.clone(),
            open: AtomicBool::new(true),
        })
    }
}

pub(crate) fn metadata_stat(metadata: &fs::Metadata) -> Stat {
    let file_type = metadata.file_type();
    let mut stat = Stat {
        size: Some(metadata.len()),
        access_time: metadata.accessed().ok().map(StatTime::from_system_time),
        creation_time: metadata.created().ok().map(StatTime::from_system_time),
        modification_time: metadata.modified().ok().map(StatTime::from_system_time),
        ..Stat::default()
    };
    stat.file_type = if file_type.is_dir() {
        Some(FileType::Directory)
    } else if file_type.is_file() {
        Some(FileType::File)
    } else if file_type.is_symlink() {
        Some(FileType::Link)
    } else {
        None
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::{FileTypeExt, MetadataExt};

        stat.mode = Some(metadata.mode() & 0o7777);
        stat.uid = Some(u64::from(metadata.uid()));
        stat.gid = Some(u64::from(metadata.gid()));
        if stat.file_type.is_none() {
            stat.file_type = if file_type.is_block_device() || file_type.is_char_device() {
                Some(FileType::Device)
            } else if file_type.is_fifo() {
                Some(FileType::Pipe)
            } else if file_type.is_socket() {
                Some(FileType::Socket)
            } else {
                None
            };
        }
    }

    stat
}

impl FileSystem for OsFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Os
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn root_path_spec(&self) -> Result<PathSpec> {
        PathSpec::os(std::path::MAIN_SEPARATOR_STR)
    }

    fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>> {
        let Some(location) = path_spec.location() else {
            return Ok(None);
        };
        let metadata = match fs::symlink_metadata(location) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(access_error(location, e)),
        };
        let link_target = if metadata.file_type().is_symlink() {
            fs::read_link(location)
                .ok()
                .map(|target| target.to_string_lossy().into_owned())
        } else {
            None
        };
        Ok(Some(EntryRecord::Os {
            metadata,
            link_target,
        }))
    }

    fn directory_entries<'a>(
        &'a self,
        path_spec: &PathSpec,
    ) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'a>> {
        let location = path_spec
            .location()
            .ok_or_else(|| Error::PathSpec("OS directory listing requires a location".into()))?;
        let entries = fs::read_dir(location).map_err(|e| access_error(location, e))?;
        Ok(Box::new(entries.map(|entry| {
            let entry = entry?;
            PathSpec::os(entry.path().to_string_lossy())
        })))
    }

    fn is_root(&self, path_spec: &PathSpec) -> bool {
        path_spec
            .location()
            .is_some_and(|location| Path::new(location).parent().is_none())
    }

    fn parent_path_spec(&self, path_spec: &PathSpec) -> Result<Option<PathSpec>> {
        let parent = path_spec
            .location()
            .and_then(|location| Path::new(location).parent())
            .filter(|parent| !parent.as_os_str().is_empty());
        match parent {
            Some(parent) => PathSpec::os(parent.to_string_lossy()).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let dir_spec = PathSpec::os(dir.path().to_string_lossy()).unwrap();
        let file_system = OsFileSystem::open(&dir_spec).unwrap();

        let record = file_system.lookup(&dir_spec).unwrap().unwrap();
        assert_eq!(record.stat().file_type, Some(FileType::Directory));

        let file_spec = PathSpec::os(dir.path().join("a.txt").to_string_lossy()).unwrap();
        let stat = file_system.lookup(&file_spec).unwrap().unwrap().stat();
        assert_eq!(stat.size, Some(5));
        assert_eq!(stat.file_type, Some(FileType::File));
        assert!(stat.modification_time.is_some());

        let mut children: Vec<String> = file_system
            .directory_entries(&dir_spec)
            .unwrap()
            .map(|child| child.unwrap().location().unwrap().to_string())
            .collect();
        children.sort();
        assert_eq!(children.len(), 2);
        assert!(children[0].ends_with("a.txt"));
        assert!(children[1].ends_with("sub"));

        let missing = PathSpec::os(dir.path().join("none").to_string_lossy()).unwrap();
        assert!(file_system.lookup(&missing).unwrap().is_none());
        assert!(!file_system.file_entry_exists(&missing));
    }

    #[cfg(unix)]
    #[test]
    fn test_root_and_parent() {
        let file_system = OsFileSystem::open(&PathSpec::os("/").unwrap()).unwrap();
        let root = file_system.root_path_spec().unwrap();
        assert!(file_system.is_root(&root));
        assert!(file_system.parent_path_spec(&root).unwrap().is_none());
        // A specification without a location is not an OS entry.
        assert!(!file_system.is_root(&PathSpec::data_range(0, 1, root.clone()).unwrap()));

        let nested = PathSpec::os("/usr/bin").unwrap();
        let parent = file_system.parent_path_spec(&nested).unwrap().unwrap();
        assert_eq!(parent.location(), Some("/usr"));
    }
}
