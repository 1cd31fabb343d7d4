//! Turning path specifications into shared open resources.
//!
//! [`Resolver`] walks a path specification chain leaf to root, opening
//! every layer through the helper registered for its kind and caching each
//! one in a [`Context`]. Equal chains resolve to the same open instance:
//!
//! ```rust,no_run
//! use stackvfs::{Context, PathSpec, Resolver};
//!
//! # fn main() -> stackvfs::Result<()> {
//! stackvfs::register_all();
//! let context = Context::new();
//! let a = PathSpec::tar("/syslog", PathSpec::os("/cases/evidence.tar")?)?;
//! let b = PathSpec::tar("/syslog", PathSpec::os("/cases/evidence.tar")?)?;
//!
//! let first = Resolver::open_file_object(&a, &context)?;
//! let second = Resolver::open_file_object(&b, &context)?;
//! assert!(first.is_same_resource(&second));
//! assert_eq!(context.file_object_reference_count(&a), 2);
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
pub mod helpers;

use std::sync::{Arc, Mutex};

pub use config::{ContextConfig, DEFAULT_ENCRYPTED_BUFFER_SIZE};
pub use context::{CacheKey, Context, ResourceClass};
pub(crate) use context::{Lease, Resource};
pub use helpers::{HelperRegistry, ResolverHelper};

use crate::file_io::FileObject;
use crate::path::PathSpec;
use crate::vfs::{FileEntry, FileSystemHandle};
use crate::{Error, Result};

/// Entry points for opening resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    /// Opens the stream described by a path specification.
    ///
    /// On a cache hit the open instance is shared; otherwise the helper of
    /// the leaf's kind builds it, resolving parents through this same
    /// function.
    ///
    /// # Errors
    ///
    /// - [`Error::NotRegistered`] if a kind in the chain has no helper.
    /// - Whatever the layer that failed reports, unchanged.
    pub fn open_file_object(path_spec: &PathSpec, context: &Context) -> Result<FileObject> {
        let key = CacheKey::file_object(path_spec);
        let (resource, lease) = context.acquire(key, || {
            let helper = HelperRegistry::global().get_helper(path_spec.type_indicator())?;
            let io = helper.open_file_io(path_spec, context)?;
            Ok(Resource::FileIo(Arc::new(Mutex::new(io))))
        })?;
        match resource {
            Resource::FileIo(io) => Ok(FileObject::leased(io, lease)),
            Resource::FileSystem(_) => Err(Error::PathSpec(
                "cache entry holds a file system, not a stream".into(),
            )),
        }
    }

    /// Opens the file system containing a path specification.
    ///
    /// Every location inside one file system shares the instance.
    pub fn open_file_system(path_spec: &PathSpec, context: &Context) -> Result<FileSystemHandle> {
        let key = CacheKey::file_system(path_spec);
        let (resource, lease) = context.acquire(key, || {
            let helper = HelperRegistry::global().get_helper(path_spec.type_indicator())?;
            let file_system = helper.open_file_system(path_spec, context)?;
            Ok(Resource::FileSystem(file_system))
        })?;
        match resource {
            Resource::FileSystem(file_system) => {
                Ok(FileSystemHandle::leased(file_system, context, lease))
            }
            Resource::FileIo(_) => Err(Error::PathSpec(
                "cache entry holds a stream, not a file system".into(),
            )),
        }
    }

    /// Opens the file entry of a path specification, or `None` if the file
    /// system has no such entry.
    pub fn open_file_entry(path_spec: &PathSpec, context: &Context) -> Result<Option<FileEntry>> {
        let file_system = Self::open_file_system(path_spec, context)?;
        file_system.get_file_entry_by_path_spec(path_spec)
    }
}
