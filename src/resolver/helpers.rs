//! Per-kind resolver helpers.
//!
//! A [`ResolverHelper`] knows how to build the stream layer and, where the
//! kind has one, the file system of a single type indicator. The resolver
//! looks helpers up in a [`HelperRegistry`]; the built-in helpers are
//! registered by [`crate::register_all`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use super::Context;
use crate::definitions::TypeIndicator;
use crate::file_io::{DataRange, EncryptedStream, FileIo, OsFile};
use crate::path::PathSpec;
use crate::sync::{read_or_recover, write_or_recover};
use crate::vfs::{EncryptedStreamFileSystem, FileSystem, OsFileSystem};
use crate::{Error, Result};

/// Opens the layers of one type indicator.
pub trait ResolverHelper: Send + Sync {
    /// Returns the kind this helper opens.
    fn type_indicator(&self) -> TypeIndicator;

    /// Builds the stream layer of a path specification.
    ///
    /// Parents are resolved through `context`.
    fn open_file_io(&self, path_spec: &PathSpec, context: &Context) -> Result<Box<dyn FileIo>>;

    /// Builds the file system containing a path specification.
    ///
    /// Kinds without a hierarchical view keep the default, which reports
    /// [`Error::PathSpec`].
    fn open_file_system(
        &self,
        path_spec: &PathSpec,
        context: &Context,
    ) -> Result<Arc<dyn FileSystem>> {
        let _ = context;
        Err(Error::PathSpec(format!(
            "{} has no file system",
            path_spec.type_indicator()
        )))
    }
}

struct OsHelper;

impl ResolverHelper for OsHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Os
    }

    fn open_file_io(&self, path_spec: &PathSpec, _context: &Context) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(OsFile::open(path_spec)?))
    }

    fn open_file_system(
        &self,
        path_spec: &PathSpec,
        _context: &Context,
    ) -> Result<Arc<dyn FileSystem>> {
        Ok(Arc::new(OsFileSystem::open(path_spec)?))
    }
}

struct DataRangeHelper;

impl ResolverHelper for DataRangeHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::DataRange
    }

    fn open_file_io(&self, path_spec: &PathSpec, context: &Context) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(DataRange::open(path_spec, context)?))
    }
}

#[cfg(feature = "tar")]
struct TarHelper;

#[cfg(feature = "tar")]
impl ResolverHelper for TarHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Tar
    }

    fn open_file_io(&self, path_spec: &PathSpec, context: &Context) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(crate::file_io::TarFile::open(path_spec, context)?))
    }

    fn open_file_system(
        &self,
        path_spec: &PathSpec,
        context: &Context,
    ) -> Result<Arc<dyn FileSystem>> {
        Ok(Arc::new(crate::vfs::TarFileSystem::open(path_spec, context)?))
    }
}

#[cfg(feature = "sevenz")]
struct SevenZHelper;

#[cfg(feature = "sevenz")]
impl ResolverHelper for SevenZHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::SevenZ
    }

    fn open_file_io(&self, path_spec: &PathSpec, context: &Context) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(crate::file_io::SevenZFile::open(path_spec, context)?))
    }

    fn open_file_system(
        &self,
        path_spec: &PathSpec,
        context: &Context,
    ) -> Result<Arc<dyn FileSystem>> {
        Ok(Arc::new(crate::vfs::SevenZFileSystem::open(path_spec, context)?))
    }
}

struct EncryptedStreamHelper;

impl ResolverHelper for EncryptedStreamHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::EncryptedStream
    }

    fn open_file_io(&self, path_spec: &PathSpec, context: &Context) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(EncryptedStream::open(path_spec, context)?))
    }

    fn open_file_system(
        &self,
        path_spec: &PathSpec,
        context: &Context,
    ) -> Result<Arc<dyn FileSystem>> {
        Ok(Arc::new(EncryptedStreamFileSystem::open(path_spec, context)?))
    }
}

static GLOBAL: Lazy<HelperRegistry> = Lazy::new(HelperRegistry::new);

/// A lock-protected table from type indicator to helper.
#[derive(Default)]
pub struct HelperRegistry {
    helpers: RwLock<HashMap<TypeIndicator, Arc<dyn ResolverHelper>>>,
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<TypeIndicator> = read_or_recover(&self.helpers).keys().copied().collect();
        kinds.sort();
        f.debug_struct("HelperRegistry").field("kinds", &kinds).finish()
    }
}

impl HelperRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry used by [`Resolver`](super::Resolver).
    pub fn global() -> &'static HelperRegistry {
        &GLOBAL
    }

    /// Registers a helper under its type indicator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the kind already has a helper.
    pub fn register_helper(&self, helper: Arc<dyn ResolverHelper>) -> Result<()> {
        let type_indicator = helper.type_indicator();
        let mut helpers = write_or_recover(&self.helpers);
        if helpers.contains_key(&type_indicator) {
            return Err(Error::already_registered(type_indicator.as_str()));
        }
        helpers.insert(type_indicator, helper);
        Ok(())
    }

    /// Removes the helper of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if the kind has no helper.
    pub fn deregister_helper(&self, type_indicator: TypeIndicator) -> Result<()> {
        write_or_recover(&self.helpers)
            .remove(&type_indicator)
            .map(|_| ())
            .ok_or_else(|| Error::not_registered(type_indicator.as_str()))
    }

    /// Returns the helper of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if the kind has no helper.
    pub fn get_helper(&self, type_indicator: TypeIndicator) -> Result<Arc<dyn ResolverHelper>> {
        read_or_recover(&self.helpers)
            .get(&type_indicator)
            .cloned()
            .ok_or_else(|| Error::not_registered(type_indicator.as_str()))
    }

    /// Registers the helpers of every built-in kind.
    pub fn register_defaults(&self) -> Result<()> {
        self.register_helper(Arc::new(OsHelper))?;
        self.register_helper(Arc::new(DataRangeHelper))?;
        #[cfg(feature = "tar")]
        self.register_helper(Arc::new(TarHelper))?;
        #[cfg(feature = "sevenz")]
        self.register_helper(Arc::new(SevenZHelper))?;
        self.register_helper(Arc::new(EncryptedStreamHelper))?;
        Ok(())
    }
}
