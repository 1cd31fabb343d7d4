//! The single-entry view of an encrypted stream.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{EntryRecord, FileSystem};
use crate::definitions::TypeIndicator;
use crate::path::{PathSpec, PathSpecKind};
use crate::resolver::{Context, Resolver};
use crate::{Error, Result};

/// A file system with one entry: the plaintext of an encrypted stream.
///
/// The entry is the root. It is a virtual file with no parent and no
/// children, addressed by the encrypted stream specification itself.
#[derive(Debug)]
pub struct EncryptedStreamFileSystem {
    path_spec: PathSpec,
    size: u64,
    open: AtomicBool,
}

impl EncryptedStreamFileSystem {
    /// Opens the view, validating the cipher parameters by opening the
    /// stream once through `context`.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        if !matches!(path_spec.kind(), PathSpecKind::EncryptedStream(_)) {
            return Err(Error::invalid_spec(format!(
                "expected an ENCRYPTED_STREAM path specification, got {}",
                path_spec.type_indicator()
            )));
        }
        let size = Resolver::open_file_object(path_spec, context)?.size()?;
        Ok(Self {
            path_spec: path_spec.clone(),
            size,
            open: AtomicBool::new(true),
        })
    }
}

impl FileSystem for EncryptedStreamFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::EncryptedStream
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
        Ok(self.path_spec.clone())
    }

    fn lookup(&self, path_spec: &PathSpec) -> Result<Option<EntryRecord>> {
        if path_spec == &self.path_spec || path_spec.comparable() == self.path_spec.comparable() {
            Ok(Some(EntryRecord::VirtualFile { size: self.size }))
        } else {
            Ok(None)
        }
    }

    fn directory_entries<'a>(
        &'a self,
        _path_spec: &PathSpec,
    ) -> Result<Box<dyn Iterator<Item = Result<PathSpec>> + 'a>> {
        Ok(Box::new(std::iter::empty()))
    }
}
