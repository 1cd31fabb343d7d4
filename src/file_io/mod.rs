//! Seekable, readable streams and the handles that share them.
//!
//! Every layer implements [`FileIo`]. Callers never hold a layer directly;
//! they hold a [`FileObject`], a handle whose tenure decides what closing
//! it means:
//!
//! - a handle obtained from the resolver is *leased* from the context cache
//!   and closing it releases one reference;
//! - a handle created with [`FileObject::new`] *owns* its layer and closing
//!   it closes the layer;
//! - a handle created with [`FileObject::share`] *borrows* the layer and
//!   closing it leaves the layer open.
//!
//! A layer that resolved its parent itself holds a leased parent handle; a
//! layer built around a caller-supplied handle holds a borrowed view, so
//! closing the layer never closes a parent it did not open.

pub mod data_range;
pub mod encrypted_stream;
pub mod memory;
pub mod os;
#[cfg(feature = "sevenz")]
pub mod seven_z;
#[cfg(feature = "tar")]
pub mod tar;

use std::fmt;
use std::io::{self, Read, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::resolver::Lease;
use crate::sync::lock_or_recover;
use crate::{Error, Result};

pub use data_range::DataRange;
pub use encrypted_stream::EncryptedStream;
pub use memory::MemoryFile;
pub use os::OsFile;
#[cfg(feature = "sevenz")]
pub use seven_z::SevenZFile;
#[cfg(feature = "tar")]
pub use tar::TarFile;

/// A layer of a stacked stream.
///
/// Implementations fetch their size once when opened. After
/// [`close`](FileIo::close) every other operation fails with
/// [`Error::NotOpen`].
pub trait FileIo: Send {
    /// Reads into `buf` from the current offset.
    ///
    /// Fills `buf` completely unless the end of the stream is reached;
    /// returns 0 at or past the end.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Moves the current offset. Offsets past the end are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] if the result would be negative.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Returns the current offset.
    fn offset(&self) -> Result<u64>;

    /// Returns the size of the stream.
    fn size(&self) -> Result<u64>;

    /// Closes the layer. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;

    /// Returns `true` until the layer is closed.
    fn is_open(&self) -> bool;
}

/// A layer shared between handles.
pub type SharedFileIo = Arc<Mutex<Box<dyn FileIo>>>;

/// Resolves a seek request against the current offset and size.
pub(crate) fn resolve_seek(current: u64, size: u64, pos: SeekFrom) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => i128::from(offset),
        SeekFrom::Current(delta) => i128::from(current) + i128::from(delta),
        SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    u64::try_from(target).map_err(|_| Error::InvalidOffset { offset: target })
}

/// Reads from `reader` until `buf` is full or the reader is exhausted.
pub(crate) fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

enum Tenure {
    Leased(Lease),
    Owned,
    Borrowed,
    Closed,
}

/// A handle to an open stream.
///
/// All operations take `&self`; the layer is guarded by a mutex so each
/// call observes and updates the stream's offset atomically. Handles to a
/// cached layer share its offset; use [`read_at`](FileObject::read_at) for
/// positioned reads that do not depend on it.
pub struct FileObject {
    io: SharedFileIo,
    tenure: Tenure,
}

impl fmt::Debug for FileObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenure = match &self.tenure {
            Tenure::Leased(_) => "leased",
            Tenure::Owned => "owned",
            Tenure::Borrowed => "borrowed",
            Tenure::Closed => "closed",
        };
        f.debug_struct("FileObject")
            .field("tenure", &tenure)
            .finish_non_exhaustive()
    }
}

impl FileObject {
    /// Wraps a layer in a handle that owns it.
    pub fn new<T: FileIo + 'static>(io: T) -> Self {
        Self::from_boxed(Box::new(io))
    }

    /// Wraps a boxed layer in a handle that owns it.
    pub fn from_boxed(io: Box<dyn FileIo>) -> Self {
        Self {
            io: Arc::new(Mutex::new(io)),
            tenure: Tenure::Owned,
        }
    }

    pub(crate) fn leased(io: SharedFileIo, lease: Lease) -> Self {
        Self {
            io,
            tenure: Tenure::Leased(lease),
        }
    }

    /// Returns a view of the same layer that never closes it.
    pub fn share(&self) -> Result<FileObject> {
        if matches!(self.tenure, Tenure::Closed) {
            return Err(Error::NotOpen);
        }
        Ok(Self {
            io: Arc::clone(&self.io),
            tenure: Tenure::Borrowed,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn FileIo>>> {
        if matches!(self.tenure, Tenure::Closed) {
            return Err(Error::NotOpen);
        }
        Ok(lock_or_recover(&self.io))
    }

    /// Reads up to `size` bytes from the current offset.
    ///
    /// Returns fewer bytes only at the end of the stream.
    pub fn read(&self, size: usize) -> Result<Vec<u8>> {
        let mut io = self.lock()?;
        let remaining = io.size()?.saturating_sub(io.offset()?);
        let len = usize::try_from(remaining).map_or(size, |r| r.min(size));
        let mut buf = vec![0u8; len];
        let n = io.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Reads into `buf` from the current offset.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.lock()?.read(buf)
    }

    /// Seeks to `offset` and reads into `buf` as one atomic operation.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut io = self.lock()?;
        io.seek(SeekFrom::Start(offset))?;
        io.read(buf)
    }

    /// Reads the whole stream from offset 0.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut io = self.lock()?;
        let size = io.size()?;
        io.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; usize::try_from(size).map_err(|_| Error::back_end("stream too large"))?];
        let n = io.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Moves the current offset.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.lock()?.seek(pos)
    }

    /// Returns the current offset.
    pub fn offset(&self) -> Result<u64> {
        self.lock()?.offset()
    }

    /// Returns the stream size.
    pub fn size(&self) -> Result<u64> {
        self.lock()?.size()
    }

    /// Returns `true` if the handle and its layer are open.
    pub fn is_open(&self) -> bool {
        !matches!(self.tenure, Tenure::Closed) && lock_or_recover(&self.io).is_open()
    }

    /// Returns `true` if both handles refer to the same layer instance.
    pub fn is_same_resource(&self, other: &FileObject) -> bool {
        Arc::ptr_eq(&self.io, &other.io)
    }

    /// Closes the handle.
    ///
    /// A leased handle releases its cache reference, an owning handle
    /// closes the layer and a borrowed view only detaches. Closing twice
    /// is not an error.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.tenure, Tenure::Closed) {
            Tenure::Leased(lease) => {
                drop(lease);
                Ok(())
            }
            Tenure::Owned => lock_or_recover(&self.io).close(),
            Tenure::Borrowed | Tenure::Closed => Ok(()),
        }
    }
}

impl Drop for FileObject {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("failed to close dropped file object: {}", e);
        }
    }
}

impl Read for FileObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl io::Seek for FileObject {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        FileObject::seek(self, pos).map_err(io::Error::from)
    }
}
