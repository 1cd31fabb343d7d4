//! Stat snapshots of file entries.
//!
//! Every field of a [`Stat`] is optional: a value absent from the
//! underlying record stays `None` and is never defaulted to something that
//! merely looks plausible.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Type classification of a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic or hard link.
    Link,
    /// Character or block device.
    Device,
    /// Named pipe.
    Pipe,
    /// Socket.
    Socket,
}

/// A timestamp split into whole seconds since the Unix epoch and an
/// optional sub-second part.
///
/// Formats that only store whole seconds, such as TAR headers, leave
/// `nanoseconds` as `None`.
///
/// # Example
///
/// ```rust
/// use stackvfs::vfs::StatTime;
///
/// let mtime = StatTime::from_seconds(1343166324);
/// assert_eq!(mtime.seconds, 1343166324);
/// assert_eq!(mtime.nanoseconds, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatTime {
    /// Seconds since 1970-01-01 UTC; negative before the epoch.
    pub seconds: i64,
    /// Nanoseconds within the second, when the format records them.
    pub nanoseconds: Option<u32>,
}

impl StatTime {
    /// Creates a timestamp with whole-second precision.
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds: None,
        }
    }

    /// Creates a timestamp with nanosecond precision.
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds: Some(nanoseconds),
        }
    }

    /// Converts a `SystemTime`, keeping its sub-second part.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let d = e.duration();
                if d.subsec_nanos() == 0 {
                    Self::new(-(d.as_secs() as i64), 0)
                } else {
                    Self::new(-(d.as_secs() as i64) - 1, 1_000_000_000 - d.subsec_nanos())
                }
            }
        }
    }

    /// Converts to a `SystemTime`; a missing sub-second part counts as zero.
    pub fn as_system_time(&self) -> SystemTime {
        let nanos = self.nanoseconds.unwrap_or(0);
        if self.seconds >= 0 {
            UNIX_EPOCH + Duration::new(self.seconds as u64, nanos)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.seconds.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
        }
    }
}

/// Metadata snapshot of a file entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    /// Size in bytes.
    pub size: Option<u64>,
    /// Last access time.
    pub access_time: Option<StatTime>,
    /// Creation time.
    pub creation_time: Option<StatTime>,
    /// Last modification time.
    pub modification_time: Option<StatTime>,
    /// Permission bits.
    pub mode: Option<u32>,
    /// Owner identifier.
    pub uid: Option<u64>,
    /// Group identifier.
    pub gid: Option<u64>,
    /// Type classification; `None` when the record is not classifiable.
    pub file_type: Option<FileType>,
}

impl Stat {
    /// A stat carrying only a type.
    pub fn of_type(file_type: FileType) -> Self {
        Self {
            file_type: Some(file_type),
            ..Self::default()
        }
    }
}
