//! Error types for resolving and reading layered resources.
//!
//! This module provides the [`Error`] enum which represents all failure
//! modes of path specification construction, resolution, stream I/O and
//! archive navigation, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! Errors raised by a layer propagate unchanged through every layer stacked
//! on top of it, so matching on the variant tells you which concern failed:
//!
//! ```rust,no_run
//! use stackvfs::{Context, Error, PathSpec, Resolver};
//!
//! fn open(path: &str) -> stackvfs::Result<()> {
//!     stackvfs::register_all();
//!     let context = Context::new();
//!     let spec = PathSpec::os(path)?;
//!     match Resolver::open_file_object(&spec, &context) {
//!         Ok(file_object) => println!("{} bytes", file_object.size()?),
//!         Err(Error::Access { location, .. }) => eprintln!("Permission denied: {}", location),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Existence questions ("does this entry exist?") are answered with `bool`
//! or `Option` and never produce an error.

use std::io;

/// The main error type of the crate.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Construction | [`InvalidSpec`][Self::InvalidSpec] | Bad path specification or cipher parameters |
/// | Registry | [`AlreadyRegistered`][Self::AlreadyRegistered], [`NotRegistered`][Self::NotRegistered] | Registration misuse |
/// | Lifecycle | [`NotOpen`][Self::NotOpen] | Use after close |
/// | Stream | [`InvalidOffset`][Self::InvalidOffset] | Negative seek result |
/// | Resolution | [`PathSpec`][Self::PathSpec], [`EntryNotFound`][Self::EntryNotFound] | Chain cannot be opened |
/// | Back end | [`Access`][Self::Access], [`BackEnd`][Self::BackEnd], [`Io`][Self::Io] | Underlying data or OS rejected the request |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred in an underlying resource.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path specification or cipher configuration is malformed.
    ///
    /// Raised at construction time: a required parent is missing, a
    /// forbidden parent is present, an attribute is unknown, missing or of
    /// the wrong type, or a cipher parameter (key length, IV length,
    /// segment size) is out of range.
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// A registry already has an entry under this name.
    #[error("Already registered: {name}")]
    AlreadyRegistered {
        /// The type indicator or method name.
        name: String,
    },

    /// A registry has no entry under this name.
    #[error("Not registered: {name}")]
    NotRegistered {
        /// The type indicator or method name.
        name: String,
    },

    /// The resource was closed or never opened.
    #[error("Resource is not open")]
    NotOpen,

    /// A seek resolved to a negative offset.
    #[error("Invalid offset: {offset}")]
    InvalidOffset {
        /// The offending resulting offset.
        offset: i128,
    },

    /// A path specification chain cannot be opened as requested.
    ///
    /// Typical causes are an unsupported encryption method or a kind that
    /// has no file system view.
    #[error("Path specification error: {0}")]
    PathSpec(String),

    /// Permission was denied opening a root resource.
    #[error("Access denied: {location}")]
    Access {
        /// The location that could not be opened.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The underlying container or cipher rejected the data.
    #[error("Back-end error: {0}")]
    BackEnd(String),

    /// A location inside a file system does not exist.
    ///
    /// Only raised when a stream is requested for a missing entry; lookups
    /// return `None` instead.
    #[error("Entry not found: {location}")]
    EntryNotFound {
        /// The location that was not found.
        location: String,
    },
}

impl Error {
    /// Returns `true` if this error comes from registry misuse.
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyRegistered { .. } | Error::NotRegistered { .. }
        )
    }

    /// Returns `true` if permission was denied somewhere in the stack.
    pub fn is_access_error(&self) -> bool {
        match self {
            Error::Access { .. } => true,
            Error::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Returns `true` if the error was raised while validating a construction.
    pub fn is_invalid_spec(&self) -> bool {
        matches!(self, Error::InvalidSpec(_))
    }

    /// Creates an InvalidSpec error.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Error::InvalidSpec(reason.into())
    }

    /// Creates a BackEnd error.
    pub fn back_end(reason: impl Into<String>) -> Self {
        Error::BackEnd(reason.into())
    }

    /// Creates an AlreadyRegistered error.
    pub fn already_registered(name: impl Into<String>) -> Self {
        Error::AlreadyRegistered { name: name.into() }
    }

    /// Creates a NotRegistered error.
    pub fn not_registered(name: impl Into<String>) -> Self {
        Error::NotRegistered { name: name.into() }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Access { source, .. } => source,
            Error::NotOpen => io::Error::new(io::ErrorKind::NotConnected, err),
            Error::InvalidOffset { .. } | Error::InvalidSpec(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            Error::EntryNotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            Error::BackEnd(_) => io::Error::new(io::ErrorKind::InvalidData, err),
            other => io::Error::other(other),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
