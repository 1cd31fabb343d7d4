//! # stackvfs
//!
//! A stackable virtual file system for reading layered evidence: files
//! inside archives inside encrypted containers inside host files.
//!
//! Every layer is described by a [`PathSpec`] node that owns the
//! description of the layer underneath it. The [`Resolver`] turns a chain
//! into an open stream or file system, opening each ancestor on the way and
//! sharing every open layer through a reference-counted [`Context`] cache,
//! so thousands of entry specifications that alias one archive keep a
//! single OS handle open.
//!
//! ## Quick Start
//!
//! ### Reading a File Inside a TAR Archive
//!
//! ```rust,no_run
//! use stackvfs::{Context, PathSpec, Resolver, Result};
//!
//! fn main() -> Result<()> {
//!     stackvfs::register_all();
//!     let context = Context::new();
//!
//!     let archive = PathSpec::os("/cases/evidence.tar")?;
//!     let syslog = PathSpec::tar("/var/log/syslog", archive)?;
//!
//!     let file_object = Resolver::open_file_object(&syslog, &context)?;
//!     let head = file_object.read(64)?;
//!     println!("{} of {} bytes", head.len(), file_object.size()?);
//!     Ok(())
//! }
//! ```
//!
//! ### Reading a File Inside a 7z Archive
//!
//! ```rust,no_run
//! use stackvfs::{Context, PathSpec, Resolver, Result};
//!
//! fn main() -> Result<()> {
//!     stackvfs::register_all();
//!     let context = Context::new();
//!
//!     let archive = PathSpec::os("/cases/logs.7z")?;
//!     let entry = Resolver::open_file_entry(&PathSpec::seven_z("/syslog", archive)?, &context)?;
//!     if let Some(entry) = entry {
//!         println!("modified {:?}", entry.stat()?.modification_time);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Reading an Encrypted Stream
//!
//! ```rust,no_run
//! # #[cfg(feature = "crypto")]
//! use stackvfs::{BlockCipherMode, Context, EncryptedStreamSpec, PathSpec, Resolver, Result};
//! use std::io::SeekFrom;
//!
//! # #[cfg(feature = "crypto")]
//! fn main() -> Result<()> {
//!     stackvfs::register_all();
//!     let context = Context::new();
//!
//!     let container = PathSpec::os("/cases/container.bin")?;
//!     let plaintext = PathSpec::encrypted_stream(
//!         EncryptedStreamSpec::new("aes")
//!             .key(b"This is a key123".to_vec())
//!             .cipher_mode(BlockCipherMode::Cbc)
//!             .initialization_vector(b"This is an IV456".to_vec()),
//!         container,
//!     )?;
//!
//!     let file_object = Resolver::open_file_object(&plaintext, &context)?;
//!     file_object.seek(SeekFrom::Start(5))?;
//!     println!("{:?}", file_object.read(3)?);
//!     Ok(())
//! }
//! # #[cfg(not(feature = "crypto"))]
//! # fn main() {}
//! ```
//!
//! ### Walking an Archive
//!
//! Directory listings are reconstructed from member names, so directories
//! the archive never recorded still appear:
//!
//! ```rust,no_run
//! use stackvfs::{Context, FileEntry, PathSpec, Resolver, Result};
//!
//! fn walk(entry: &FileEntry, depth: usize) -> Result<()> {
//!     println!("{}{}", "  ".repeat(depth), entry.name());
//!     for child in entry.sub_file_entries()? {
//!         walk(&child?, depth + 1)?;
//!     }
//!     Ok(())
//! }
//!
//! fn main() -> Result<()> {
//!     stackvfs::register_all();
//!     let context = Context::new();
//!     let root = PathSpec::tar("/", PathSpec::os("/cases/evidence.tar")?)?;
//!     let file_system = Resolver::open_file_system(&root, &context)?;
//!     walk(&file_system.get_root_file_entry()?, 0)
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `tar` | Yes | TAR archive streams and file systems |
//! | `sevenz` | Yes | 7z archive streams and file systems (Copy, LZMA, LZMA2) |
//! | `crypto` | Yes | AES, Blowfish and Triple-DES decrypters |
//!
//! ## Registration
//!
//! Path specification constructors, resolver helpers and decrypters live in
//! process-wide registries that start empty. Call [`register_all`] once at
//! start-up; further calls are no-ops.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod analyzer;
pub mod definitions;
pub mod encryption;
pub mod error;
pub mod file_io;
pub mod path;
pub mod resolver;
pub mod vfs;

mod sync;

pub use definitions::{BlockCipherMode, TypeIndicator};
pub use error::{Error, Result};
pub use path::{AttributeValue, Attributes, EncryptedStreamSpec, PathSpec, PathSpecFactory, PathSpecKind};

// Re-export resolution API at crate root for convenience
pub use resolver::{CacheKey, Context, ContextConfig, HelperRegistry, ResolverHelper, Resolver};

// Re-export stream API
pub use file_io::{FileIo, FileObject};

// Re-export file system API
pub use vfs::{Directory, FileEntry, FileSystem, FileSystemHandle, FileType, Stat, StatTime};

// Re-export encryption API
pub use encryption::{Decrypter, DecrypterOptions, EncryptionManager};

use std::sync::Once;

static REGISTER: Once = Once::new();

/// Populates the process-wide registries with every built-in kind.
///
/// Registers the path specification constructors, the resolver helpers
/// and, with the `crypto` feature, the AES, Blowfish and Triple-DES
/// decrypters. Safe to call any number of times.
pub fn register_all() {
    REGISTER.call_once(|| {
        if let Err(e) = PathSpecFactory::global().register_defaults() {
            log::warn!("path specification registration incomplete: {}", e);
        }
        if let Err(e) = HelperRegistry::global().register_defaults() {
            log::warn!("resolver helper registration incomplete: {}", e);
        }
        #[cfg(feature = "crypto")]
        if let Err(e) = EncryptionManager::global().register_defaults() {
            log::warn!("decrypter registration incomplete: {}", e);
        }
        log::debug!("registered built-in formats");
    });
}
