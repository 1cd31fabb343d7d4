//! Decrypters for block-cipher encrypted streams.
//!
//! A [`Decrypter`] turns ciphertext into plaintext in units of its
//! [`ciphertext_multiple`](Decrypter::ciphertext_multiple): callers hand it a
//! growing buffer and it consumes the largest whole multiple at the front,
//! leaving any remainder for the next call. Chained modes carry their state
//! across calls, so a decrypter must see the ciphertext strictly in order.
//!
//! Decrypters are looked up by method name through the
//! [`EncryptionManager`].

#[cfg(feature = "crypto")]
pub mod block;
mod manager;

use std::fmt;

use crate::Result;
use crate::definitions::BlockCipherMode;
use crate::path::EncryptedStreamSpec;

pub use manager::{DecrypterFactory, EncryptionManager};

/// Sequential decrypter for one stream.
pub trait Decrypter: Send {
    /// Returns the encryption method name.
    fn encryption_method(&self) -> &str;

    /// Returns the number of ciphertext bytes consumed per unit.
    fn ciphertext_multiple(&self) -> usize;

    /// Decrypts the largest whole multiple at the front of `encrypted`.
    ///
    /// The consumed bytes are removed from `encrypted`; the remainder stays
    /// in place for the next call.
    fn decrypt(&mut self, encrypted: &mut Vec<u8>) -> Result<Vec<u8>>;
}

/// Parameters passed to a decrypter factory.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DecrypterOptions {
    /// Cipher key.
    pub key: Option<Vec<u8>>,
    /// Block cipher mode; ECB when absent.
    pub cipher_mode: Option<BlockCipherMode>,
    /// Initialization vector.
    pub initialization_vector: Option<Vec<u8>>,
    /// CFB segment size in bits; 8 when absent.
    pub segment_size: Option<u32>,
}

impl DecrypterOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key.
    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the block cipher mode.
    pub fn cipher_mode(mut self, mode: BlockCipherMode) -> Self {
        self.cipher_mode = Some(mode);
        self
    }

    /// Sets the initialization vector.
    pub fn initialization_vector(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.initialization_vector = Some(iv.into());
        self
    }

    /// Sets the CFB segment size in bits.
    pub fn segment_size(mut self, bits: u32) -> Self {
        self.segment_size = Some(bits);
        self
    }
}

impl From<&EncryptedStreamSpec> for DecrypterOptions {
    fn from(spec: &EncryptedStreamSpec) -> Self {
        Self {
            key: spec.key.clone(),
            cipher_mode: spec.cipher_mode,
            initialization_vector: spec.initialization_vector.clone(),
            segment_size: spec.segment_size,
        }
    }
}

impl fmt::Debug for DecrypterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecrypterOptions")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("cipher_mode", &self.cipher_mode)
            .field("initialization_vector", &self.initialization_vector)
            .field("segment_size", &self.segment_size)
            .finish()
    }
}
