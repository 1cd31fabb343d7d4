use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::{Decrypter, DecrypterOptions};
use crate::sync::{read_or_recover, write_or_recover};
use crate::{Error, Result};

/// Builds a decrypter from options, validating them.
pub type DecrypterFactory = fn(&DecrypterOptions) -> Result<Box<dyn Decrypter>>;

static GLOBAL: Lazy<EncryptionManager> = Lazy::new(EncryptionManager::new);

/// Registry from encryption method name to decrypter factory.
///
/// Method names are matched case-insensitively.
#[derive(Debug, Default)]
pub struct EncryptionManager {
    factories: RwLock<HashMap<String, DecrypterFactory>>,
}

impl EncryptionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide manager consulted by encrypted streams.
    pub fn global() -> &'static EncryptionManager {
        &GLOBAL
    }

    /// Registers a decrypter factory for a method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the method is bound.
    pub fn register_decrypter(&self, method: &str, factory: DecrypterFactory) -> Result<()> {
        let method = method.to_ascii_lowercase();
        let mut factories = write_or_recover(&self.factories);
        if factories.contains_key(&method) {
            return Err(Error::already_registered(method));
        }
        factories.insert(method, factory);
        Ok(())
    }

    /// Removes the decrypter factory of a method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if the method is unbound.
    pub fn deregister_decrypter(&self, method: &str) -> Result<()> {
        let method = method.to_ascii_lowercase();
        match write_or_recover(&self.factories).remove(&method) {
            Some(_) => Ok(()),
            None => Err(Error::not_registered(method)),
        }
    }

    /// Creates a decrypter for a method.
    ///
    /// Returns `Ok(None)` for an unknown method and the factory's error for
    /// invalid options.
    pub fn get_decrypter(
        &self,
        method: &str,
        options: &DecrypterOptions,
    ) -> Result<Option<Box<dyn Decrypter>>> {
        let factory = read_or_recover(&self.factories)
            .get(&method.to_ascii_lowercase())
            .copied();
        factory.map(|factory| factory(options)).transpose()
    }

    /// Returns the registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = read_or_recover(&self.factories).keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Registers the built-in AES, Blowfish and Triple-DES decrypters.
    #[cfg(feature = "crypto")]
    pub fn register_defaults(&self) -> Result<()> {
        use crate::definitions::{
            ENCRYPTION_METHOD_AES, ENCRYPTION_METHOD_BLOWFISH, ENCRYPTION_METHOD_DES3,
        };
        use crate::encryption::block;

        self.register_decrypter(ENCRYPTION_METHOD_AES, block::new_aes_decrypter)?;
        self.register_decrypter(ENCRYPTION_METHOD_BLOWFISH, block::new_blowfish_decrypter)?;
        self.register_decrypter(ENCRYPTION_METHOD_DES3, block::new_des3_decrypter)?;
        Ok(())
    }
}
