//! Shared identifiers: format type indicators, cipher modes and method names.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Name of the AES encryption method.
pub const ENCRYPTION_METHOD_AES: &str = "aes";
/// Name of the Blowfish encryption method.
pub const ENCRYPTION_METHOD_BLOWFISH: &str = "blowfish";
/// Name of the Triple-DES encryption method.
pub const ENCRYPTION_METHOD_DES3: &str = "des3";

/// Format kind of a path specification node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum TypeIndicator {
    /// A file in the host operating system.
    Os,
    /// A byte range of the parent stream.
    DataRange,
    /// A member of a TAR archive.
    Tar,
    /// A block-cipher encrypted stream.
    EncryptedStream,
    /// A member of a 7z archive.
    SevenZ,
}

impl TypeIndicator {
    /// All known type indicators.
    pub const ALL: [TypeIndicator; 5] = [
        TypeIndicator::Os,
        TypeIndicator::DataRange,
        TypeIndicator::Tar,
        TypeIndicator::EncryptedStream,
        TypeIndicator::SevenZ,
    ];

    /// Returns the canonical upper-case name used in comparables.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeIndicator::Os => "OS",
            TypeIndicator::DataRange => "DATA_RANGE",
            TypeIndicator::Tar => "TAR",
            TypeIndicator::EncryptedStream => "ENCRYPTED_STREAM",
            TypeIndicator::SevenZ => "SEVEN_Z",
        }
    }

    /// Returns `true` if path specifications of this kind must have a parent.
    pub fn requires_parent(&self) -> bool {
        !matches!(self, TypeIndicator::Os)
    }

    /// Returns `true` if this kind exposes a hierarchy of entries
    /// addressed by a `location` attribute.
    pub fn has_locations(&self) -> bool {
        matches!(
            self,
            TypeIndicator::Os | TypeIndicator::Tar | TypeIndicator::SevenZ
        )
    }
}

impl fmt::Display for TypeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeIndicator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeIndicator::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_spec(format!("unknown type indicator: {}", s)))
    }
}

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockCipherMode {
    /// Cipher block chaining.
    Cbc,
    /// Cipher feedback with a configurable segment size.
    Cfb,
    /// Electronic codebook.
    #[default]
    Ecb,
    /// Output feedback.
    Ofb,
}

impl BlockCipherMode {
    /// Returns the lower-case name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCipherMode::Cbc => "cbc",
            BlockCipherMode::Cfb => "cfb",
            BlockCipherMode::Ecb => "ecb",
            BlockCipherMode::Ofb => "ofb",
        }
    }

    /// Returns `true` if the mode chains state and therefore needs an IV.
    pub fn requires_iv(&self) -> bool {
        !matches!(self, BlockCipherMode::Ecb)
    }
}

impl fmt::Display for BlockCipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockCipherMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cbc" => Ok(BlockCipherMode::Cbc),
            "cfb" => Ok(BlockCipherMode::Cfb),
            "ecb" => Ok(BlockCipherMode::Ecb),
            "ofb" => Ok(BlockCipherMode::Ofb),
            _ => Err(Error::invalid_spec(format!(
                "unsupported block cipher mode: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_indicator_names() {
        for indicator in TypeIndicator::ALL {
            assert_eq!(indicator.as_str().parse::<TypeIndicator>().unwrap(), indicator);
        }
        assert!("ZIP".parse::<TypeIndicator>().is_err());
    }

    #[test]
    fn test_parent_requirements() {
        assert!(!TypeIndicator::Os.requires_parent());
        assert!(TypeIndicator::Tar.requires_parent());
        assert!(TypeIndicator::EncryptedStream.requires_parent());
        assert!(TypeIndicator::DataRange.requires_parent());
        assert!(TypeIndicator::SevenZ.requires_parent());
        assert!(TypeIndicator::SevenZ.has_locations());
        assert_eq!("SEVEN_Z".parse::<TypeIndicator>().unwrap(), TypeIndicator::SevenZ);
    }

    #[test]
    fn test_block_cipher_mode_parse() {
        assert_eq!("CBC".parse::<BlockCipherMode>().unwrap(), BlockCipherMode::Cbc);
        assert_eq!("ofb".parse::<BlockCipherMode>().unwrap(), BlockCipherMode::Ofb);
        assert!(matches!(
            "ctr".parse::<BlockCipherMode>(),
            Err(Error::InvalidSpec(_))
        ));
        assert_eq!(BlockCipherMode::default(), BlockCipherMode::Ecb);
        assert!(!BlockCipherMode::Ecb.requires_iv());
        assert!(BlockCipherMode::Cfb.requires_iv());
    }
}
