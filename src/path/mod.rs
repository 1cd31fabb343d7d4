//! Path specifications: immutable, parent-linked descriptors of layered resources.
//!
//! A [`PathSpec`] names one layer (an OS file, a byte range, a TAR or 7z
//! member, an encrypted stream) and exclusively owns the specification of the layer
//! underneath it. Chains are built leaf-last:
//!
//! ```rust
//! use stackvfs::PathSpec;
//!
//! # fn main() -> stackvfs::Result<()> {
//! let os = PathSpec::os("/cases/evidence.tar")?;
//! let member = PathSpec::tar("/var/log/syslog", os)?;
//!
//! assert_eq!(
//!     member.comparable(),
//!     "type: OS, location: /cases/evidence.tar\ntype: TAR, location: /var/log/syslog\n"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! The [`comparable`](PathSpec::comparable) string is the identity used by
//! the resolver cache: two chains with equal comparables denote the same
//! resource.

pub mod factory;

use std::collections::BTreeMap;
use std::fmt;

use crate::definitions::{BlockCipherMode, TypeIndicator};
use crate::{Error, Result};

pub use factory::PathSpecFactory;

/// Path separator used by locations inside file systems.
pub const LOCATION_SEPARATOR: &str = "/";

const ATTR_LOCATION: &str = "location";
const ATTR_RANGE_OFFSET: &str = "range_offset";
const ATTR_RANGE_SIZE: &str = "range_size";
const ATTR_ENCRYPTION_METHOD: &str = "encryption_method";
const ATTR_KEY: &str = "key";
const ATTR_BLOCK_CIPHER_MODE: &str = "block_cipher_mode";
const ATTR_IV: &str = "iv";
const ATTR_SEGMENT_SIZE: &str = "segment_size";

/// A single attribute value of a path specification node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// A textual value such as a location or method name.
    Text(String),
    /// Raw bytes such as a key or IV, rendered as lower-case hex.
    Bytes(Vec<u8>),
    /// An unsigned integer such as an offset or size.
    Integer(u64),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Bytes(b) => f.write_str(&hex::encode(b)),
            AttributeValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        AttributeValue::Bytes(value.to_vec())
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::Integer(value)
    }
}

/// Attributes of one node, sorted by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Parameters of an encrypted stream layer.
///
/// Only the method name is required; the remaining parameters are checked
/// against the cipher when the stream is opened.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncryptedStreamSpec {
    /// Encryption method name, such as `aes`.
    pub encryption_method: String,
    /// Cipher key.
    pub key: Option<Vec<u8>>,
    /// Block cipher mode; ECB when absent.
    pub cipher_mode: Option<BlockCipherMode>,
    /// Initialization vector for chained modes.
    pub initialization_vector: Option<Vec<u8>>,
    /// CFB segment size in bits.
    pub segment_size: Option<u32>,
}

impl EncryptedStreamSpec {
    /// Creates parameters for the given method with nothing else set.
    pub fn new(encryption_method: impl Into<String>) -> Self {
        Self {
            encryption_method: encryption_method.into(),
            key: None,
            cipher_mode: None,
            initialization_vector: None,
            segment_size: None,
        }
    }

    /// Sets the cipher key.
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

impl fmt::Debug for EncryptedStreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStreamSpec")
            .field("encryption_method", &self.encryption_method)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("cipher_mode", &self.cipher_mode)
            .field("initialization_vector", &self.initialization_vector)
            .field("segment_size", &self.segment_size)
            .finish()
    }
}

/// Format-specific content of a path specification node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PathSpecKind {
    /// A file or directory of the host operating system.
    Os {
        /// Host path.
        location: String,
    },
    /// A window of the parent stream.
    DataRange {
        /// First byte of the window in the parent.
        range_offset: u64,
        /// Length of the window.
        range_size: u64,
    },
    /// A member of a TAR archive stored in the parent stream.
    Tar {
        /// Absolute location inside the archive, `/` for the root.
        location: String,
    },
    /// The plaintext of a block-cipher encrypted parent stream.
    EncryptedStream(EncryptedStreamSpec),
    /// A member of a 7z archive stored in the parent stream.
    SevenZ {
        /// Absolute location inside the archive, `/` for the root.
        location: String,
    },
}

impl PathSpecKind {
    /// Returns the type indicator of this kind.
    pub fn type_indicator(&self) -> TypeIndicator {
        match self {
            PathSpecKind::Os { .. } => TypeIndicator::Os,
            PathSpecKind::DataRange { .. } => TypeIndicator::DataRange,
            PathSpecKind::Tar { .. } => TypeIndicator::Tar,
            PathSpecKind::EncryptedStream(_) => TypeIndicator::EncryptedStream,
            PathSpecKind::SevenZ { .. } => TypeIndicator::SevenZ,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            PathSpecKind::Os { location } => {
                if location.is_empty() {
                    return Err(Error::invalid_spec("OS location must not be empty"));
                }
            }
            PathSpecKind::DataRange {
                range_offset,
                range_size,
            } => {
                if range_offset.checked_add(*range_size).is_none() {
                    return Err(Error::invalid_spec(format!(
                        "data range {}+{} overflows",
                        range_offset, range_size
                    )));
                }
            }
            PathSpecKind::Tar { location } | PathSpecKind::SevenZ { location } => {
                if !location.starts_with(LOCATION_SEPARATOR) {
                    return Err(Error::invalid_spec(format!(
                        "{} location must be absolute: {}",
                        self.type_indicator(),
                        location
                    )));
                }
            }
            PathSpecKind::EncryptedStream(spec) => {
                if spec.encryption_method.is_empty() {
                    return Err(Error::invalid_spec("encryption method must not be empty"));
                }
            }
        }
        Ok(())
    }

    /// Renders the attributes of this node.
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        match self {
            PathSpecKind::Os { location }
            | PathSpecKind::Tar { location }
            | PathSpecKind::SevenZ { location } => {
                attributes.insert(ATTR_LOCATION.into(), location.as_str().into());
            }
            PathSpecKind::DataRange {
                range_offset,
                range_size,
            } => {
                attributes.insert(ATTR_RANGE_OFFSET.into(), (*range_offset).into());
                attributes.insert(ATTR_RANGE_SIZE.into(), (*range_size).into());
            }
            PathSpecKind::EncryptedStream(spec) => {
                attributes.insert(
                    ATTR_ENCRYPTION_METHOD.into(),
                    spec.encryption_method.as_str().into(),
                );
                if let Some(key) = &spec.key {
                    attributes.insert(ATTR_KEY.into(), key.as_slice().into());
                }
                if let Some(mode) = spec.cipher_mode {
                    attributes.insert(ATTR_BLOCK_CIPHER_MODE.into(), mode.as_str().into());
                }
                if let Some(iv) = &spec.initialization_vector {
                    attributes.insert(ATTR_IV.into(), iv.as_slice().into());
                }
                if let Some(bits) = spec.segment_size {
                    attributes.insert(ATTR_SEGMENT_SIZE.into(), u64::from(bits).into());
                }
            }
        }
        attributes
    }

    /// Builds a kind from a generic attribute map, rejecting unknown keys.
    pub fn from_attributes(type_indicator: TypeIndicator, attributes: Attributes) -> Result<Self> {
        let mut reader = AttributeReader::new(type_indicator, attributes);
        let kind = match type_indicator {
            TypeIndicator::Os => PathSpecKind::Os {
                location: reader.required_text(ATTR_LOCATION)?,
            },
            TypeIndicator::DataRange => PathSpecKind::DataRange {
                range_offset: reader.required_integer(ATTR_RANGE_OFFSET)?,
                range_size: reader.required_integer(ATTR_RANGE_SIZE)?,
            },
            TypeIndicator::Tar => PathSpecKind::Tar {
                location: reader.required_text(ATTR_LOCATION)?,
            },
            TypeIndicator::SevenZ => PathSpecKind::SevenZ {
                location: reader.required_text(ATTR_LOCATION)?,
            },
            TypeIndicator::EncryptedStream => {
                let encryption_method = reader.required_text(ATTR_ENCRYPTION_METHOD)?;
                let cipher_mode = reader
                    .text(ATTR_BLOCK_CIPHER_MODE)?
                    .map(|mode| mode.parse::<BlockCipherMode>())
                    .transpose()?;
                let segment_size = reader
                    .integer(ATTR_SEGMENT_SIZE)?
                    .map(|bits| {
                        u32::try_from(bits).map_err(|_| {
                            Error::invalid_spec(format!("segment size out of range: {}", bits))
                        })
                    })
                    .transpose()?;
                PathSpecKind::EncryptedStream(EncryptedStreamSpec {
                    encryption_method,
                    key: reader.bytes(ATTR_KEY)?,
                    cipher_mode,
                    initialization_vector: reader.bytes(ATTR_IV)?,
                    segment_size,
                })
            }
        };
        reader.finish()?;
        Ok(kind)
    }
}

/// Consumes attributes by name and reports any left over.
struct AttributeReader {
    type_indicator: TypeIndicator,
    attributes: Attributes,
}

impl AttributeReader {
    fn new(type_indicator: TypeIndicator, attributes: Attributes) -> Self {
        Self {
            type_indicator,
            attributes,
        }
    }

    fn wrong_type(&self, name: &str, expected: &str) -> Error {
        Error::invalid_spec(format!(
            "{} attribute {} must be {}",
            self.type_indicator, name, expected
        ))
    }

    fn missing(&self, name: &str) -> Error {
        Error::invalid_spec(format!(
            "{} requires attribute {}",
            self.type_indicator, name
        ))
    }

    fn text(&mut self, name: &str) -> Result<Option<String>> {
        match self.attributes.remove(name) {
            None => Ok(None),
            Some(AttributeValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(self.wrong_type(name, "text")),
        }
    }

    fn bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.attributes.remove(name) {
            None => Ok(None),
            Some(AttributeValue::Bytes(b)) => Ok(Some(b)),
            Some(_) => Err(self.wrong_type(name, "bytes")),
        }
    }

    fn integer(&mut self, name: &str) -> Result<Option<u64>> {
        match self.attributes.remove(name) {
            None => Ok(None),
            Some(AttributeValue::Integer(n)) => Ok(Some(n)),
            Some(_) => Err(self.wrong_type(name, "an integer")),
        }
    }

    fn required_text(&mut self, name: &str) -> Result<String> {
        self.text(name)?.ok_or_else(|| self.missing(name))
    }

    fn required_integer(&mut self, name: &str) -> Result<u64> {
        self.integer(name)?.ok_or_else(|| self.missing(name))
    }

    fn finish(self) -> Result<()> {
        if self.attributes.is_empty() {
            return Ok(());
        }
        let unknown: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        Err(Error::invalid_spec(format!(
            "unsupported {} attributes: {}",
            self.type_indicator,
            unknown.join(", ")
        )))
    }
}

/// An immutable node of a path specification chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
    kind: PathSpecKind,
    parent: Option<Box<PathSpec>>,
}

impl PathSpec {
    /// Creates a node, enforcing the parent rule of its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] if a required parent is missing, a
    /// forbidden parent is present, or an attribute value is malformed.
    pub fn new(kind: PathSpecKind, parent: Option<PathSpec>) -> Result<Self> {
        let type_indicator = kind.type_indicator();
        match (type_indicator.requires_parent(), parent.is_some()) {
            (true, false) => {
                return Err(Error::invalid_spec(format!(
                    "{} path specification requires a parent",
                    type_indicator
                )));
            }
            (false, true) => {
                return Err(Error::invalid_spec(format!(
                    "{} path specification does not support a parent",
                    type_indicator
                )));
            }
            _ => {}
        }
        kind.validate()?;
        Ok(Self {
            kind,
            parent: parent.map(Box::new),
        })
    }

    /// Creates a node from a generic attribute map.
    ///
    /// Unknown attribute names are rejected.
    pub fn from_attributes(
        type_indicator: TypeIndicator,
        attributes: Attributes,
        parent: Option<PathSpec>,
    ) -> Result<Self> {
        let kind = PathSpecKind::from_attributes(type_indicator, attributes)?;
        Self::new(kind, parent)
    }

    /// Creates an OS path specification.
    pub fn os(location: impl Into<String>) -> Result<Self> {
        Self::new(
            PathSpecKind::Os {
                location: location.into(),
            },
            None,
        )
    }

    /// Creates a data range path specification.
    pub fn data_range(range_offset: u64, range_size: u64, parent: PathSpec) -> Result<Self> {
        Self::new(
            PathSpecKind::DataRange {
                range_offset,
                range_size,
            },
            Some(parent),
        )
    }

    /// Creates a TAR member path specification.
    pub fn tar(location: impl Into<String>, parent: PathSpec) -> Result<Self> {
        Self::new(
            PathSpecKind::Tar {
                location: location.into(),
            },
            Some(parent),
        )
    }

    /// Creates a 7z member path specification.
    pub fn seven_z(location: impl Into<String>, parent: PathSpec) -> Result<Self> {
        Self::new(
            PathSpecKind::SevenZ {
                location: location.into(),
            },
            Some(parent),
        )
    }

    /// Creates an encrypted stream path specification.
    pub fn encrypted_stream(spec: EncryptedStreamSpec, parent: PathSpec) -> Result<Self> {
        Self::new(PathSpecKind::EncryptedStream(spec), Some(parent))
    }

    /// Returns the format kind of this node.
    pub fn type_indicator(&self) -> TypeIndicator {
        self.kind.type_indicator()
    }

    /// Returns the format-specific content of this node.
    pub fn kind(&self) -> &PathSpecKind {
        &self.kind
    }

    /// Returns the parent node, if any.
    pub fn parent(&self) -> Option<&PathSpec> {
        self.parent.as_deref()
    }

    /// Returns `true` if this node has a parent.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns the location for kinds that address entries by location.
    pub fn location(&self) -> Option<&str> {
        match &self.kind {
            PathSpecKind::Os { location }
            | PathSpecKind::Tar { location }
            | PathSpecKind::SevenZ { location } => Some(location),
            _ => None,
        }
    }

    /// Returns the attributes of this node, sorted by name.
    pub fn attributes(&self) -> Attributes {
        self.kind.attributes()
    }

    /// Returns a sibling specification with the same kind and parent but a
    /// different location.
    pub fn with_location(&self, location: impl Into<String>) -> Result<PathSpec> {
        let location = location.into();
        let kind = match &self.kind {
            PathSpecKind::Os { .. } => PathSpecKind::Os { location },
            PathSpecKind::Tar { .. } => PathSpecKind::Tar { location },
            PathSpecKind::SevenZ { .. } => PathSpecKind::SevenZ { location },
            _ => {
                return Err(Error::PathSpec(format!(
                    "{} path specification has no location",
                    self.type_indicator()
                )));
            }
        };
        Self::new(kind, self.parent().cloned())
    }

    /// Returns the canonical comparison string of the whole chain.
    ///
    /// One line per node, root first: `type: <INDICATOR>` followed by the
    /// node's attributes as `, <name>: <value>` in name order.
    pub fn comparable(&self) -> String {
        let mut out = String::new();
        self.write_comparable(&mut out, true);
        out
    }

    /// Returns the comparison string identifying the file system that
    /// contains this entry: the chain with the leaf's location dropped.
    pub fn file_system_comparable(&self) -> String {
        let mut out = String::new();
        self.write_comparable(&mut out, false);
        out
    }

    fn write_comparable(&self, out: &mut String, include_location: bool) {
        if let Some(parent) = self.parent() {
            parent.write_comparable(out, true);
        }
        out.push_str("type: ");
        out.push_str(self.type_indicator().as_str());
        for (name, value) in self.attributes() {
            if !include_location && name == ATTR_LOCATION {
                continue;
            }
            out.push_str(", ");
            out.push_str(&name);
            out.push_str(": ");
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.comparable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_parent() -> PathSpec {
        PathSpec::os("/tmp/test.tar").unwrap()
    }

    fn aes_spec() -> EncryptedStreamSpec {
        EncryptedStreamSpec::new("aes")
            .key(b"This is a key123".to_vec())
            .cipher_mode(BlockCipherMode::Cbc)
            .initialization_vector(b"This is an IV456".to_vec())
    }

    #[test]
    fn test_os_comparable() {
        let spec = PathSpec::os("/tmp/test.tar").unwrap();
        assert_eq!(spec.comparable(), "type: OS, location: /tmp/test.tar\n");
        assert_eq!(spec.file_system_comparable(), "type: OS\n");
        assert_eq!(spec.to_string(), spec.comparable());
    }

    #[test]
    fn test_tar_comparable() {
        let spec = PathSpec::tar("/syslog", os_parent()).unwrap();
        assert_eq!(
            spec.comparable(),
            "type: OS, location: /tmp/test.tar\ntype: TAR, location: /syslog\n"
        );
        assert_eq!(
            spec.file_system_comparable(),
            "type: OS, location: /tmp/test.tar\ntype: TAR\n"
        );
    }

    #[test]
    fn test_seven_z_comparable() {
        let spec = PathSpec::seven_z("/syslog", PathSpec::os("/tmp/test.7z").unwrap()).unwrap();
        assert_eq!(
            spec.comparable(),
            "type: OS, location: /tmp/test.7z\ntype: SEVEN_Z, location: /syslog\n"
        );
        assert_eq!(spec.location(), Some("/syslog"));
        assert!(PathSpec::seven_z("syslog", os_parent()).is_err());

        let sibling = spec.with_location("/").unwrap();
        assert_eq!(sibling.type_indicator(), TypeIndicator::SevenZ);
        assert_eq!(sibling.location(), Some("/"));
    }

    #[test]
    fn test_encrypted_stream_comparable_sorted_hex() {
        let spec = PathSpec::encrypted_stream(aes_spec(), os_parent()).unwrap();
        let expected = format!(
            "type: OS, location: /tmp/test.tar\n\
             type: ENCRYPTED_STREAM, block_cipher_mode: cbc, encryption_method: aes, \
             iv: {}, key: {}\n",
            hex::encode(b"This is an IV456"),
            hex::encode(b"This is a key123"),
        );
        assert_eq!(spec.comparable(), expected);
    }

    #[test]
    fn test_comparable_deterministic_and_sensitive() {
        let a = PathSpec::encrypted_stream(aes_spec(), os_parent()).unwrap();
        let b = PathSpec::encrypted_stream(aes_spec(), os_parent()).unwrap();
        assert_eq!(a.comparable(), b.comparable());

        let c = PathSpec::encrypted_stream(aes_spec().segment_size(8), os_parent()).unwrap();
        assert_ne!(a.comparable(), c.comparable());

        let d = PathSpec::encrypted_stream(
            aes_spec().key(b"This is a key124".to_vec()),
            os_parent(),
        )
        .unwrap();
        assert_ne!(a.comparable(), d.comparable());
    }

    #[test]
    fn test_parent_rules() {
        let err = PathSpec::new(PathSpecKind::EncryptedStream(aes_spec()), None).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));

        let err = PathSpec::new(
            PathSpecKind::Os {
                location: "/a".into(),
            },
            Some(os_parent()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));

        let err = PathSpec::new(
            PathSpecKind::Tar {
                location: "/a".into(),
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_from_attributes_strict() {
        let mut attributes = Attributes::new();
        attributes.insert("encryption_method".into(), "aes".into());
        attributes.insert("bogus".into(), "value".into());
        let err = PathSpec::from_attributes(
            TypeIndicator::EncryptedStream,
            attributes,
            Some(os_parent()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(ref msg) if msg.contains("bogus")));
    }

    #[test]
    fn test_from_attributes_types() {
        let mut attributes = Attributes::new();
        attributes.insert("location".into(), AttributeValue::Integer(5));
        assert!(PathSpec::from_attributes(TypeIndicator::Os, attributes, None).is_err());

        let mut attributes = Attributes::new();
        attributes.insert("range_offset".into(), 10u64.into());
        assert!(matches!(
            PathSpec::from_attributes(TypeIndicator::DataRange, attributes, Some(os_parent())),
            Err(Error::InvalidSpec(ref msg)) if msg.contains("range_size")
        ));

        let mut attributes = Attributes::new();
        attributes.insert("encryption_method".into(), "aes".into());
        attributes.insert("block_cipher_mode".into(), "xts".into());
        assert!(
            PathSpec::from_attributes(TypeIndicator::EncryptedStream, attributes, Some(os_parent()))
                .is_err()
        );
    }

    #[test]
    fn test_attributes_round_trip_through_constructor() {
        let spec = PathSpec::encrypted_stream(aes_spec().segment_size(8), os_parent()).unwrap();
        let rebuilt = PathSpec::from_attributes(
            spec.type_indicator(),
            spec.attributes(),
            spec.parent().cloned(),
        )
        .unwrap();
        assert_eq!(spec, rebuilt);
    }

    #[test]
    fn test_tar_location_must_be_absolute() {
        assert!(PathSpec::tar("syslog", os_parent()).is_err());
        assert!(PathSpec::tar("/", os_parent()).is_ok());
    }

    #[test]
    fn test_with_location_keeps_parent() {
        let spec = PathSpec::tar("/a/b", os_parent()).unwrap();
        let sibling = spec.with_location("/a").unwrap();
        assert_eq!(sibling.location(), Some("/a"));
        assert_eq!(sibling.parent(), spec.parent());

        let range = PathSpec::data_range(0, 10, os_parent()).unwrap();
        assert!(matches!(range.with_location("/x"), Err(Error::PathSpec(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", aes_spec());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("key123"));
    }

    #[test]
    fn test_data_range_overflow_rejected() {
        assert!(PathSpec::data_range(u64::MAX, 2, os_parent()).is_err());
    }
}
