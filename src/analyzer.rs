//! Format detection by signature.
//!
//! The [`Analyzer`] compares a prefix (and optionally a suffix) of a
//! candidate stream against a table of byte signatures and reports the
//! type indicator of the first match. Callers use the result to choose
//! which path specification to stack on top of the stream.
//!
//! ```rust
//! use stackvfs::analyzer::Analyzer;
//! use stackvfs::TypeIndicator;
//!
//! let mut header = vec![0u8; 512];
//! header[257..263].copy_from_slice(b"ustar\0");
//!
//! let analyzer = Analyzer::new();
//! assert_eq!(analyzer.detect(&header, &[]), Some(TypeIndicator::Tar));
//! assert_eq!(analyzer.detect(b"plain text", &[]), None);
//! ```

use std::io::SeekFrom;

use crate::Result;
use crate::definitions::TypeIndicator;
use crate::file_io::FileObject;

/// Bytes read from each end of a stream by default.
pub const DEFAULT_READ_SIZE: usize = 4096;

/// Where a signature offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Offset from the first byte.
    Start,
    /// Offset back from the end; the pattern starts `offset` bytes before
    /// the end of the data.
    End,
}

/// A byte pattern identifying a format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Kind reported on a match.
    pub type_indicator: TypeIndicator,
    /// Bytes to match.
    pub pattern: Vec<u8>,
    /// Position of the pattern relative to `anchor`.
    pub offset: usize,
    /// Reference point of `offset`.
    pub anchor: Anchor,
}

impl Signature {
    /// Creates a signature anchored at the start of the data.
    pub fn at_start(type_indicator: TypeIndicator, pattern: &[u8], offset: usize) -> Self {
        Self {
            type_indicator,
            pattern: pattern.to_vec(),
            offset,
            anchor: Anchor::Start,
        }
    }

    /// Creates a signature anchored at the end of the data.
    pub fn at_end(type_indicator: TypeIndicator, pattern: &[u8], offset: usize) -> Self {
        Self {
            type_indicator,
            pattern: pattern.to_vec(),
            offset,
            anchor: Anchor::End,
        }
    }

    /// Returns `true` if the signature matches.
    ///
    /// `prefix` holds the first bytes of the data and `suffix` the last.
    pub fn matches(&self, prefix: &[u8], suffix: &[u8]) -> bool {
        match self.anchor {
            Anchor::Start => prefix
                .get(self.offset..self.offset + self.pattern.len())
                .is_some_and(|window| window == self.pattern.as_slice()),
            Anchor::End => suffix
                .len()
                .checked_sub(self.offset)
                .and_then(|start| suffix.get(start..start + self.pattern.len()))
                .is_some_and(|window| window == self.pattern.as_slice()),
        }
    }

    /// Bytes needed from the anchored end to evaluate the signature.
    fn span(&self) -> usize {
        match self.anchor {
            Anchor::Start => self.offset + self.pattern.len(),
            Anchor::End => self.offset,
        }
    }
}

/// USTAR magic at offset 257, POSIX `ustar\0` and GNU `ustar  \0`, and
/// the 7z signature at offset 0.
fn builtin_signatures() -> Vec<Signature> {
    vec![
        Signature::at_start(TypeIndicator::Tar, b"ustar\0", 257),
        Signature::at_start(TypeIndicator::Tar, b"ustar  \0", 257),
        Signature::at_start(TypeIndicator::SevenZ, b"7z\xbc\xaf\x27\x1c", 0),
    ]
}

/// Signature-based format detector.
#[derive(Debug, Clone)]
pub struct Analyzer {
    signatures: Vec<Signature>,
    read_size: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Creates an analyzer with the built-in signature table.
    pub fn new() -> Self {
        Self::with_signatures(builtin_signatures())
    }

    /// Creates an analyzer with a custom signature table.
    pub fn with_signatures(signatures: Vec<Signature>) -> Self {
        Self {
            signatures,
            read_size: DEFAULT_READ_SIZE,
        }
    }

    /// Sets how many bytes are read from each end of a stream.
    ///
    /// The size is raised as needed to cover every signature.
    pub fn read_size(mut self, size: usize) -> Self {
        self.read_size = size;
        self
    }

    /// Adds a signature to the table.
    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    /// Returns the signature table.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Returns the kind of the first matching signature.
    pub fn detect(&self, prefix: &[u8], suffix: &[u8]) -> Option<TypeIndicator> {
        self.signatures
            .iter()
            .find(|signature| signature.matches(prefix, suffix))
            .map(|signature| signature.type_indicator)
    }

    /// Returns the kinds of all matching signatures, without duplicates.
    pub fn detect_all(&self, prefix: &[u8], suffix: &[u8]) -> Vec<TypeIndicator> {
        let mut found = Vec::new();
        for signature in &self.signatures {
            if signature.matches(prefix, suffix) && !found.contains(&signature.type_indicator) {
                found.push(signature.type_indicator);
            }
        }
        found
    }

    fn span(&self, anchor: Anchor) -> usize {
        self.signatures
            .iter()
            .filter(|signature| signature.anchor == anchor)
            .map(Signature::span)
            .max()
            .unwrap_or(0)
    }

    /// Reads the needed prefix and suffix of a stream and detects its kind.
    ///
    /// The stream's offset is restored afterwards.
    pub fn detect_file_object(&self, file_object: &FileObject) -> Result<Option<TypeIndicator>> {
        let size = file_object.size()?;
        let original_offset = file_object.offset()?;

        let prefix_len = self.read_size.max(self.span(Anchor::Start));
        let prefix_len = usize::try_from(size).map_or(prefix_len, |s| s.min(prefix_len));
        let mut prefix = vec![0u8; prefix_len];
        let n = file_object.read_at(0, &mut prefix)?;
        prefix.truncate(n);

        let suffix_len = self.span(Anchor::End);
        let suffix_len = usize::try_from(size).map_or(suffix_len, |s| s.min(suffix_len));
        let mut suffix = vec![0u8; suffix_len];
        if suffix_len > 0 {
            let n = file_object.read_at(size - suffix_len as u64, &mut suffix)?;
            suffix.truncate(n);
        }

        file_object.seek(SeekFrom::Start(original_offset))?;

        let detected = self.detect(&prefix, &suffix);
        log::debug!("signature scan detected {:?}", detected);
        Ok(detected)
    }
}
