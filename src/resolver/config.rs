//! Configuration carried by a resolver [`Context`](super::Context).

/// Default amount of ciphertext read from the parent per refill (8 MiB).
pub const DEFAULT_ENCRYPTED_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Tunables for the layers opened through a context.
///
/// # Example
///
/// ```rust
/// use stackvfs::{Context, ContextConfig};
///
/// // Default configuration (8 MiB decryption buffer)
/// let context = Context::new();
///
/// // Smaller buffers for memory-constrained environments
/// let context = Context::with_config(
///     ContextConfig::new().encrypted_buffer_size(64 * 1024),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Bytes of ciphertext pulled from the parent stream per refill of an
    /// encrypted stream.
    ///
    /// Larger buffers amortize parent reads; a realignment after a seek
    /// decrypts from the start in units of this size.
    /// Default: 8 MiB.
    pub encrypted_buffer_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            encrypted_buffer_size: DEFAULT_ENCRYPTED_BUFFER_SIZE,
        }
    }
}

impl ContextConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with small buffers.
    pub fn low_memory() -> Self {
        Self {
            encrypted_buffer_size: 64 * 1024,
        }
    }

    /// Sets the encrypted stream buffer size.
    ///
    /// A size of zero is raised to one byte.
    pub fn encrypted_buffer_size(mut self, size: usize) -> Self {
        self.encrypted_buffer_size = size.max(1);
        self
    }
}
