//! Plaintext view of a block-cipher encrypted parent stream.
//!
//! Chained cipher modes can only be decrypted front to back, so the stream
//! keeps a window of decrypted bytes and serves reads from it. A seek that
//! lands inside the window moves the cursor; any other seek marks the
//! stream for realignment, and the next read replays decryption from the
//! start of the parent up to the target offset. Seek-then-read therefore
//! costs O(target offset) for targets outside the window.

use std::fmt;
use std::io::SeekFrom;

use super::{FileIo, FileObject, resolve_seek};
use crate::encryption::{Decrypter, DecrypterOptions, EncryptionManager};
use crate::path::{EncryptedStreamSpec, PathSpec, PathSpecKind};
use crate::resolver::{Context, ContextConfig, Resolver};
use crate::{Error, Result};

/// A decrypting stream layer.
pub struct EncryptedStream {
    parent: Option<FileObject>,
    method: String,
    options: DecrypterOptions,
    decrypter: Box<dyn Decrypter>,
    buffer_size: usize,
    size: u64,
    current_offset: u64,
    /// Ciphertext read from the parent but not yet a whole multiple.
    encrypted_data: Vec<u8>,
    /// Parent offset of the next ciphertext read.
    encrypted_offset: u64,
    decrypted_data: Vec<u8>,
    /// Cursor into `decrypted_data`.
    decrypted_data_offset: usize,
    /// Stream offset of `decrypted_data[0]`.
    decrypted_stream_offset: u64,
    realign: bool,
}

impl fmt::Debug for EncryptedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStream")
            .field("method", &self.method)
            .field("size", &self.size)
            .field("current_offset", &self.current_offset)
            .field("buffer_size", &self.buffer_size)
            .field("realign", &self.realign)
            .field("open", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

fn new_decrypter(method: &str, options: &DecrypterOptions) -> Result<Box<dyn Decrypter>> {
    EncryptionManager::global()
        .get_decrypter(method, options)?
        .ok_or_else(|| Error::PathSpec(format!("unsupported encryption method: {}", method)))
}

impl EncryptedStream {
    /// Opens an encrypted stream layer, resolving its parent through
    /// `context`.
    ///
    /// # Errors
    ///
    /// - [`Error::PathSpec`] if the encryption method is not registered.
    /// - [`Error::InvalidSpec`] if the key, IV, mode or segment size is
    ///   unacceptable to the cipher.
    /// - Any error raised while resolving the parent.
    pub fn open(path_spec: &PathSpec, context: &Context) -> Result<Self> {
        let PathSpecKind::EncryptedStream(spec) = path_spec.kind() else {
            return Err(Error::invalid_spec(format!(
                "expected an ENCRYPTED_STREAM path specification, got {}",
                path_spec.type_indicator()
            )));
        };
        let parent_spec = path_spec.parent().ok_or_else(|| {
            Error::invalid_spec("ENCRYPTED_STREAM path specification requires a parent")
        })?;

        // Validate the cipher before touching the parent.
        let options = DecrypterOptions::from(spec);
        let decrypter = new_decrypter(&spec.encryption_method, &options)?;
        let parent = Resolver::open_file_object(parent_spec, context)?;
        Self::with_parent(parent, spec, options, decrypter, context.config())
    }

    /// Builds a decrypting view over a caller-supplied ciphertext stream.
    ///
    /// The layer keeps a borrowed view; closing it leaves `parent` open.
    pub fn from_file_object(
        parent: &FileObject,
        spec: &EncryptedStreamSpec,
        config: &ContextConfig,
    ) -> Result<Self> {
        let options = DecrypterOptions::from(spec);
        let decrypter = new_decrypter(&spec.encryption_method, &options)?;
        Self::with_parent(parent.share()?, spec, options, decrypter, config)
    }

    fn with_parent(
        parent: FileObject,
        spec: &EncryptedStreamSpec,
        options: DecrypterOptions,
        decrypter: Box<dyn Decrypter>,
        config: &ContextConfig,
    ) -> Result<Self> {
        let size = parent.size()?;
        Ok(Self {
            parent: Some(parent),
            method: spec.encryption_method.clone(),
            options,
            decrypter,
            buffer_size: config.encrypted_buffer_size.max(1),
            size,
            current_offset: 0,
            encrypted_data: Vec::new(),
            encrypted_offset: 0,
            decrypted_data: Vec::new(),
            decrypted_data_offset: 0,
            decrypted_stream_offset: 0,
            realign: false,
        })
    }

    /// Returns the encryption method name.
    pub fn encryption_method(&self) -> &str {
        &self.method
    }

    fn ensure_open(&self) -> Result<()> {
        if self.parent.is_some() { Ok(()) } else { Err(Error::NotOpen) }
    }

    fn window_end(&self) -> u64 {
        self.decrypted_stream_offset + self.decrypted_data.len() as u64
    }

    /// Replaces the decrypted window with the next chunk of plaintext.
    ///
    /// Returns `false` once the parent is exhausted.
    fn refill(&mut self) -> Result<bool> {
        let parent = self.parent.as_ref().ok_or(Error::NotOpen)?;
        let mut chunk = vec![0u8; self.buffer_size];
        let n = parent.read_at(self.encrypted_offset, &mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        chunk.truncate(n);
        self.encrypted_offset += n as u64;
        self.encrypted_data.extend_from_slice(&chunk);

        let plaintext = self.decrypter.decrypt(&mut self.encrypted_data)?;
        self.decrypted_stream_offset = self.window_end();
        self.decrypted_data = plaintext;
        self.decrypted_data_offset = 0;
        Ok(true)
    }

    /// Replays decryption from the start of the parent up to `target`.
    fn align(&mut self, target: u64) -> Result<()> {
        log::debug!(
            "realigning {} stream to offset {} from offset 0",
            self.method,
            target
        );
        self.decrypter = new_decrypter(&self.method, &self.options)?;
        self.encrypted_data.clear();
        self.encrypted_offset = 0;
        self.decrypted_data.clear();
        self.decrypted_data_offset = 0;
        self.decrypted_stream_offset = 0;

        while self.window_end() <= target {
            if !self.refill()? {
                break;
            }
        }
        let cursor = target.saturating_sub(self.decrypted_stream_offset);
        self.decrypted_data_offset =
            usize::try_from(cursor).map_or(self.decrypted_data.len(), |c| c.min(self.decrypted_data.len()));
        self.realign = false;
        Ok(())
    }
}

impl FileIo for EncryptedStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if self.current_offset >= self.size {
            return Ok(0);
        }
        if self.realign {
            self.align(self.current_offset)?;
        }

        let remaining = self.size - self.current_offset;
        let wanted = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let mut filled = 0;
        while filled < wanted {
            let available = self.decrypted_data.len() - self.decrypted_data_offset;
            if available == 0 {
                if !self.refill()? {
                    break;
                }
                continue;
            }
            let n = available.min(wanted - filled);
            let start = self.decrypted_data_offset;
            buf[filled..filled + n].copy_from_slice(&self.decrypted_data[start..start + n]);
            self.decrypted_data_offset += n;
            filled += n;
        }
        self.current_offset += filled as u64;
        Ok(filled)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        let target = resolve_seek(self.current_offset, self.size, pos)?;
        if target >= self.decrypted_stream_offset && target <= self.window_end() {
            // The window is consistent with the decrypter state, so a
            // pending realignment is no longer needed.
            self.decrypted_data_offset = (target - self.decrypted_stream_offset) as usize;
            self.realign = false;
        } else {
            self.realign = true;
        }
        self.current_offset = target;
        Ok(target)
    }

    fn offset(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.current_offset)
    }

    fn size(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.size)
    }

    fn close(&mut self) -> Result<()> {
        self.encrypted_data = Vec::new();
        self.decrypted_data = Vec::new();
        match self.parent.take() {
            Some(mut parent) => parent.close(),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.parent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_io::MemoryFile;

    const XOR_METHOD: &str = "xor-chain-test";
    const XOR_BLOCK: usize = 4;
    const XOR_IV: [u8; XOR_BLOCK] = [0x5a, 0xa5, 0x3c, 0xc3];

    /// Toy chained cipher: each plaintext block is its ciphertext block
    /// XORed with the previous ciphertext block.
    struct XorChain {
        previous: [u8; XOR_BLOCK],
    }

    impl Decrypter for XorChain {
        fn encryption_method(&self) -> &str {
            XOR_METHOD
        }

        fn ciphertext_multiple(&self) -> usize {
            XOR_BLOCK
        }

        fn decrypt(&mut self, encrypted: &mut Vec<u8>) -> Result<Vec<u8>> {
            let whole = encrypted.len() - encrypted.len() % XOR_BLOCK;
            let remainder = encrypted.split_off(whole);
            let mut plaintext = std::mem::replace(encrypted, remainder);
            for block in plaintext.chunks_exact_mut(XOR_BLOCK) {
                let mut cipher_block = [0u8; XOR_BLOCK];
                cipher_block.copy_from_slice(block);
                for (p, prev) in block.iter_mut().zip(self.previous) {
                    *p ^= prev;
                }
                self.previous = cipher_block;
            }
            Ok(plaintext)
        }
    }

    fn xor_chain(_options: &DecrypterOptions) -> Result<Box<dyn Decrypter>> {
        Ok(Box::new(XorChain { previous: XOR_IV }))
    }

    fn encrypt(plaintext: &[u8]) -> Vec<u8> {
        let mut previous = XOR_IV;
        let mut out = Vec::with_capacity(plaintext.len());
        for block in plaintext.chunks(XOR_BLOCK) {
            let mut cipher_block = [0u8; XOR_BLOCK];
            for (i, byte) in block.iter().enumerate() {
                cipher_block[i] = byte ^ previous[i];
            }
            out.extend_from_slice(&cipher_block[..block.len()]);
            previous = cipher_block;
        }
        out
    }

    fn plaintext() -> Vec<u8> {
        (0..96u8).collect()
    }

    fn stream(buffer_size: usize) -> (FileObject, EncryptedStream) {
        // Already registered by another test in this process is fine.
        let _ = EncryptionManager::global().register_decrypter(XOR_METHOD, xor_chain);
        let parent = FileObject::new(MemoryFile::new(encrypt(&plaintext())));
        let config = ContextConfig::new().encrypted_buffer_size(buffer_size);
        let stream =
            EncryptedStream::from_file_object(&parent, &EncryptedStreamSpec::new(XOR_METHOD), &config)
                .unwrap();
        (parent, stream)
    }

    fn read_n(stream: &mut EncryptedStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        let got = stream.read(&mut buf).unwrap();
        buf.truncate(got);
        buf
    }

    #[test]
    fn test_sequential_read() {
        for buffer_size in [1, 3, 4, 7, 16, 1024] {
            let (_parent, mut stream) = stream(buffer_size);
            assert_eq!(stream.size().unwrap(), 96);
            assert_eq!(read_n(&mut stream, 200), plaintext(), "buffer {}", buffer_size);
            assert!(read_n(&mut stream, 1).is_empty());
        }
    }

    #[test]
    fn test_small_reads_match_one_read() {
        let (_parent, mut stream) = stream(7);
        let mut collected = Vec::new();
        loop {
            let piece = read_n(&mut stream, 5);
            if piece.is_empty() {
                break;
            }
            collected.extend(piece);
        }
        assert_eq!(collected, plaintext());
    }

    #[test]
    fn test_seek_outside_window_realigns() {
        let (_parent, mut stream) = stream(8);
        assert_eq!(read_n(&mut stream, 4), &plaintext()[..4]);

        stream.seek(SeekFrom::Start(50)).unwrap();
        assert!(stream.realign);
        assert_eq!(read_n(&mut stream, 10), &plaintext()[50..60]);

        stream.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(read_n(&mut stream, 2), &plaintext()[3..5]);

        stream.seek(SeekFrom::End(-1)).unwrap();
        assert_eq!(read_n(&mut stream, 10), &plaintext()[95..]);
    }

    #[test]
    fn test_seek_inside_window_moves_cursor() {
        let (_parent, mut stream) = stream(32);
        assert_eq!(read_n(&mut stream, 10), &plaintext()[..10]);
        stream.seek(SeekFrom::Current(-8)).unwrap();
        assert!(!stream.realign);
        assert_eq!(read_n(&mut stream, 4), &plaintext()[2..6]);
    }

    #[test]
    fn test_seek_past_end() {
        let (_parent, mut stream) = stream(16);
        assert_eq!(stream.seek(SeekFrom::Start(500)).unwrap(), 500);
        assert!(read_n(&mut stream, 4).is_empty());
        assert!(matches!(
            stream.seek(SeekFrom::Current(-501)),
            Err(Error::InvalidOffset { .. })
        ));
    }

    #[test]
    fn test_close_leaves_caller_parent_open() {
        let (parent, mut stream) = stream(16);
        stream.close().unwrap();
        stream.close().unwrap();
        assert!(matches!(stream.offset(), Err(Error::NotOpen)));
        assert!(parent.is_open());
    }

    #[test]
    fn test_unknown_method() {
        let parent = FileObject::new(MemoryFile::new(vec![0u8; 16]));
        let err = EncryptedStream::from_file_object(
            &parent,
            &EncryptedStreamSpec::new("rot13"),
            &ContextConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathSpec(_)));
    }
}
