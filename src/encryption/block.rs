//! Block cipher decrypters for AES, Blowfish and Triple-DES.
//!
//! CBC is delegated to the `cbc` crate with the chaining value carried
//! between calls (the last ciphertext block becomes the next IV). ECB, OFB
//! and CFB-n are driven directly on the block primitive.

use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, InnerIvInit, KeyInit,
};
use des::{TdesEde2, TdesEde3};

use super::{Decrypter, DecrypterOptions};
use crate::definitions::{
    BlockCipherMode, ENCRYPTION_METHOD_AES, ENCRYPTION_METHOD_BLOWFISH, ENCRYPTION_METHOD_DES3,
};
use crate::{Error, Result};

/// Default CFB segment size in bits.
pub const DEFAULT_SEGMENT_SIZE: u32 = 8;

/// Blowfish accepts keys from 32 to 448 bits.
const BLOWFISH_KEY_SIZES: std::ops::RangeInclusive<usize> = 4..=56;

/// Decrypter over any block cipher primitive.
pub struct BlockDecrypter<C> {
    method: &'static str,
    cipher: C,
    mode: BlockCipherMode,
    /// CBC chaining value, OFB keystream block or CFB shift register.
    state: Vec<u8>,
    /// Bytes consumed per decrypt unit.
    multiple: usize,
}

impl<C> std::fmt::Debug for BlockDecrypter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDecrypter")
            .field("method", &self.method)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<C> BlockDecrypter<C>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + Clone + Send + 'static,
{
    /// Creates a decrypter around an initialised cipher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] if a chained mode has no IV, the IV
    /// length differs from the block size, or the CFB segment size is not a
    /// positive multiple of 8 bits no larger than the block.
    pub fn new(method: &'static str, cipher: C, options: &DecrypterOptions) -> Result<Self> {
        let block_size = C::block_size();
        let mode = options.cipher_mode.unwrap_or_default();

        let state = match &options.initialization_vector {
            Some(iv) if iv.len() != block_size => {
                return Err(Error::invalid_spec(format!(
                    "unsupported initialization vector size: {} bytes, {} requires {}",
                    iv.len(),
                    method,
                    block_size
                )));
            }
            Some(iv) => iv.clone(),
            None if mode.requires_iv() => {
                return Err(Error::invalid_spec(format!(
                    "{} mode requires an initialization vector",
                    mode
                )));
            }
            None => vec![0u8; block_size],
        };

        let multiple = match mode {
            BlockCipherMode::Cfb => {
                let bits = options.segment_size.unwrap_or(DEFAULT_SEGMENT_SIZE);
                if bits == 0 || bits % 8 != 0 {
                    return Err(Error::invalid_spec(format!(
                        "segment size must be a positive multiple of 8 bits: {}",
                        bits
                    )));
                }
                let bytes = (bits / 8) as usize;
                if bytes > block_size {
                    return Err(Error::invalid_spec(format!(
                        "segment size {} bits exceeds the {}-bit block",
                        bits,
                        block_size * 8
                    )));
                }
                bytes
            }
            _ => block_size,
        };

        Ok(Self {
            method,
            cipher,
            mode,
            state,
            multiple,
        })
    }

    fn decrypt_ecb(&self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(C::block_size()) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
    }

    fn decrypt_cbc(&mut self, data: &mut [u8]) -> Result<()> {
        let block_size = C::block_size();
        let next_iv = data[data.len() - block_size..].to_vec();

        let decryptor = cbc::Decryptor::<C>::inner_iv_slice_init(self.cipher.clone(), &self.state)
            .map_err(|e| Error::back_end(format!("CBC initialization failed: {}", e)))?;
        decryptor
            .decrypt_padded_mut::<NoPadding>(data)
            .map_err(|e| Error::back_end(format!("CBC decryption failed: {}", e)))?;

        self.state = next_iv;
        Ok(())
    }

    fn decrypt_ofb(&mut self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(C::block_size()) {
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(&mut self.state));
            xor_in_place(block, &self.state);
        }
    }

    fn decrypt_cfb(&mut self, data: &mut [u8]) {
        let segment = self.multiple;
        for chunk in data.chunks_exact_mut(segment) {
            let mut keystream = self.state.clone();
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(&mut keystream));

            // The shift register takes ciphertext, so rotate it in first.
            self.state.rotate_left(segment);
            let tail = self.state.len() - segment;
            self.state[tail..].copy_from_slice(chunk);

            xor_in_place(chunk, &keystream[..segment]);
        }
    }
}

impl<C> Decrypter for BlockDecrypter<C>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + Clone + Send + 'static,
{
    fn encryption_method(&self) -> &str {
        self.method
    }

    fn ciphertext_multiple(&self) -> usize {
        self.multiple
    }

    fn decrypt(&mut self, encrypted: &mut Vec<u8>) -> Result<Vec<u8>> {
        let usable = encrypted.len() - encrypted.len() % self.multiple;
        let remainder = encrypted.split_off(usable);
        let mut data = std::mem::replace(encrypted, remainder);
        if data.is_empty() {
            return Ok(data);
        }

        match self.mode {
            BlockCipherMode::Ecb => self.decrypt_ecb(&mut data),
            BlockCipherMode::Cbc => self.decrypt_cbc(&mut data)?,
            BlockCipherMode::Ofb => self.decrypt_ofb(&mut data),
            BlockCipherMode::Cfb => self.decrypt_cfb(&mut data),
        }
        Ok(data)
    }
}

fn xor_in_place(data: &mut [u8], keystream: &[u8]) {
    for (byte, key) in data.iter_mut().zip(keystream) {
        *byte ^= key;
    }
}

fn required_key(options: &DecrypterOptions) -> Result<&[u8]> {
    options
        .key
        .as_deref()
        .ok_or_else(|| Error::invalid_spec("missing key"))
}

fn init_cipher<C: KeyInit>(method: &str, key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|_| {
        Error::invalid_spec(format!("unsupported {} key size: {} bytes", method, key.len()))
    })
}

fn boxed<C>(method: &'static str, cipher: C, options: &DecrypterOptions) -> Result<Box<dyn Decrypter>>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + Clone + Send + 'static,
{
    Ok(Box::new(BlockDecrypter::new(method, cipher, options)?))
}

/// Creates an AES decrypter; the key selects AES-128, AES-192 or AES-256.
pub fn new_aes_decrypter(options: &DecrypterOptions) -> Result<Box<dyn Decrypter>> {
    let method = ENCRYPTION_METHOD_AES;
    let key = required_key(options)?;
    match key.len() {
        16 => boxed(method, init_cipher::<Aes128>(method, key)?, options),
        24 => boxed(method, init_cipher::<Aes192>(method, key)?, options),
        32 => boxed(method, init_cipher::<Aes256>(method, key)?, options),
        n => Err(Error::invalid_spec(format!(
            "unsupported AES key size: {} bytes",
            n
        ))),
    }
}

/// Creates a Blowfish decrypter.
pub fn new_blowfish_decrypter(options: &DecrypterOptions) -> Result<Box<dyn Decrypter>> {
    let method = ENCRYPTION_METHOD_BLOWFISH;
    let key = required_key(options)?;
    if !BLOWFISH_KEY_SIZES.contains(&key.len()) {
        return Err(Error::invalid_spec(format!(
            "unsupported Blowfish key size: {} bytes",
            key.len()
        )));
    }
    boxed(method, init_cipher::<Blowfish>(method, key)?, options)
}

/// Creates a Triple-DES decrypter; 16-byte keys use two-key EDE.
pub fn new_des3_decrypter(options: &DecrypterOptions) -> Result<Box<dyn Decrypter>> {
    let method = ENCRYPTION_METHOD_DES3;
    let key = required_key(options)?;
    match key.len() {
        16 => boxed(method, init_cipher::<TdesEde2>(method, key)?, options),
        24 => boxed(method, init_cipher::<TdesEde3>(method, key)?, options),
        n => Err(Error::invalid_spec(format!(
            "unsupported Triple-DES key size: {} bytes",
            n
        ))),
    }
}
