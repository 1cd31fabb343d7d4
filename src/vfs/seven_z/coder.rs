//! Decoding of 7z folders.
//!
//! Only folders with a single coder are decoded: Copy, LZMA and LZMA2.
//! Filter chains, multi-stream coders and encrypted folders are listed but
//! their data reports [`Error::BackEnd`].

use std::io::{Cursor, Read};

use super::header::{Coder, Folder};
use crate::file_io::FileObject;
use crate::{Error, Result};

/// Method identifiers as stored in coder records.
pub(crate) mod method {
    pub const COPY: &[u8] = &[0x00];
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    pub const LZMA2: &[u8] = &[0x21];
    pub const AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];
}

/// Largest folder output decoded into memory.
const MAX_UNPACK_SIZE: u64 = 1 << 32;

fn codec_error(error: impl std::fmt::Display) -> Error {
    Error::back_end(format!("7z decoding failed: {}", error))
}

/// Decodes the dictionary size of an LZMA2 property byte.
fn lzma2_dict_size(prop: u8) -> Result<u32> {
    match prop {
        0..=39 => {
            let base = u32::from(prop) / 2 + 12;
            Ok(if prop % 2 == 0 {
                1 << base
            } else {
                3 << (base - 1)
            })
        }
        40 => Ok(u32::MAX),
        _ => Err(Error::back_end(format!(
            "invalid LZMA2 dictionary property: {}",
            prop
        ))),
    }
}

fn decode(coder: &Coder, packed: Vec<u8>, unpack_size: u64) -> Result<Vec<u8>> {
    let limit = usize::try_from(unpack_size).map_err(codec_error)?;
    let mut out = Vec::with_capacity(limit.min(1 << 24));
    match coder.method_id.as_slice() {
        method::COPY => {
            let mut data = packed;
            data.truncate(limit);
            return Ok(data);
        }
        method::LZMA => {
            let [props, d0, d1, d2, d3] = coder.properties[..] else {
                return Err(Error::back_end("LZMA properties must be 5 bytes"));
            };
            let reader = lzma_rust2::LzmaReader::new_with_props(
                Cursor::new(packed),
                unpack_size,
                props,
                u32::from_le_bytes([d0, d1, d2, d3]),
                None,
            )
            .map_err(codec_error)?;
            reader.take(unpack_size).read_to_end(&mut out).map_err(codec_error)?;
        }
        method::LZMA2 => {
            let prop = coder
                .properties
                .first()
                .copied()
                .ok_or_else(|| Error::back_end("LZMA2 properties missing"))?;
            let reader = lzma_rust2::Lzma2Reader::new(Cursor::new(packed), lzma2_dict_size(prop)?, None);
            reader.take(unpack_size).read_to_end(&mut out).map_err(codec_error)?;
        }
        method::AES => return Err(Error::back_end("encrypted 7z folders are not supported")),
        other => {
            return Err(Error::back_end(format!(
                "unsupported 7z method {}",
                hex::encode(other)
            )));
        }
    }
    Ok(out)
}

/// Reads and decodes the whole output of a folder, checking its CRC when
/// the archive records one.
pub(crate) fn unpack_folder(parent: &FileObject, folder: &Folder) -> Result<Vec<u8>> {
    let [coder] = folder.coders.as_slice() else {
        return Err(Error::back_end(format!(
            "7z coder chains of {} coders are not supported",
            folder.coders.len()
        )));
    };
    let &[pack_size] = folder.pack_sizes.as_slice() else {
        return Err(Error::back_end("7z folder with several packed streams"));
    };
    let unpack_size = folder.unpack_size();
    if unpack_size > MAX_UNPACK_SIZE {
        return Err(Error::back_end(format!(
            "7z folder too large to unpack: {} bytes",
            unpack_size
        )));
    }

    let mut packed = vec![0u8; usize::try_from(pack_size).map_err(codec_error)?];
    if parent.read_at(folder.pack_offset, &mut packed)? < packed.len() {
        return Err(Error::back_end("7z packed stream lies past the end of the stream"));
    }
    let data = decode(coder, packed, unpack_size)?;
    if data.len() as u64 != unpack_size {
        return Err(Error::back_end(format!(
            "7z folder decoded to {} bytes, expected {}",
            data.len(),
            unpack_size
        )));
    }
    if let Some(expected) = folder.unpack_crc {
        check_crc(&data, expected)?;
    }
    log::trace!("unpacked 7z folder: {} -> {} bytes", pack_size, unpack_size);
    Ok(data)
}

/// Verifies the CRC-32 of decoded data.
pub(crate) fn check_crc(data: &[u8], expected: u32) -> Result<()> {
    let actual = crc32fast::hash(data);
    if actual != expected {
        return Err(Error::back_end(format!(
            "7z CRC mismatch: expected {:08x}, got {:08x}",
            expected, actual
        )));
    }
    Ok(())
}
