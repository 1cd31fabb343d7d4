//! Primitive readers for 7z header structures.
//!
//! Header data is parsed from an in-memory buffer, so every reader takes a
//! `&mut &[u8]` and running out of input means the header is truncated.

use std::io::Read;

use crate::{Error, Result};

/// Longest name accepted, in UTF-16 code units.
const MAX_NAME_UNITS: usize = 32768;

fn truncated() -> Error {
    Error::back_end("truncated 7z header")
}

pub(crate) fn read_bytes<'a>(r: &mut &'a [u8], count: usize) -> Result<&'a [u8]> {
    if r.len() < count {
        return Err(truncated());
    }
    let (head, tail) = r.split_at(count);
    *r = tail;
    Ok(head)
}

pub(crate) fn read_u8(r: &mut &[u8]) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| truncated())?;
    Ok(buf[0])
}

pub(crate) fn read_u32_le(r: &mut &[u8]) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| truncated())?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64_le(r: &mut &[u8]) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| truncated())?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a 7z variable-length number.
///
/// The count of leading one bits in the first byte gives the number of
/// little-endian bytes that follow; the remaining low bits of the first
/// byte are the most significant part of the value.
pub(crate) fn read_number(r: &mut &[u8]) -> Result<u64> {
    let first = u64::from(read_u8(r)?);
    let mut mask = 0x80u64;
    let mut value = 0u64;
    for i in 0..8 {
        if first & mask == 0 {
            return Ok(value | ((first & (mask - 1)) << (8 * i)));
        }
        value |= u64::from(read_u8(r)?) << (8 * i);
        mask >>= 1;
    }
    Ok(value)
}

/// Reads a number used as a count or index.
pub(crate) fn read_count(r: &mut &[u8]) -> Result<usize> {
    let value = read_number(r)?;
    // No count can exceed the bytes left to describe its items.
    match usize::try_from(value) {
        Ok(count) if count <= r.len().saturating_mul(8).max(1) => Ok(count),
        _ => Err(Error::back_end(format!("7z count out of range: {}", value))),
    }
}

/// Reads `count` flags packed most significant bit first.
pub(crate) fn read_bool_vector(r: &mut &[u8], count: usize) -> Result<Vec<bool>> {
    let bytes = read_bytes(r, count.div_ceil(8))?;
    Ok((0..count)
        .map(|i| bytes[i / 8] & (0x80 >> (i % 8)) != 0)
        .collect())
}

/// Reads an "all defined" marker byte, followed by a flag vector when the
/// marker is zero.
pub(crate) fn read_defined(r: &mut &[u8], count: usize) -> Result<Vec<bool>> {
    if read_u8(r)? != 0 {
        Ok(vec![true; count])
    } else {
        read_bool_vector(r, count)
    }
}

/// Reads a NUL-terminated UTF-16LE string.
pub(crate) fn read_utf16_name(r: &mut &[u8]) -> Result<String> {
    let mut units = Vec::new();
    loop {
        let bytes = read_bytes(r, 2)?;
        let unit = u16::from_le_bytes([bytes[0], bytes[1]]);
        if unit == 0 {
            break;
        }
        if units.len() >= MAX_NAME_UNITS {
            return Err(Error::back_end("7z file name too long"));
        }
        units.push(unit);
    }
    Ok(String::from_utf16_lossy(&units))
}
