//! 7z signature header and archive header parsing.

use super::coder::unpack_folder;
use super::reader::{
    read_bool_vector, read_bytes, read_count, read_defined, read_number, read_u8, read_u32_le,
    read_u64_le, read_utf16_name,
};
use crate::file_io::FileObject;
use crate::{Error, Result};

/// The six bytes every 7z archive starts with.
pub const SIGNATURE: &[u8; 6] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Size of the signature header; offsets in the archive header are
/// relative to its end.
pub(crate) const SIGNATURE_HEADER_SIZE: u64 = 32;

const MAX_HEADER_SIZE: u64 = 64 * 1024 * 1024;
const MAX_HEADER_NESTING: usize = 4;

/// Highest major format version understood.
const VERSION_MAJOR: u8 = 0;

pub(crate) mod property_id {
    pub const END: u8 = 0x00;
    pub const HEADER: u8 = 0x01;
    pub const ARCHIVE_PROPERTIES: u8 = 0x02;
    pub const ADDITIONAL_STREAMS_INFO: u8 = 0x03;
    pub const MAIN_STREAMS_INFO: u8 = 0x04;
    pub const FILES_INFO: u8 = 0x05;
    pub const PACK_INFO: u8 = 0x06;
    pub const UNPACK_INFO: u8 = 0x07;
    pub const SUBSTREAMS_INFO: u8 = 0x08;
    pub const SIZE: u8 = 0x09;
    pub const CRC: u8 = 0x0A;
    pub const FOLDER: u8 = 0x0B;
    pub const CODERS_UNPACK_SIZE: u8 = 0x0C;
    pub const NUM_UNPACK_STREAM: u8 = 0x0D;
    pub const EMPTY_STREAM: u8 = 0x0E;
    pub const EMPTY_FILE: u8 = 0x0F;
    pub const ANTI: u8 = 0x10;
    pub const NAME: u8 = 0x11;
    pub const CTIME: u8 = 0x12;
    pub const ATIME: u8 = 0x13;
    pub const MTIME: u8 = 0x14;
    pub const WIN_ATTRIBUTES: u8 = 0x15;
    pub const ENCODED_HEADER: u8 = 0x17;
    pub const DUMMY: u8 = 0x19;
}

fn unexpected(section: &str, id: u8) -> Error {
    Error::back_end(format!("unexpected property {:#04x} in 7z {}", id, section))
}

/// One coder of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Coder {
    /// Method identifier bytes, such as `[0x03, 0x01, 0x01]` for LZMA.
    pub method_id: Vec<u8>,
    pub num_in_streams: usize,
    pub num_out_streams: usize,
    pub properties: Vec<u8>,
}

/// A compressed block: a coder graph over one or more packed streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Folder {
    pub coders: Vec<Coder>,
    /// `(in_index, out_index)` connections between coders.
    pub bind_pairs: Vec<(usize, usize)>,
    pub num_packed_streams: usize,
    /// Absolute position of the folder's first packed stream.
    pub pack_offset: u64,
    /// Sizes of the folder's packed streams.
    pub pack_sizes: Vec<u64>,
    /// Output size of every coder output stream.
    pub unpack_sizes: Vec<u64>,
    pub unpack_crc: Option<u32>,
}

impl Folder {
    fn total_out_streams(&self) -> usize {
        self.coders.iter().map(|coder| coder.num_out_streams).sum()
    }

    /// Size of the folder's final output: the one output stream no bind
    /// pair consumes.
    pub fn unpack_size(&self) -> u64 {
        (0..self.unpack_sizes.len())
            .rev()
            .find(|index| !self.bind_pairs.iter().any(|&(_, out)| out == *index))
            .map_or(0, |index| self.unpack_sizes[index])
    }
}

/// One file record of the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Entry {
    pub name: String,
    pub has_stream: bool,
    pub is_directory: bool,
    pub is_anti: bool,
    pub size: u64,
    pub crc: Option<u32>,
    /// Windows FILETIME values: 100 ns ticks since 1601-01-01.
    pub creation_time: Option<u64>,
    pub access_time: Option<u64>,
    pub modification_time: Option<u64>,
    pub attributes: Option<u32>,
    /// Folder holding the data and the offset within its output.
    pub folder: Option<usize>,
    pub folder_offset: u64,
}

/// The parsed archive header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Archive {
    pub folders: Vec<Folder>,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Default)]
struct StreamsInfo {
    folders: Vec<Folder>,
    /// Per substream, in archive order: `(folder, offset, size, crc)`.
    substreams: Vec<(usize, u64, u64, Option<u32>)>,
}

impl Archive {
    /// Reads the header of the archive stored in `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackEnd`] if the stream is not a 7z archive or its
    /// header is damaged.
    pub fn read(parent: &FileObject) -> Result<Self> {
        let mut start = [0u8; 32];
        let n = parent.read_at(0, &mut start)?;
        if n < start.len() || start[..6] != SIGNATURE[..] {
            return Err(Error::back_end("not a 7z archive"));
        }
        if start[6] > VERSION_MAJOR {
            return Err(Error::back_end(format!(
                "unsupported 7z version {}.{}",
                start[6], start[7]
            )));
        }
        let mut fields = &start[8..];
        let start_header_crc = read_u32_le(&mut fields)?;
        if crc32fast::hash(fields) != start_header_crc {
            return Err(Error::back_end("7z start header CRC mismatch"));
        }
        let next_header_offset = read_u64_le(&mut fields)?;
        let next_header_size = read_u64_le(&mut fields)?;
        let next_header_crc = read_u32_le(&mut fields)?;

        if next_header_size == 0 {
            return Ok(Self::default());
        }
        if next_header_size > MAX_HEADER_SIZE {
            return Err(Error::back_end(format!(
                "7z header too large: {} bytes",
                next_header_size
            )));
        }
        let position = SIGNATURE_HEADER_SIZE
            .checked_add(next_header_offset)
            .ok_or_else(|| Error::back_end("7z header offset overflows"))?;
        let size = usize::try_from(next_header_size)
            .map_err(|_| Error::back_end("7z header too large"))?;
        let mut header = vec![0u8; size];
        if parent.read_at(position, &mut header)? < header.len() {
            return Err(Error::back_end("7z header lies past the end of the stream"));
        }
        if crc32fast::hash(&header) != next_header_crc {
            return Err(Error::back_end("7z header CRC mismatch"));
        }

        // Nested encoded headers do not occur in practice; bound the depth.
        for _ in 0..MAX_HEADER_NESTING {
            let mut r = header.as_slice();
            match read_u8(&mut r)? {
                property_id::HEADER => return parse_header(&mut r),
                property_id::ENCODED_HEADER => {
                    let streams = parse_streams_info(&mut r)?;
                    let folder = streams
                        .folders
                        .first()
                        .ok_or_else(|| Error::back_end("7z encoded header has no folder"))?;
                    log::debug!("decoding packed 7z header");
                    header = unpack_folder(parent, folder)?;
                }
                id => return Err(unexpected("header", id)),
            }
        }
        Err(Error::back_end("7z header nested too deeply"))
    }
}

fn parse_header(r: &mut &[u8]) -> Result<Archive> {
    let mut id = read_u8(r)?;
    if id == property_id::ARCHIVE_PROPERTIES {
        skip_archive_properties(r)?;
        id = read_u8(r)?;
    }
    if id == property_id::ADDITIONAL_STREAMS_INFO {
        return Err(Error::back_end("7z additional streams are not supported"));
    }
    let mut streams = StreamsInfo::default();
    if id == property_id::MAIN_STREAMS_INFO {
        streams = parse_streams_info(r)?;
        id = read_u8(r)?;
    }
    let mut entries = Vec::new();
    if id == property_id::FILES_INFO {
        entries = parse_files_info(r)?;
        id = read_u8(r)?;
    }
    if id != property_id::END {
        return Err(unexpected("header", id));
    }

    let mut substreams = streams.substreams.iter();
    for entry in entries.iter_mut().filter(|entry| entry.has_stream) {
        let &(folder, offset, size, crc) = substreams
            .next()
            .ok_or_else(|| Error::back_end("7z file has no data stream"))?;
        entry.folder = Some(folder);
        entry.folder_offset = offset;
        entry.size = size;
        entry.crc = crc;
    }
    Ok(Archive {
        folders: streams.folders,
        entries,
    })
}

fn skip_archive_properties(r: &mut &[u8]) -> Result<()> {
    loop {
        if read_u8(r)? == property_id::END {
            return Ok(());
        }
        let size = read_count(r)?;
        read_bytes(r, size)?;
    }
}

fn parse_streams_info(r: &mut &[u8]) -> Result<StreamsInfo> {
    let mut pack_pos = 0u64;
    let mut pack_sizes = Vec::new();
    let mut folders = Vec::new();
    let mut substreams = None;
    loop {
        match read_u8(r)? {
            property_id::END => break,
            property_id::PACK_INFO => {
                pack_pos = read_number(r)?;
                pack_sizes = parse_pack_info(r)?;
            }
            property_id::UNPACK_INFO => folders = parse_unpack_info(r)?,
            property_id::SUBSTREAMS_INFO => substreams = Some(parse_substreams_info(r, &folders)?),
            id => return Err(unexpected("streams info", id)),
        }
    }

    let mut offset = SIGNATURE_HEADER_SIZE
        .checked_add(pack_pos)
        .ok_or_else(|| Error::back_end("7z pack position overflows"))?;
    let mut sizes = pack_sizes.into_iter();
    for folder in &mut folders {
        folder.pack_offset = offset;
        for _ in 0..folder.num_packed_streams {
            let size = sizes
                .next()
                .ok_or_else(|| Error::back_end("7z folder refers to a missing packed stream"))?;
            folder.pack_sizes.push(size);
            offset = offset
                .checked_add(size)
                .ok_or_else(|| Error::back_end("7z packed size overflows"))?;
        }
    }

    let substreams = match substreams {
        Some(substreams) => substreams,
        None => folders
            .iter()
            .enumerate()
            .map(|(index, folder)| (index, 0, folder.unpack_size(), folder.unpack_crc))
            .collect(),
    };
    Ok(StreamsInfo {
        folders,
        substreams,
    })
}

fn parse_pack_info(r: &mut &[u8]) -> Result<Vec<u64>> {
    let count = read_count(r)?;
    let mut sizes = vec![0u64; count];
    loop {
        match read_u8(r)? {
            property_id::END => return Ok(sizes),
            property_id::SIZE => {
                for size in &mut sizes {
                    *size = read_number(r)?;
                }
            }
            property_id::CRC => {
                for defined in read_defined(r, count)? {
                    if defined {
                        read_u32_le(r)?;
                    }
                }
            }
            id => return Err(unexpected("pack info", id)),
        }
    }
}

fn parse_folder(r: &mut &[u8]) -> Result<Folder> {
    let num_coders = read_count(r)?;
    if num_coders == 0 || num_coders > 16 {
        return Err(Error::back_end(format!(
            "7z folder has {} coders",
            num_coders
        )));
    }
    let mut folder = Folder::default();
    for _ in 0..num_coders {
        let flags = read_u8(r)?;
        let method_id = read_bytes(r, usize::from(flags & 0x0F))?.to_vec();
        let (num_in_streams, num_out_streams) = if flags & 0x10 != 0 {
            (read_count(r)?, read_count(r)?)
        } else {
            (1, 1)
        };
        let properties = if flags & 0x20 != 0 {
            let size = read_count(r)?;
            read_bytes(r, size)?.to_vec()
        } else {
            Vec::new()
        };
        folder.coders.push(Coder {
            method_id,
            num_in_streams,
            num_out_streams,
            properties,
        });
    }

    let total_in: usize = folder.coders.iter().map(|coder| coder.num_in_streams).sum();
    let total_out = folder.total_out_streams();
    for _ in 0..total_out.saturating_sub(1) {
        let in_index = read_count(r)?;
        let out_index = read_count(r)?;
        if in_index >= total_in || out_index >= total_out {
            return Err(Error::back_end("7z bind pair out of range"));
        }
        folder.bind_pairs.push((in_index, out_index));
    }
    folder.num_packed_streams = total_in.saturating_sub(folder.bind_pairs.len());
    if folder.num_packed_streams > 1 {
        for _ in 0..folder.num_packed_streams {
            read_number(r)?;
        }
    }
    Ok(folder)
}

fn parse_unpack_info(r: &mut &[u8]) -> Result<Vec<Folder>> {
    if read_u8(r)? != property_id::FOLDER {
        return Err(Error::back_end("7z unpack info lacks folders"));
    }
    let count = read_count(r)?;
    if read_u8(r)? != 0 {
        return Err(Error::back_end("external 7z folders are not supported"));
    }
    let mut folders = (0..count)
        .map(|_| parse_folder(r))
        .collect::<Result<Vec<_>>>()?;

    if read_u8(r)? != property_id::CODERS_UNPACK_SIZE {
        return Err(Error::back_end("7z unpack info lacks sizes"));
    }
    for folder in &mut folders {
        folder.unpack_sizes = (0..folder.total_out_streams())
            .map(|_| read_number(r))
            .collect::<Result<Vec<_>>>()?;
    }
    loop {
        match read_u8(r)? {
            property_id::END => return Ok(folders),
            property_id::CRC => {
                let defined = read_defined(r, folders.len())?;
                for (folder, defined) in folders.iter_mut().zip(defined) {
                    if defined {
                        folder.unpack_crc = Some(read_u32_le(r)?);
                    }
                }
            }
            id => return Err(unexpected("unpack info", id)),
        }
    }
}

fn parse_substreams_info(
    r: &mut &[u8],
    folders: &[Folder],
) -> Result<Vec<(usize, u64, u64, Option<u32>)>> {
    let mut counts = vec![1usize; folders.len()];
    let mut id = read_u8(r)?;
    if id == property_id::NUM_UNPACK_STREAM {
        for count in &mut counts {
            *count = read_count(r)?;
        }
        id = read_u8(r)?;
    }

    // The last size of every folder is implied by the folder's size.
    let mut substreams = Vec::new();
    let explicit_sizes = id == property_id::SIZE;
    for (index, (folder, &count)) in folders.iter().zip(&counts).enumerate() {
        if count == 0 {
            continue;
        }
        let mut offset = 0u64;
        for _ in 0..count - 1 {
            let size = if explicit_sizes { read_number(r)? } else { 0 };
            substreams.push((index, offset, size, None));
            offset = offset
                .checked_add(size)
                .ok_or_else(|| Error::back_end("7z substream sizes overflow"))?;
        }
        let remaining = folder
            .unpack_size()
            .checked_sub(offset)
            .ok_or_else(|| Error::back_end("7z substreams exceed their folder"))?;
        substreams.push((index, offset, remaining, None));
    }
    if explicit_sizes {
        id = read_u8(r)?;
    }

    // Single-stream folders with a folder CRC carry no substream CRC.
    let mut inherited = Vec::with_capacity(substreams.len());
    for (folder, &count) in folders.iter().zip(&counts) {
        let crc = folder.unpack_crc.filter(|_| count == 1);
        inherited.extend(std::iter::repeat_n(crc, count));
    }
    loop {
        match id {
            property_id::END => break,
            property_id::CRC => {
                let missing = inherited.iter().filter(|crc| crc.is_none()).count();
                let mut defined = read_defined(r, missing)?.into_iter();
                for crc in inherited.iter_mut().filter(|crc| crc.is_none()) {
                    if defined.next() == Some(true) {
                        *crc = Some(read_u32_le(r)?);
                    }
                }
            }
            other => return Err(unexpected("substreams info", other)),
        }
        id = read_u8(r)?;
    }
    for (substream, crc) in substreams.iter_mut().zip(inherited) {
        substream.3 = crc;
    }
    Ok(substreams)
}

fn parse_times(r: &mut &[u8], entries: &mut [Entry], set: fn(&mut Entry, u64)) -> Result<()> {
    let defined = read_defined(r, entries.len())?;
    if read_u8(r)? != 0 {
        return Err(Error::back_end("external 7z times are not supported"));
    }
    for (entry, defined) in entries.iter_mut().zip(defined) {
        if defined {
            set(entry, read_u64_le(r)?);
        }
    }
    Ok(())
}

fn parse_files_info(r: &mut &[u8]) -> Result<Vec<Entry>> {
    let count = read_count(r)?;
    let mut entries = vec![Entry::default(); count];
    let mut empty_streams = vec![false; count];
    let mut empty_files = Vec::new();
    let mut anti = Vec::new();

    loop {
        let id = read_u8(r)?;
        if id == property_id::END {
            break;
        }
        let size = read_count(r)?;
        let mut data = read_bytes(r, size)?;
        let r = &mut data;
        let empty_count = empty_streams.iter().filter(|&&empty| empty).count();
        match id {
            property_id::EMPTY_STREAM => empty_streams = read_bool_vector(r, count)?,
            property_id::EMPTY_FILE => empty_files = read_bool_vector(r, empty_count)?,
            property_id::ANTI => anti = read_bool_vector(r, empty_count)?,
            property_id::NAME => {
                if read_u8(r)? != 0 {
                    return Err(Error::back_end("external 7z names are not supported"));
                }
                for entry in &mut entries {
                    entry.name = read_utf16_name(r)?;
                }
            }
            property_id::CTIME => parse_times(r, &mut entries, |e, t| e.creation_time = Some(t))?,
            property_id::ATIME => parse_times(r, &mut entries, |e, t| e.access_time = Some(t))?,
            property_id::MTIME => {
                parse_times(r, &mut entries, |e, t| e.modification_time = Some(t))?
            }
            property_id::WIN_ATTRIBUTES => {
                let defined = read_defined(r, count)?;
                if read_u8(r)? != 0 {
                    return Err(Error::back_end("external 7z attributes are not supported"));
                }
                for (entry, defined) in entries.iter_mut().zip(defined) {
                    if defined {
                        entry.attributes = Some(read_u32_le(r)?);
                    }
                }
            }
            property_id::DUMMY => {}
            other => log::trace!("skipping 7z file property {:#04x}", other),
        }
    }

    let mut empty_index = 0;
    for (entry, &empty) in entries.iter_mut().zip(&empty_streams) {
        entry.has_stream = !empty;
        if empty {
            entry.is_directory = !empty_files.get(empty_index).copied().unwrap_or(false);
            entry.is_anti = anti.get(empty_index).copied().unwrap_or(false);
            empty_index += 1;
        }
    }
    Ok(entries)
}
