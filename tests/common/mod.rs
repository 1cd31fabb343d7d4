//! Shared test utilities for integration tests.
//!
//! Archive and ciphertext fixtures are built on the fly so the tests carry
//! no binary files.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use stackvfs::{Context, ContextConfig, PathSpec};

/// Key used by the AES fixtures.
pub const AES_KEY: &[u8] = b"This is a key123";
/// Initialization vector used by the AES fixtures.
pub const AES_IV: &[u8] = b"This is an IV456";
/// Initialization vector used by the 64-bit block cipher fixtures.
pub const SHORT_IV: &[u8] = b"This IV!";

/// Size, mode, owner, group and modification time of the `syslog` member.
pub const SYSLOG_SIZE: usize = 1247;
pub const SYSLOG_MODE: u32 = 0o400;
pub const SYSLOG_UID: u64 = 151107;
pub const SYSLOG_GID: u64 = 5000;
pub const SYSLOG_MTIME: u64 = 1343166324;

/// Deterministic, non-repeating-looking test data.
pub fn test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// Text content of the `syslog` member.
pub fn syslog_content() -> Vec<u8> {
    let line = b"Jul 24 22:45:24 acserver kernel: [    0.000000] Initializing cgroup subsys cpuset\n";
    line.iter().copied().cycle().take(SYSLOG_SIZE).collect()
}

/// Registers the built-in formats and returns a fresh context.
pub fn context() -> Context {
    stackvfs::register_all();
    Context::new()
}

/// Registers the built-in formats and returns a context with a small
/// decryption buffer, so reads cross refill boundaries.
pub fn small_buffer_context(buffer_size: usize) -> Context {
    stackvfs::register_all();
    Context::with_config(ContextConfig::new().encrypted_buffer_size(buffer_size))
}

/// Writes `data` to `dir/name` and returns an OS path specification for it.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathSpec {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write fixture");
    PathSpec::os(path.to_string_lossy()).expect("Invalid OS path specification")
}

/// A member to place in a TAR fixture.
pub struct TarMember<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub entry_type: tar::EntryType,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub mtime: u64,
}

impl<'a> TarMember<'a> {
    /// A regular file with default metadata.
    pub fn file(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            entry_type: tar::EntryType::Regular,
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            mtime: 1_600_000_000,
        }
    }

    /// An explicit directory record.
    pub fn directory(name: &'a str) -> Self {
        Self {
            entry_type: tar::EntryType::Directory,
            mode: 0o755,
            ..Self::file(name, b"")
        }
    }

    /// A symbolic link; the target is stored in the header.
    pub fn symlink(name: &'a str, target: &'a str) -> Self {
        Self {
            entry_type: tar::EntryType::Symlink,
            mode: 0o777,
            ..Self::file(name, target.as_bytes())
        }
    }
}

/// Writes a TAR archive with GNU headers and returns its path.
///
/// Members are written exactly as given; no directory records are added.
pub fn write_tar(dir: &Path, name: &str, members: &[TarMember<'_>]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).expect("Failed to create archive");
    let mut builder = tar::Builder::new(file);
    for member in members {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(member.entry_type);
        header.set_mode(member.mode);
        header.set_uid(member.uid);
        header.set_gid(member.gid);
        header.set_mtime(member.mtime);
        if member.entry_type == tar::EntryType::Symlink {
            header.set_size(0);
            builder
                .append_link(&mut header, member.name, std::str::from_utf8(member.data).unwrap())
                .expect("Failed to append link");
        } else {
            header.set_size(member.data.len() as u64);
            builder
                .append_data(&mut header, member.name, member.data)
                .expect("Failed to append member");
        }
    }
    builder.finish().expect("Failed to finish archive");
    path
}

/// Writes the `syslog.tar` fixture: one `syslog` member with known metadata.
pub fn write_syslog_tar(dir: &Path) -> PathSpec {
    let content = syslog_content();
    let member = TarMember {
        name: "syslog",
        data: &content,
        entry_type: tar::EntryType::Regular,
        mode: SYSLOG_MODE,
        uid: SYSLOG_UID,
        gid: SYSLOG_GID,
        mtime: SYSLOG_MTIME,
    };
    let path = write_tar(dir, "syslog.tar", &[member]);
    PathSpec::os(path.to_string_lossy()).expect("Invalid OS path specification")
}

/// Writes an archive whose directories are only implied by member names.
pub fn write_nested_tar(dir: &Path) -> PathSpec {
    let path = write_tar(
        dir,
        "nested.tar",
        &[
            TarMember::file("a/b/file1", b"first file\n"),
            TarMember::file("a/c/file2", b"second file\n"),
        ],
    );
    PathSpec::os(path.to_string_lossy()).expect("Invalid OS path specification")
}

/// Expanded size of the sparse `disk.img` member.
pub const SPARSE_SIZE: usize = 2048;

/// Expanded content of `disk.img`: 512 bytes of data, a 1 KiB hole, then
/// 512 more bytes of data.
pub fn sparse_content() -> Vec<u8> {
    let mut data = vec![b'A'; 512];
    data.resize(1536, 0);
    data.extend(std::iter::repeat_n(b'B', 512));
    data
}

/// Writes `sparse.tar`: an old GNU sparse member `disk.img` followed by a
/// regular member `after.txt`.
pub fn write_sparse_tar(dir: &Path) -> PathSpec {
    let mut header = tar::Header::new_gnu();
    header.set_path("disk.img").expect("Failed to set path");
    header.set_entry_type(tar::EntryType::GNUSparse);
    header.set_mode(0o644);
    header.set_mtime(1_600_000_000);
    // The stored size counts only the data pieces.
    header.set_size(1024);
    {
        let gnu = header.as_gnu_mut().expect("GNU header");
        gnu.sparse[0].set_offset(0);
        gnu.sparse[0].set_length(512);
        gnu.sparse[1].set_offset(1536);
        gnu.sparse[1].set_length(512);
        gnu.set_real_size(SPARSE_SIZE as u64);
    }
    header.set_cksum();

    let mut pieces = vec![b'A'; 512];
    pieces.extend(std::iter::repeat_n(b'B', 512));

    let path = dir.join("sparse.tar");
    let file = File::create(&path).expect("Failed to create archive");
    let mut builder = tar::Builder::new(file);
    builder
        .append(&header, pieces.as_slice())
        .expect("Failed to append sparse member");
    let mut after = tar::Header::new_gnu();
    after.set_mode(0o644);
    after.set_size(6);
    builder
        .append_data(&mut after, "after.txt", &b"after\n"[..])
        .expect("Failed to append member");
    builder.finish().expect("Failed to finish archive");
    PathSpec::os(path.to_string_lossy()).expect("Invalid OS path specification")
}

/// A writer for small 7z archives.
///
/// All file data goes into one solid folder, stored or LZMA2-compressed,
/// with a CRC per file. Directories are only written when given.
pub mod seven_z {
    use std::io::Write;

    const SIGNATURE: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

    const END: u8 = 0x00;
    const HEADER: u8 = 0x01;
    const MAIN_STREAMS_INFO: u8 = 0x04;
    const FILES_INFO: u8 = 0x05;
    const PACK_INFO: u8 = 0x06;
    const UNPACK_INFO: u8 = 0x07;
    const SUBSTREAMS_INFO: u8 = 0x08;
    const SIZE: u8 = 0x09;
    const CRC: u8 = 0x0A;
    const FOLDER: u8 = 0x0B;
    const CODERS_UNPACK_SIZE: u8 = 0x0C;
    const NUM_UNPACK_STREAM: u8 = 0x0D;
    const EMPTY_STREAM: u8 = 0x0E;
    const EMPTY_FILE: u8 = 0x0F;
    const NAME: u8 = 0x11;
    const PROPERTY_CTIME: u8 = 0x12;
    const PROPERTY_ATIME: u8 = 0x13;
    const PROPERTY_MTIME: u8 = 0x14;
    const WIN_ATTRIBUTES: u8 = 0x15;
    const ENCODED_HEADER: u8 = 0x17;

    /// How the solid folder is stored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Method {
        Copy,
        Lzma2,
    }

    /// A file or directory record.
    #[derive(Debug, Clone, Default)]
    pub struct Member<'a> {
        pub name: &'a str,
        /// `None` for a directory.
        pub data: Option<&'a [u8]>,
        /// Windows FILETIME values.
        pub mtime: Option<u64>,
        pub atime: Option<u64>,
        pub ctime: Option<u64>,
        /// Unix `st_mode`, stored in the high half of the attributes.
        pub mode: Option<u32>,
    }

    impl<'a> Member<'a> {
        pub fn file(name: &'a str, data: &'a [u8]) -> Self {
            Self {
                name,
                data: Some(data),
                ..Self::default()
            }
        }

        pub fn directory(name: &'a str) -> Self {
            Self {
                name,
                ..Self::default()
            }
        }

        pub fn times(self, mtime: u64, atime: u64, ctime: u64) -> Self {
            Self {
                mtime: Some(mtime),
                atime: Some(atime),
                ctime: Some(ctime),
                ..self
            }
        }

        pub fn mode(self, mode: u32) -> Self {
            Self {
                mode: Some(mode),
                ..self
            }
        }
    }

    fn number(out: &mut Vec<u8>, value: u64) {
        for extra in 0..8usize {
            if value < 1u64 << (7 * (extra + 1)) {
                let high = (value >> (8 * extra)) as u8;
                out.push(!(0xFFu8 >> extra) | high);
                out.extend_from_slice(&value.to_le_bytes()[..extra]);
                return;
            }
        }
        out.push(0xFF);
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn bits(flags: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; flags.len().div_ceil(8)];
        for (i, _) in flags.iter().enumerate().filter(|(_, flag)| **flag) {
            out[i / 8] |= 0x80 >> (i % 8);
        }
        out
    }

    fn property(out: &mut Vec<u8>, id: u8, body: &[u8]) {
        out.push(id);
        number(out, body.len() as u64);
        out.extend_from_slice(body);
    }

    fn pack(method: Method, data: &[u8]) -> Vec<u8> {
        match method {
            Method::Copy => data.to_vec(),
            Method::Lzma2 => {
                let mut packed = Vec::new();
                let mut options = lzma_rust2::Lzma2Options::with_preset(6);
                options.lzma_options.dict_size = 1 << 16;
                let mut writer = lzma_rust2::Lzma2Writer::new(&mut packed, options);
                writer.write_all(data).unwrap();
                writer.finish().unwrap();
                packed
            }
        }
    }

    /// Writes pack and unpack info for one single-coder folder.
    fn folder_info(
        out: &mut Vec<u8>,
        method: Method,
        pack_pos: usize,
        packed_len: usize,
        unpack_len: usize,
        crc: Option<u32>,
    ) {
        out.push(PACK_INFO);
        number(out, pack_pos as u64);
        number(out, 1);
        out.push(SIZE);
        number(out, packed_len as u64);
        out.push(END);

        out.push(UNPACK_INFO);
        out.push(FOLDER);
        number(out, 1);
        out.push(0);
        number(out, 1);
        match method {
            Method::Copy => out.extend_from_slice(&[0x01, 0x00]),
            Method::Lzma2 => out.extend_from_slice(&[0x21, 0x21, 0x01, 8]),
        }
        out.push(CODERS_UNPACK_SIZE);
        number(out, unpack_len as u64);
        if let Some(crc) = crc {
            out.push(CRC);
            out.push(1);
            out.extend_from_slice(&crc.to_le_bytes());
        }
        out.push(END);
    }

    fn times(out: &mut Vec<u8>, id: u8, values: &[Option<u64>]) {
        if values.iter().all(Option::is_none) {
            return;
        }
        let mut body = Vec::new();
        if values.iter().all(Option::is_some) {
            body.push(1);
        } else {
            body.push(0);
            body.extend(bits(&values.iter().map(Option::is_some).collect::<Vec<_>>()));
        }
        body.push(0);
        for value in values.iter().flatten() {
            body.extend_from_slice(&value.to_le_bytes());
        }
        property(out, id, &body);
    }

    /// Builds the bytes of an archive holding `members`.
    ///
    /// With `encode_header` the archive header itself is packed with
    /// `method` and described by an encoded header.
    pub fn archive(members: &[Member<'_>], method: Method, encode_header: bool) -> Vec<u8> {
        let streams: Vec<&[u8]> = members
            .iter()
            .filter_map(|member| member.data)
            .filter(|data| !data.is_empty())
            .collect();
        let solid = streams.concat();

        let mut body = Vec::new();
        let mut header = vec![HEADER];
        if !streams.is_empty() {
            body = pack(method, &solid);
            header.push(MAIN_STREAMS_INFO);
            folder_info(&mut header, method, 0, body.len(), solid.len(), None);
            header.push(SUBSTREAMS_INFO);
            header.push(NUM_UNPACK_STREAM);
            number(&mut header, streams.len() as u64);
            if streams.len() > 1 {
                header.push(SIZE);
                for stream in &streams[..streams.len() - 1] {
                    number(&mut header, stream.len() as u64);
                }
            }
            header.push(CRC);
            header.push(1);
            for stream in &streams {
                header.extend_from_slice(&crc32fast::hash(stream).to_le_bytes());
            }
            header.push(END);
            header.push(END);
        }

        header.push(FILES_INFO);
        number(&mut header, members.len() as u64);
        let empty_streams: Vec<bool> = members
            .iter()
            .map(|member| member.data.is_none_or(<[u8]>::is_empty))
            .collect();
        if empty_streams.contains(&true) {
            property(&mut header, EMPTY_STREAM, &bits(&empty_streams));
            let empty_files: Vec<bool> = members
                .iter()
                .zip(&empty_streams)
                .filter(|(_, empty)| **empty)
                .map(|(member, _)| member.data.is_some())
                .collect();
            if empty_files.contains(&true) {
                property(&mut header, EMPTY_FILE, &bits(&empty_files));
            }
        }
        let mut names = vec![0u8];
        for member in members {
            for unit in member.name.encode_utf16() {
                names.extend_from_slice(&unit.to_le_bytes());
            }
            names.extend_from_slice(&[0, 0]);
        }
        property(&mut header, NAME, &names);
        let column = |f: fn(&Member<'_>) -> Option<u64>| members.iter().map(f).collect::<Vec<_>>();
        times(&mut header, PROPERTY_CTIME, &column(|member| member.ctime));
        times(&mut header, PROPERTY_ATIME, &column(|member| member.atime));
        times(&mut header, PROPERTY_MTIME, &column(|member| member.mtime));
        if members.iter().any(|member| member.mode.is_some()) {
            let mut attributes = vec![1u8, 0];
            for member in members {
                let mut value = if member.data.is_none() { 0x10 } else { 0x20 };
                if let Some(mode) = member.mode {
                    value |= 0x8000 | (mode << 16);
                }
                attributes.extend_from_slice(&u32::to_le_bytes(value));
            }
            property(&mut header, WIN_ATTRIBUTES, &attributes);
        }
        header.push(END);
        header.push(END);

        if encode_header {
            let packed_header = pack(method, &header);
            let mut encoded = vec![ENCODED_HEADER];
            folder_info(
                &mut encoded,
                method,
                body.len(),
                packed_header.len(),
                header.len(),
                Some(crc32fast::hash(&header)),
            );
            encoded.push(END);
            body.extend_from_slice(&packed_header);
            header = encoded;
        }

        let mut fields = Vec::with_capacity(20);
        fields.extend_from_slice(&(body.len() as u64).to_le_bytes());
        fields.extend_from_slice(&(header.len() as u64).to_le_bytes());
        fields.extend_from_slice(&crc32fast::hash(&header).to_le_bytes());

        let mut out = SIGNATURE.to_vec();
        out.extend_from_slice(&[0, 4]);
        out.extend_from_slice(&crc32fast::hash(&fields).to_le_bytes());
        out.extend_from_slice(&fields);
        out.extend_from_slice(&body);
        out.extend_from_slice(&header);
        out
    }

    /// Windows FILETIME ticks of the `nested.7z` timestamps.
    pub const MTIME: u64 = 130_000_000_001_234_567;
    pub const ATIME: u64 = 130_000_000_109_876_543;
    pub const CTIME: u64 = 129_999_999_990_000_001;

    /// Members of `nested.7z`: directories `a`, `a/b` and `a/c` are implied,
    /// `docs` is explicit.
    pub fn nested_members() -> Vec<Member<'static>> {
        vec![
            Member::file("a/b/file1", b"first file\n").times(MTIME, ATIME, CTIME),
            Member::file("a/c/file2", b"second file\n"),
            Member::directory("docs").times(MTIME, ATIME, CTIME).mode(0o040755),
            Member::file("docs/empty", b""),
            Member::file("docs/run.sh", b"#!/bin/sh\nexit 0\n").mode(0o100750),
        ]
    }
}

/// Writes `nested.7z` and returns an OS path specification for it.
pub fn write_nested_seven_z(dir: &Path, method: seven_z::Method, encode_header: bool) -> PathSpec {
    let data = seven_z::archive(&seven_z::nested_members(), method, encode_header);
    write_file(dir, "nested.7z", &data)
}

/// Reference encryptors built on the RustCrypto mode crates.
#[cfg(feature = "crypto")]
pub mod cipher {
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{
        AsyncStreamCipher, BlockEncryptMut, InnerIvInit, KeyInit, KeyIvInit, StreamCipher,
    };
    use stackvfs::BlockCipherMode;

    macro_rules! encrypt_with {
        ($cipher:ty, $mode:expr, $key:expr, $iv:expr, $data:expr) => {{
            let mut buf = $data.to_vec();
            let len = buf.len();
            match $mode {
                BlockCipherMode::Cbc => {
                    cbc::Encryptor::<$cipher>::new_from_slices($key, $iv)
                        .unwrap()
                        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                        .unwrap();
                }
                BlockCipherMode::Ecb => {
                    ecb::Encryptor::<$cipher>::new_from_slice($key)
                        .unwrap()
                        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
                        .unwrap();
                }
                BlockCipherMode::Ofb => {
                    // `Ofb::new_from_slices` insists on the nominal key size, so
                    // build the core from a variable-length-keyed cipher instead.
                    let cipher = <$cipher>::new_from_slice($key).unwrap();
                    ofb::Ofb::<$cipher>::from_core(
                        ofb::OfbCore::inner_iv_slice_init(cipher, $iv).unwrap(),
                    )
                    .apply_keystream(&mut buf);
                }
                BlockCipherMode::Cfb => {
                    cfb8::Encryptor::<$cipher>::new_from_slices($key, $iv)
                        .unwrap()
                        .encrypt(&mut buf);
                }
            }
            buf
        }};
    }

    /// Encrypts with AES-128; CFB uses 8-bit segments.
    ///
    /// Block modes require `data` to be a multiple of 16 bytes.
    pub fn aes(mode: BlockCipherMode, key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        encrypt_with!(aes::Aes128, mode, key, iv, data)
    }

    /// Encrypts with Blowfish; CFB uses 8-bit segments.
    pub fn blowfish(mode: BlockCipherMode, key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        encrypt_with!(blowfish::Blowfish, mode, key, iv, data)
    }

    /// Encrypts with two-key Triple-DES; CFB uses 8-bit segments.
    pub fn des3(mode: BlockCipherMode, key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        encrypt_with!(des::TdesEde2, mode, key, iv, data)
    }

    /// Encrypts with AES-128 in CFB mode with full-block segments.
    pub fn aes_cfb128(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        let mut buf = data.to_vec();
        cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
            .unwrap()
            .encrypt(&mut buf);
        buf
    }
}
