//! Byte layout of `.pnt` artifacts.
//!
//! ```text
//! magic "PNT " | version u16 | compression u8 | fingerprint_len u32 | fingerprint
//! checksum [u8; 32]
//! string table | value table | section index | section payloads
//! ```
//!
//! Integers are little-endian. With [`Compression::Deflate`] every byte
//! after the header is one deflate stream. The checksum is the SHA-256 of
//! the stored body bytes, compressed or not. The tables are described on
//! [`crate::compile`].

use std::fmt;
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHasher;
use sha2::{Digest, Sha256};

use crate::error::{CompileError, LoadError};

pub const MAGIC: [u8; 4] = *b"PNT ";

/// The only version this build reads or writes.
pub const FORMAT_VERSION: u16 = 2;

pub(crate) const FINGERPRINT_LEN: usize = 8 + 8 + 4 + 8;

pub(crate) const CHECKSUM_LEN: usize = 32;

/// Magic, version, compression and fingerprint length.
const PREFIX_LEN: usize = 4 + 2 + 1 + 4;

pub(crate) const HEADER_LEN: usize = PREFIX_LEN + FINGERPRINT_LEN + CHECKSUM_LEN;

pub(crate) const TAG_NULL: u8 = 0;
pub(crate) const TAG_BOOL: u8 = 1;
pub(crate) const TAG_INT: u8 = 2;
pub(crate) const TAG_FLOAT: u8 = 3;
pub(crate) const TAG_STRING: u8 = 4;
pub(crate) const TAG_ARRAY: u8 = 5;
pub(crate) const TAG_OBJECT: u8 = 6;
pub(crate) const TAG_CALL: u8 = 7;

/// Compression applied to everything after the header.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Compression {
    #[default]
    None,
    Deflate,
}

impl Compression {
    fn to_byte(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Deflate => 1,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Compression::None),
            1 => Some(Compression::Deflate),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Deflate => "deflate",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "deflate" => Ok(Compression::Deflate),
            other => Err(format!(
                "unknown compression `{other}` (expected `none` or `deflate`)"
            )),
        }
    }
}

/// Identity of the source an artifact was compiled from, and of the
/// resolution context it was compiled under.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    pub content_hash: u64,
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    /// Hash of whatever besides the source shaped the artifact: the
    /// environment, the operator set, the compression.
    pub context_hash: u64,
}

impl Fingerprint {
    pub fn new(source: &[u8], mtime: Option<SystemTime>) -> Self {
        let since_epoch = mtime
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();
        Fingerprint {
            content_hash: hash_bytes(source),
            mtime_secs: since_epoch.as_secs(),
            mtime_nanos: since_epoch.subsec_nanos(),
            context_hash: 0,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context_hash: u64) -> Self {
        self.context_hash = context_hash;
        self
    }

    /// Read and fingerprint the file at `path`.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let mtime = fs::metadata(path)?.modified().ok();
        Ok(Fingerprint::new(&bytes, mtime))
    }

    /// Same source bytes under the same context, regardless of
    /// modification time.
    pub fn same_content(&self, other: &Fingerprint) -> bool {
        self.content_hash == other.content_hash && self.context_hash == other.context_hash
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content_hash.to_le_bytes());
        out.extend_from_slice(&self.mtime_secs.to_le_bytes());
        out.extend_from_slice(&self.mtime_nanos.to_le_bytes());
        out.extend_from_slice(&self.context_hash.to_le_bytes());
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, LoadError> {
        Ok(Fingerprint {
            content_hash: reader.u64("fingerprint hash")?,
            mtime_secs: reader.u64("fingerprint mtime")?,
            mtime_nanos: reader.u32("fingerprint mtime")?,
            context_hash: reader.u64("fingerprint context")?,
        })
    }
}

/// `FxHash` of `bytes`, the content half of a [`Fingerprint`].
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.write_usize(bytes.len());
    hasher.finish()
}

/// SHA-256 of the stored body, as recorded in the header.
pub fn body_checksum(stored: &[u8]) -> [u8; CHECKSUM_LEN] {
    Sha256::digest(stored).into()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u16,
    pub compression: Compression,
    pub fingerprint: Fingerprint,
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Header {
    pub(crate) fn new(
        compression: Compression,
        fingerprint: Fingerprint,
        checksum: [u8; CHECKSUM_LEN],
    ) -> Self {
        Header {
            version: FORMAT_VERSION,
            compression,
            fingerprint,
            checksum,
        }
    }

    /// Fail unless `stored`, the bytes after the header, hash to the
    /// recorded checksum.
    pub(crate) fn verify(&self, stored: &[u8]) -> Result<(), LoadError> {
        if body_checksum(stored) == self.checksum {
            Ok(())
        } else {
            Err(LoadError::corruption("checksum mismatch"))
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.compression.to_byte());
        out.extend_from_slice(&(FINGERPRINT_LEN as u32).to_le_bytes());
        self.fingerprint.encode(out);
        out.extend_from_slice(&self.checksum);
    }

    /// Parse the header at the start of `bytes`.
    ///
    /// The version is checked before anything past it is read, so an
    /// artifact from another format version fails with
    /// [`LoadError::VersionMismatch`] even if its layout changed.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
            return Err(LoadError::Format);
        }
        let mut reader = ByteReader::new(bytes);
        reader.skip(MAGIC.len());
        let version = reader.u16("version")?;
        if version != FORMAT_VERSION {
            return Err(LoadError::VersionMismatch {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let compression_byte = reader.u8("compression")?;
        let compression = Compression::from_byte(compression_byte).ok_or_else(|| {
            LoadError::corruption(format!("unknown compression id {compression_byte}"))
        })?;
        let fingerprint_len = reader.u32("fingerprint length")?;
        if fingerprint_len as usize != FINGERPRINT_LEN {
            return Err(LoadError::corruption(format!(
                "fingerprint length {fingerprint_len}, expected {FINGERPRINT_LEN}"
            )));
        }
        let fingerprint = Fingerprint::decode(&mut reader)?;
        let checksum = reader.array("checksum")?;
        Ok(Header {
            version,
            compression,
            fingerprint,
            checksum,
        })
    }
}

/// Read only the header of the artifact at `path`.
pub fn read_header(path: &Path) -> Result<Header, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::io(path, source))?;
    let mut prefix = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|source| LoadError::io(path, source))?;
    Header::decode(&prefix)
}

/// Convert a length or index to its on-disk width.
pub(crate) fn to_u32(n: usize, what: &'static str) -> Result<u32, CompileError> {
    u32::try_from(n).map_err(|_| CompileError::TooLarge { what })
}

pub(crate) fn put_u32(out: &mut Vec<u8>, n: u32) {
    out.extend_from_slice(&n.to_le_bytes());
}

/// Bounds-checked little-endian reads. Running off the end is corruption.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    pub(crate) fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], LoadError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                LoadError::corruption(format!("truncated {what} at byte {}", self.pos))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], LoadError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, what)?);
        Ok(buf)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, LoadError> {
        Ok(self.array::<1>(what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &str) -> Result<u16, LoadError> {
        self.array(what).map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32, LoadError> {
        self.array(what).map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self, what: &str) -> Result<u64, LoadError> {
        self.array(what).map(u64::from_le_bytes)
    }

    pub(crate) fn i64(&mut self, what: &str) -> Result<i64, LoadError> {
        self.array(what).map(i64::from_le_bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
