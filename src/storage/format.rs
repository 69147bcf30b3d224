//! On-disk layout constants and fixed-size headers

use bytemuck::{Pod, Zeroable};

use crate::{Result, WiffError};

/// Growth and alignment unit for every chunk
pub const PAGE_SIZE: u64 = 4096;

/// Size of the header that starts every chunk
pub const CHUNK_HEADER_SIZE: u64 = 24;

/// Size of the fixed WIFFWAVE body header (bitmap + frame bounds)
pub const WAVE_HEADER_SIZE: u64 = 48;

/// Size of the fixed WIFFANNO body header
pub const ANNO_HEADER_SIZE: u64 = 38;

/// Size of the fixed WIFFMETA body header
pub const META_HEADER_SIZE: u64 = 6;

/// Size of the fixed WIFFINFO body header
pub const INFO_HEADER_SIZE: u64 = 44;

/// WIFFINFO format revision stored in attribute byte 0
pub const INFO_VERSION: u8 = 2;

/// Round `n` up to the next multiple of [`PAGE_SIZE`]
#[must_use]
pub const fn page_align(n: u64) -> u64 {
    n.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// Chunk type, identified by the 8-byte ASCII tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkTag {
    /// Recording catalog
    Info,
    /// Frame data for one segment
    Wave,
    /// Annotation list
    Anno,
    /// Scoped metadata values
    Meta,
}

impl ChunkTag {
    /// Raw tag bytes as written to disk
    #[must_use]
    pub const fn magic(self) -> [u8; 8] {
        match self {
            Self::Info => *b"WIFFINFO",
            Self::Wave => *b"WIFFWAVE",
            Self::Anno => *b"WIFFANNO",
            Self::Meta => *b"WIFFMETA",
        }
    }

    /// Parse raw tag bytes
    #[must_use]
    pub fn from_magic(magic: [u8; 8]) -> Option<Self> {
        match &magic {
            b"WIFFINFO" => Some(Self::Info),
            b"WIFFWAVE" => Some(Self::Wave),
            b"WIFFANNO" => Some(Self::Anno),
            b"WIFFMETA" => Some(Self::Meta),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(&self.magic()).unwrap_or("WIFF????"))
    }
}

/// Compression applied to a block's payload, stored in attribute byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    /// No compression
    #[default]
    None = b'0',
    /// zlib (deflate)
    Zlib = b'Z',
    /// bzip2
    Bzip2 = b'B',
}

impl Compression {
    /// Tag byte as stored in the chunk attributes
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a tag byte
    ///
    /// # Errors
    ///
    /// Returns error if the byte is not a known compression tag
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            b'0' => Ok(Self::None),
            b'Z' => Ok(Self::Zlib),
            b'B' => Ok(Self::Bzip2),
            other => Err(WiffError::Codec(format!(
                "Unrecognized compression tag {other:#04x}"
            ))),
        }
    }
}

/// Chunk header (24 bytes)
///
/// `size` is kept in little-endian byte order; use [`ChunkHeader::size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ChunkHeader {
    /// ASCII chunk tag
    pub magic: [u8; 8],

    /// Total chunk size including this header (little-endian)
    size_le: [u8; 8],

    /// Chunk-type specific attribute bytes
    pub attributes: [u8; 8],
}

static_assertions::const_assert_eq!(std::mem::size_of::<ChunkHeader>(), CHUNK_HEADER_SIZE as usize);

impl ChunkHeader {
    /// Build a header
    #[must_use]
    pub fn new(tag: ChunkTag, size: u64, attributes: [u8; 8]) -> Self {
        Self {
            magic: tag.magic(),
            size_le: size.to_le_bytes(),
            attributes,
        }
    }

    /// Total chunk size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from_le_bytes(self.size_le)
    }

    /// Set the total chunk size
    pub fn set_size(&mut self, size: u64) {
        self.size_le = size.to_le_bytes();
    }

    /// Decoded tag, if recognized
    #[must_use]
    pub fn tag(&self) -> Option<ChunkTag> {
        ChunkTag::from_magic(self.magic)
    }

    /// Parse from exactly 24 bytes
    #[must_use]
    pub fn from_bytes(bytes: &[u8; CHUNK_HEADER_SIZE as usize]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }

    /// Serialize to 24 bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE as usize] {
        let mut out = [0u8; CHUNK_HEADER_SIZE as usize];
        out.copy_from_slice(bytemuck::bytes_of(self));
        out
    }
}

/// WIFFWAVE body header (48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct WaveHeader {
    /// 256-bit channel presence vector
    pub channels: [u8; 32],

    /// First global frame index (little-endian)
    fidx_start_le: [u8; 8],

    /// One past the last global frame index (little-endian)
    fidx_end_le: [u8; 8],
}

static_assertions::const_assert_eq!(std::mem::size_of::<WaveHeader>(), WAVE_HEADER_SIZE as usize);

impl WaveHeader {
    /// Build a header
    #[must_use]
    pub fn new(channels: [u8; 32], fidx_start: u64, fidx_end: u64) -> Self {
        Self {
            channels,
            fidx_start_le: fidx_start.to_le_bytes(),
            fidx_end_le: fidx_end.to_le_bytes(),
        }
    }

    /// First global frame index
    #[must_use]
    pub fn fidx_start(&self) -> u64 {
        u64::from_le_bytes(self.fidx_start_le)
    }

    /// One past the last global frame index
    #[must_use]
    pub fn fidx_end(&self) -> u64 {
        u64::from_le_bytes(self.fidx_end_le)
    }
}

/// Byte offsets of the WIFFINFO body fields
pub(crate) mod info {
    pub const INDEX_START: u64 = 0;
    pub const INDEX_END: u64 = 2;
    pub const INDEX_DESCRIPTION: u64 = 4;
    pub const INDEX_CHANNELS: u64 = 6;
    pub const INDEX_FILE_START: u64 = 8;
    pub const INDEX_FILE_END: u64 = 10;
    pub const FS: u64 = 12;
    pub const NUM_CHANNELS: u64 = 16;
    pub const NUM_FILES: u64 = 18;
    pub const NUM_FRAMES: u64 = 20;
    pub const NUM_ANNOTATIONS: u64 = 28;
    pub const NUM_METAS: u64 = 36;

    /// Channel record header length (name follows)
    pub const CHANNEL_RECORD: u64 = 10;
    /// File record header length (name follows)
    pub const FILE_RECORD: u64 = 37;
}

/// Byte offsets of the WIFFANNO body fields
pub(crate) mod anno {
    pub const AIDX_START: u64 = 0;
    pub const AIDX_END: u64 = 8;
    pub const FIDX_FIRST: u64 = 16;
    pub const FIDX_LAST: u64 = 24;
    pub const NUM_ANNOTATIONS: u64 = 32;
    pub const INDEX_ANNOTATIONS: u64 = 36;

    /// Common record prefix: type + frame range
    pub const RECORD_PREFIX: u64 = 17;
}

/// Byte offsets of the WIFFMETA body fields
pub(crate) mod meta {
    pub const NUM_METAS: u64 = 0;
    pub const INDEX_METAS: u64 = 4;

    /// Meta record header length (key follows)
    pub const RECORD: u64 = 17;
}
