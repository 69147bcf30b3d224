//! WIFFANNO: frame-ranged comments and markers

use std::fmt;
use std::ops::RangeInclusive;

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use super::{body_offset, offset16};
use crate::storage::{
    anno_layout as layout, append_growing, ChunkFile, ChunkTag, Compression, JumpTable,
    ListLayout, ANNO_HEADER_SIZE, CHUNK_HEADER_SIZE, PAGE_SIZE,
};
use crate::{Result, WiffError};

/// Jump table fills the first page, records start on the second
const ANNO_LIST: ListLayout = ListLayout {
    first_record: (PAGE_SIZE - CHUNK_HEADER_SIZE - ANNO_HEADER_SIZE) as u16,
    table_growth: PAGE_SIZE as u16,
};

/// Pages in a freshly created block
const INITIAL_PAGES: u64 = 2;

/// Four-character marker code stored as a little-endian u32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerCode(u32);

impl MarkerCode {
    /// Code from exactly four ASCII bytes, eg `"QRS "`
    ///
    /// # Errors
    ///
    /// Returns `InvalidAnnotation` for any other input
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 4 || !code.is_ascii() {
            return Err(WiffError::InvalidAnnotation(format!(
                "marker code '{code}' is not 4 ASCII characters"
            )));
        }
        Ok(Self(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
    }

    /// Code from its stored form
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Stored form
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MarkerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.to_le_bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Annotation type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnnotationKind {
    /// Free text
    Comment = b'C',
    /// Marker code
    Marker = b'M',
    /// Marker code with a signed value
    MarkerWithValue = b'D',
}

impl AnnotationKind {
    /// Discriminator byte
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a discriminator byte
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'C' => Some(Self::Comment),
            b'M' => Some(Self::Marker),
            b'D' => Some(Self::MarkerWithValue),
            _ => None,
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// Annotation over the inclusive frame range `fidx_start..=fidx_end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Free text
    Comment {
        /// First frame
        fidx_start: u64,
        /// Last frame
        fidx_end: u64,
        /// Comment text
        text: String,
    },
    /// Marker
    Marker {
        /// First frame
        fidx_start: u64,
        /// Last frame
        fidx_end: u64,
        /// Marker code
        code: MarkerCode,
    },
    /// Marker carrying a value
    MarkerWithValue {
        /// First frame
        fidx_start: u64,
        /// Last frame
        fidx_end: u64,
        /// Marker code
        code: MarkerCode,
        /// Value
        value: i64,
    },
}

impl Annotation {
    /// Type discriminator
    #[must_use]
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Comment { .. } => AnnotationKind::Comment,
            Self::Marker { .. } => AnnotationKind::Marker,
            Self::MarkerWithValue { .. } => AnnotationKind::MarkerWithValue,
        }
    }

    /// Annotated frames
    #[must_use]
    pub fn frames(&self) -> RangeInclusive<u64> {
        match *self {
            Self::Comment {
                fidx_start,
                fidx_end,
                ..
            }
            | Self::Marker {
                fidx_start,
                fidx_end,
                ..
            }
            | Self::MarkerWithValue {
                fidx_start,
                fidx_end,
                ..
            } => fidx_start..=fidx_end,
        }
    }

    /// Check the fields required by the annotation type
    ///
    /// # Errors
    ///
    /// Returns `InvalidAnnotation` for an inverted frame range or one ending
    /// at `u64::MAX`
    pub fn validate(&self) -> Result<()> {
        let frames = self.frames();
        if frames.end() < frames.start() {
            return Err(WiffError::InvalidAnnotation(format!(
                "frame range {}..={} is inverted",
                frames.start(),
                frames.end()
            )));
        }

        if *frames.end() == u64::MAX {
            return Err(WiffError::InvalidAnnotation(
                "frame range cannot end at u64::MAX".to_string(),
            ));
        }

        Ok(())
    }

    fn encode(&self) -> Result<BytesMut> {
        let frames = self.frames();
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(self.kind().tag());
        buf.put_u64_le(*frames.start());
        buf.put_u64_le(*frames.end());

        match self {
            Self::Comment { text, .. } => {
                let start = layout::RECORD_PREFIX + 4;
                buf.put_u16_le(offset16(start)?);
                buf.put_u16_le(offset16(start + text.len() as u64)?);
                buf.put_slice(text.as_bytes());
            }
            Self::Marker { code, .. } => buf.put_u32_le(code.raw()),
            Self::MarkerWithValue { code, value, .. } => {
                buf.put_u32_le(code.raw());
                buf.put_i64_le(*value);
            }
        }

        Ok(buf)
    }

    fn decode(record: &[u8], offset: u64) -> Result<Self> {
        let malformed = |reason: String| WiffError::MalformedChunk { offset, reason };

        let prefix = layout::RECORD_PREFIX as usize;
        if record.len() < prefix {
            return Err(malformed(format!("annotation record of {} bytes", record.len())));
        }

        let mut buf = record;
        let tag = buf.get_u8();
        let fidx_start = buf.get_u64_le();
        let fidx_end = buf.get_u64_le();

        let kind = AnnotationKind::from_tag(tag)
            .ok_or_else(|| malformed(format!("unknown annotation type {tag:#04x}")))?;

        let needed = match kind {
            AnnotationKind::Comment | AnnotationKind::Marker => 4,
            AnnotationKind::MarkerWithValue => 12,
        };
        if buf.remaining() < needed {
            return Err(malformed(format!("truncated '{kind}' annotation")));
        }

        Ok(match kind {
            AnnotationKind::Comment => {
                let start = usize::from(buf.get_u16_le());
                let end = usize::from(buf.get_u16_le());
                if start > end || end > record.len() {
                    return Err(malformed(format!("comment range {start}..{end}")));
                }
                let text = std::str::from_utf8(&record[start..end])
                    .map_err(|e| malformed(format!("invalid UTF-8 comment: {e}")))?;
                Self::Comment {
                    fidx_start,
                    fidx_end,
                    text: text.to_string(),
                }
            }
            AnnotationKind::Marker => Self::Marker {
                fidx_start,
                fidx_end,
                code: MarkerCode::from_raw(buf.get_u32_le()),
            },
            AnnotationKind::MarkerWithValue => Self::MarkerWithValue {
                fidx_start,
                fidx_end,
                code: MarkerCode::from_raw(buf.get_u32_le()),
                value: buf.get_i64_le(),
            },
        })
    }
}

/// Annotation filter; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationQuery {
    /// Only annotations of this type
    pub kind: Option<AnnotationKind>,
    /// Only annotations intersecting these frames
    pub frames: Option<RangeInclusive<u64>>,
}

impl AnnotationQuery {
    /// Match everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one annotation type
    #[must_use]
    pub fn kind(mut self, kind: AnnotationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to annotations touching frame `fidx`
    #[must_use]
    pub fn frame(self, fidx: u64) -> Self {
        self.frames(fidx..=fidx)
    }

    /// Restrict to annotations intersecting `frames`
    #[must_use]
    pub fn frames(mut self, frames: RangeInclusive<u64>) -> Self {
        self.frames = Some(frames);
        self
    }

    fn intersects(&self, other: &RangeInclusive<u64>) -> bool {
        self.frames
            .as_ref()
            .map_or(true, |f| f.start() <= other.end() && other.start() <= f.end())
    }

    /// True if `annotation` passes the filter
    #[must_use]
    pub fn matches(&self, annotation: &Annotation) -> bool {
        self.kind.map_or(true, |k| k == annotation.kind()) && self.intersects(&annotation.frames())
    }
}

/// Handle on one WIFFANNO chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnoBlock {
    chunk: usize,
}

impl AnnoBlock {
    /// Append an empty block whose first annotation gets global index
    /// `aidx_start`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn create(file: &mut ChunkFile, compression: Compression, aidx_start: u64) -> Result<Self> {
        let mut attributes = [0u8; 8];
        attributes[0] = compression.tag();

        let chunk = file.append_chunk(ChunkTag::Anno, INITIAL_PAGES, attributes)?;
        let block = Self { chunk };
        let body = block.body(file)?;

        let store = file.store_mut();
        store.write_u64(body + layout::AIDX_START, aidx_start)?;
        store.write_u64(body + layout::AIDX_END, aidx_start)?;
        store.write_u64(body + layout::FIDX_FIRST, 0)?;
        store.write_u64(body + layout::FIDX_LAST, 0)?;
        store.write_u32(body + layout::NUM_ANNOTATIONS, 0)?;
        store.write_u16(body + layout::INDEX_ANNOTATIONS, ANNO_HEADER_SIZE as u16)?;

        debug!("Created annotation block at index {}", aidx_start);

        Ok(block)
    }

    /// Handle on an existing chunk
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is missing or not a WIFFANNO chunk
    pub fn open(file: &ChunkFile, chunk: usize) -> Result<Self> {
        body_offset(file, chunk, ChunkTag::Anno)?;
        Ok(Self { chunk })
    }

    /// Chunk index within its file
    #[must_use]
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    fn body(&self, file: &ChunkFile) -> Result<u64> {
        body_offset(file, self.chunk, ChunkTag::Anno)
    }

    fn read_u64(&self, file: &ChunkFile, field: u64) -> Result<u64> {
        file.store().read_u64(self.body(file)? + field)
    }

    /// Global index of the first annotation
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn aidx_start(&self, file: &ChunkFile) -> Result<u64> {
        self.read_u64(file, layout::AIDX_START)
    }

    /// One past the global index of the last annotation
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn aidx_end(&self, file: &ChunkFile) -> Result<u64> {
        self.read_u64(file, layout::AIDX_END)
    }

    /// Number of annotations in the block
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn num_annotations(&self, file: &ChunkFile) -> Result<usize> {
        Ok(file.store().read_u32(self.body(file)? + layout::NUM_ANNOTATIONS)? as usize)
    }

    /// Frames covered by the block's annotations, `None` while empty
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn bounds(&self, file: &ChunkFile) -> Result<Option<RangeInclusive<u64>>> {
        if self.num_annotations(file)? == 0 {
            return Ok(None);
        }
        Ok(Some(
            self.read_u64(file, layout::FIDX_FIRST)?..=self.read_u64(file, layout::FIDX_LAST)?,
        ))
    }

    /// Compression tag from attribute byte 0
    ///
    /// # Errors
    ///
    /// Returns error if the tag is not recognized
    pub fn compression(&self, file: &ChunkFile) -> Result<Compression> {
        Compression::from_tag(file.chunk(self.chunk)?.attributes[0])
    }

    fn list(&self, file: &ChunkFile) -> Result<JumpTable> {
        let body = self.body(file)?;
        let index = u64::from(file.store().read_u16(body + layout::INDEX_ANNOTATIONS)?);
        Ok(JumpTable::new(body + index, self.num_annotations(file)?, ANNO_LIST))
    }

    /// Append an annotation and return its global index
    ///
    /// # Errors
    ///
    /// Returns `InvalidAnnotation` for invalid input, or `RecordListFull`
    /// once the block's offsets are exhausted
    pub fn add(&self, file: &mut ChunkFile, annotation: &Annotation) -> Result<u64> {
        annotation.validate()?;
        let record = annotation.encode()?;

        let mut list = self.list(file)?;
        let at = append_growing(file, self.chunk, &mut list, record.len() as u64)?;
        let range = list.get(file.store(), at)?;

        let frames = annotation.frames();
        let (first, last) = match self.bounds(file)? {
            Some(b) => ((*b.start()).min(*frames.start()), (*b.end()).max(*frames.end())),
            None => (*frames.start(), *frames.end()),
        };
        let aidx = self.aidx_end(file)?;
        let body = self.body(file)?;

        let store = file.store_mut();
        store.write(range.start, &record)?;
        store.write_u64(body + layout::FIDX_FIRST, first)?;
        store.write_u64(body + layout::FIDX_LAST, last)?;
        store.write_u64(body + layout::AIDX_END, aidx + 1)?;
        store.write_u32(body + layout::NUM_ANNOTATIONS, (at + 1) as u32)?;

        Ok(aidx)
    }

    /// Annotation at block-local position `index`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if out of range, or error if the record is malformed
    pub fn get(&self, file: &ChunkFile, index: usize) -> Result<Annotation> {
        let range = self.list(file)?.get(file.store(), index)?;
        let bytes = file.store().read(range.start, range.end - range.start)?;
        Annotation::decode(bytes, range.start)
    }

    /// All annotations with their global indices
    ///
    /// # Errors
    ///
    /// Returns error if a record is malformed
    pub fn annotations(&self, file: &ChunkFile) -> Result<Vec<(u64, Annotation)>> {
        let aidx_start = self.aidx_start(file)?;
        (0..self.num_annotations(file)?)
            .map(|i| self.get(file, i).map(|a| (aidx_start + i as u64, a)))
            .collect()
    }

    /// Annotations passing `query`, skipping the scan when the block's bounds
    /// miss the frame filter
    ///
    /// # Errors
    ///
    /// Returns error if a record is malformed
    pub fn query(
        &self,
        file: &ChunkFile,
        query: &AnnotationQuery,
    ) -> Result<Vec<(u64, Annotation)>> {
        match self.bounds(file)? {
            None => return Ok(Vec::new()),
            Some(bounds) if !query.intersects(&bounds) => return Ok(Vec::new()),
            Some(_) => {}
        }

        Ok(self
            .annotations(file)?
            .into_iter()
            .filter(|(_, a)| query.matches(a))
            .collect())
    }
}
