//! WIFFMETA: scoped key/value metadata

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use super::{body_offset, offset16};
use crate::storage::{
    append_growing, meta_layout as layout, ChunkFile, ChunkTag, JumpTable, ListLayout,
    CHUNK_HEADER_SIZE, META_HEADER_SIZE, PAGE_SIZE,
};
use crate::{Result, WiffError};

const META_LIST: ListLayout = ListLayout {
    first_record: (PAGE_SIZE - CHUNK_HEADER_SIZE - META_HEADER_SIZE) as u16,
    table_growth: PAGE_SIZE as u16,
};

const INITIAL_PAGES: u64 = 2;

/// What a meta value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MetaLevel {
    /// The recording as a whole; the level index is always 0
    Recording = 0,
    /// A channel, by channel index
    Channel = 1,
    /// A backing file, by file index
    File = 2,
    /// A frame, by global frame index
    Frame = 3,
    /// An annotation, by global annotation index
    Annotation = 4,
    /// Another meta value
    Meta = 5,
}

impl MetaLevel {
    /// Parse the stored level byte
    #[must_use]
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Recording),
            1 => Some(Self::Channel),
            2 => Some(Self::File),
            3 => Some(Self::Frame),
            4 => Some(Self::Annotation),
            5 => Some(Self::Meta),
            _ => None,
        }
    }

    /// Upper-case level name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Recording => "RECORDING",
            Self::Channel => "CHANNEL",
            Self::File => "FILE",
            Self::Frame => "FRAME",
            Self::Annotation => "ANNOTATION",
            Self::Meta => "META",
        }
    }
}

impl fmt::Display for MetaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetaLevel {
    type Err = WiffError;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Recording,
            Self::Channel,
            Self::File,
            Self::Frame,
            Self::Annotation,
            Self::Meta,
        ]
        .into_iter()
        .find(|l| l.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| WiffError::NotFound(format!("meta level '{s}'")))
    }
}

/// Typed meta payload; numeric values are arrays of one element type
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// UTF-8 string
    String(String),
    /// 8-bit integers
    I8(Vec<i8>),
    /// 16-bit integers
    I16(Vec<i16>),
    /// 32-bit integers
    I32(Vec<i32>),
    /// 64-bit integers
    I64(Vec<i64>),
    /// 32-bit floats
    F32(Vec<f32>),
    /// 64-bit floats
    F64(Vec<f64>),
}

impl MetaValue {
    /// Stored type byte
    #[must_use]
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::String(_) => 0,
            Self::I8(_) => 1,
            Self::I16(_) => 2,
            Self::I32(_) => 3,
            Self::I64(_) => 4,
            Self::F32(_) => 5,
            Self::F64(_) => 6,
        }
    }

    /// Narrowest integer array holding every value in `values`
    #[must_use]
    pub fn integers(values: &[i64]) -> Self {
        let fits = |min: i64, max: i64| values.iter().all(|v| (min..=max).contains(v));

        if fits(i8::MIN.into(), i8::MAX.into()) {
            Self::I8(values.iter().map(|&v| v as i8).collect())
        } else if fits(i16::MIN.into(), i16::MAX.into()) {
            Self::I16(values.iter().map(|&v| v as i16).collect())
        } else if fits(i32::MIN.into(), i32::MAX.into()) {
            Self::I32(values.iter().map(|&v| v as i32).collect())
        } else {
            Self::I64(values.to_vec())
        }
    }

    fn count(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let count = u16::try_from(self.count()).map_err(|_| WiffError::RecordListFull {
            end: self.count() as u64,
        })?;

        buf.put_u8(self.type_tag());
        buf.put_u16_le(count);
        match self {
            Self::String(s) => buf.put_slice(s.as_bytes()),
            Self::I8(v) => v.iter().for_each(|&x| buf.put_i8(x)),
            Self::I16(v) => v.iter().for_each(|&x| buf.put_i16_le(x)),
            Self::I32(v) => v.iter().for_each(|&x| buf.put_i32_le(x)),
            Self::I64(v) => v.iter().for_each(|&x| buf.put_i64_le(x)),
            Self::F32(v) => v.iter().for_each(|&x| buf.put_f32_le(x)),
            Self::F64(v) => v.iter().for_each(|&x| buf.put_f64_le(x)),
        }
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> std::result::Result<Self, String> {
        if buf.remaining() < 3 {
            return Err("truncated meta value".to_string());
        }
        let tag = buf.get_u8();
        let count = usize::from(buf.get_u16_le());

        let width = match tag {
            0 | 1 => 1,
            2 => 2,
            3 | 5 => 4,
            4 | 6 => 8,
            other => return Err(format!("unknown meta value type {other}")),
        };
        if buf.remaining() < count * width {
            return Err(format!(
                "meta value needs {} bytes, has {}",
                count * width,
                buf.remaining()
            ));
        }

        Ok(match tag {
            0 => Self::String(
                String::from_utf8(buf[..count].to_vec())
                    .map_err(|e| format!("invalid UTF-8: {e}"))?,
            ),
            1 => Self::I8((0..count).map(|_| buf.get_i8()).collect()),
            2 => Self::I16((0..count).map(|_| buf.get_i16_le()).collect()),
            3 => Self::I32((0..count).map(|_| buf.get_i32_le()).collect()),
            4 => Self::I64((0..count).map(|_| buf.get_i64_le()).collect()),
            5 => Self::F32((0..count).map(|_| buf.get_f32_le()).collect()),
            _ => Self::F64((0..count).map(|_| buf.get_f64_le()).collect()),
        })
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::integers(&[v])
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::F64(vec![v])
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: &[T]) -> fmt::Result {
            if let [one] = v {
                return write!(f, "{one}");
            }
            f.write_str("[")?;
            for (i, x) in v.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{x}")?;
            }
            f.write_str("]")
        }

        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::I8(v) => list(f, v),
            Self::I16(v) => list(f, v),
            Self::I32(v) => list(f, v),
            Self::I64(v) => list(f, v),
            Self::F32(v) => list(f, v),
            Self::F64(v) => list(f, v),
        }
    }
}

/// One stored meta value
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEntry {
    /// Scope
    pub level: MetaLevel,
    /// Index within the scope
    pub level_index: u64,
    /// Application-defined key
    pub key: String,
    /// Payload
    pub value: MetaValue,
}

impl MetaEntry {
    /// Entry scoped by `level`; the recording level forces index 0
    pub fn new(level: MetaLevel, level_index: u64, key: &str, value: impl Into<MetaValue>) -> Self {
        Self {
            level,
            level_index: if level == MetaLevel::Recording { 0 } else { level_index },
            key: key.to_string(),
            value: value.into(),
        }
    }

    /// True if this entry has the given `(level, level_index, key)` identity
    #[must_use]
    pub fn is(&self, level: MetaLevel, level_index: u64, key: &str) -> bool {
        self.level == level && self.level_index == level_index && self.key == key
    }

    fn encode(&self) -> Result<BytesMut> {
        let key_start = layout::RECORD;
        let key_end = key_start + self.key.len() as u64;

        let mut data = BytesMut::new();
        self.value.encode(&mut data)?;
        let data_end = key_end + data.len() as u64;

        let mut buf = BytesMut::with_capacity(data_end as usize);
        buf.put_u16_le(offset16(key_start)?);
        buf.put_u16_le(offset16(key_end)?);
        buf.put_u16_le(offset16(key_end)?);
        buf.put_u16_le(offset16(data_end)?);
        buf.put_u8(self.level as u8);
        buf.put_u64_le(self.level_index);
        buf.put_slice(self.key.as_bytes());
        buf.put(data);
        Ok(buf)
    }

    fn decode(record: &[u8], offset: u64) -> Result<Self> {
        let malformed = |reason: String| WiffError::MalformedChunk { offset, reason };

        if record.len() < layout::RECORD as usize {
            return Err(malformed(format!("meta record of {} bytes", record.len())));
        }

        let mut buf = record;
        let key_start = usize::from(buf.get_u16_le());
        let key_end = usize::from(buf.get_u16_le());
        let data_start = usize::from(buf.get_u16_le());
        let data_end = usize::from(buf.get_u16_le());
        let level = buf.get_u8();
        let level_index = buf.get_u64_le();

        if key_start > key_end
            || data_start > data_end
            || data_end > record.len()
            || key_end > record.len()
        {
            return Err(malformed("meta record offsets out of range".to_string()));
        }

        let level = MetaLevel::from_u8(level)
            .ok_or_else(|| malformed(format!("unknown meta level {level}")))?;
        let key = std::str::from_utf8(&record[key_start..key_end])
            .map_err(|e| malformed(format!("invalid UTF-8 key: {e}")))?;
        let value = MetaValue::decode(&record[data_start..data_end]).map_err(malformed)?;

        Ok(Self {
            level,
            level_index,
            key: key.to_string(),
            value,
        })
    }
}

/// Handle on one WIFFMETA chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaBlock {
    chunk: usize,
}

impl MetaBlock {
    /// Append an empty block
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn create(file: &mut ChunkFile) -> Result<Self> {
        let chunk = file.append_chunk(ChunkTag::Meta, INITIAL_PAGES, [0; 8])?;
        let block = Self { chunk };
        let body = block.body(file)?;

        let store = file.store_mut();
        store.write_u32(body + layout::NUM_METAS, 0)?;
        store.write_u16(body + layout::INDEX_METAS, META_HEADER_SIZE as u16)?;

        debug!("Created meta block as chunk {}", chunk);

        Ok(block)
    }

    /// Handle on an existing chunk
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is missing or not a WIFFMETA chunk
    pub fn open(file: &ChunkFile, chunk: usize) -> Result<Self> {
        body_offset(file, chunk, ChunkTag::Meta)?;
        Ok(Self { chunk })
    }

    /// Chunk index within its file
    #[must_use]
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    fn body(&self, file: &ChunkFile) -> Result<u64> {
        body_offset(file, self.chunk, ChunkTag::Meta)
    }

    /// Number of values in the block
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn num_metas(&self, file: &ChunkFile) -> Result<usize> {
        Ok(file.store().read_u32(self.body(file)? + layout::NUM_METAS)? as usize)
    }

    fn list(&self, file: &ChunkFile) -> Result<JumpTable> {
        let body = self.body(file)?;
        let index = u64::from(file.store().read_u16(body + layout::INDEX_METAS)?);
        Ok(JumpTable::new(body + index, self.num_metas(file)?, META_LIST))
    }

    /// Append a value and return its block-local index
    ///
    /// Uniqueness of `(level, level_index, key)` is enforced by the caller,
    /// which sees every block of the recording.
    ///
    /// # Errors
    ///
    /// Returns `RecordListFull` once the block's offsets are exhausted
    pub fn add(&self, file: &mut ChunkFile, entry: &MetaEntry) -> Result<usize> {
        let record = entry.encode()?;

        let mut list = self.list(file)?;
        let at = append_growing(file, self.chunk, &mut list, record.len() as u64)?;
        let range = list.get(file.store(), at)?;
        let body = self.body(file)?;

        let store = file.store_mut();
        store.write(range.start, &record)?;
        store.write_u32(body + layout::NUM_METAS, (at + 1) as u32)?;

        debug!("Stored meta {} {} '{}'", entry.level, entry.level_index, entry.key);

        Ok(at)
    }

    /// Value at block-local position `index`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if out of range, or error if the record is malformed
    pub fn get(&self, file: &ChunkFile, index: usize) -> Result<MetaEntry> {
        let range = self.list(file)?.get(file.store(), index)?;
        let bytes = file.store().read(range.start, range.end - range.start)?;
        MetaEntry::decode(bytes, range.start)
    }

    /// All values in storage order
    ///
    /// # Errors
    ///
    /// Returns error if a record is malformed
    pub fn entries(&self, file: &ChunkFile) -> Result<Vec<MetaEntry>> {
        (0..self.num_metas(file)?).map(|i| self.get(file, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (ChunkFile, MetaBlock) {
        let mut file = ChunkFile::create(&dir.path().join("meta.wiff")).unwrap();
        let block = MetaBlock::create(&mut file).unwrap();
        (file, block)
    }

    #[test]
    fn test_add_and_get() {
        let dir = TempDir::new().unwrap();
        let (mut file, block) = setup(&dir);

        let entries = vec![
            MetaEntry::new(MetaLevel::Recording, 99, "patient.id", "A-123"),
            MetaEntry::new(MetaLevel::Channel, 2, "gain", MetaValue::F32(vec![1.5, 2.5])),
            MetaEntry::new(MetaLevel::Frame, 1000, "beat", 300_i64),
            MetaEntry::new(MetaLevel::File, 0, "serials", MetaValue::integers(&[1, -70_000])),
            MetaEntry::new(MetaLevel::Annotation, 3, "score", 0.25),
        ];
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(block.add(&mut file, e).unwrap(), i);
        }

        assert_eq!(block.num_metas(&file).unwrap(), 5);
        let stored = block.entries(&file).unwrap();
        assert_eq!(stored, entries);
        assert_eq!(stored[0].level_index, 0);
        assert_eq!(stored[2].value, MetaValue::I16(vec![300]));
        assert_eq!(stored[3].value, MetaValue::I32(vec![1, -70_000]));
        assert!(stored[1].is(MetaLevel::Channel, 2, "gain"));
    }

    #[test]
    fn test_record_layout() {
        let dir = TempDir::new().unwrap();
        let (mut file, block) = setup(&dir);
        block
            .add(&mut file, &MetaEntry::new(MetaLevel::Channel, 7, "k", MetaValue::I8(vec![-1])))
            .unwrap();

        let store = file.store();
        assert_eq!(store.read(0, 8).unwrap(), b"WIFFMETA");
        assert_eq!(store.read_u16(24 + 4).unwrap(), 6);
        assert_eq!(store.read_u16(24 + 6).unwrap(), 4066);
        // key 17..18, data 18..22
        assert_eq!(
            store.read(4096, 22).unwrap(),
            b"\x11\x00\x12\x00\x12\x00\x16\x00\x01\x07\x00\x00\x00\x00\x00\x00\x00k\x01\x01\x00\xff"
        );
    }

    #[test]
    fn test_levels() {
        assert_eq!("channel".parse::<MetaLevel>().unwrap(), MetaLevel::Channel);
        assert_eq!("META".parse::<MetaLevel>().unwrap(), MetaLevel::Meta);
        assert!("bogus".parse::<MetaLevel>().is_err());
        assert_eq!(MetaLevel::from_u8(4), Some(MetaLevel::Annotation));
        assert_eq!(MetaLevel::from_u8(6), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MetaValue::from("x").to_string(), "\"x\"");
        assert_eq!(MetaValue::I16(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(MetaValue::from(5_i64).to_string(), "5");
    }

    #[test]
    fn test_growth() {
        let dir = TempDir::new().unwrap();
        let (mut file, block) = setup(&dir);
        let text = "v".repeat(500);

        for i in 0..20 {
            block
                .add(&mut file, &MetaEntry::new(MetaLevel::Frame, i, "note", text.as_str()))
                .unwrap();
        }

        assert!(file.chunk(0).unwrap().size > 2 * PAGE_SIZE);
        assert_eq!(block.get(&file, 19).unwrap().level_index, 19);
    }
}
