//! WIFFINFO: recording-wide catalog of channels, files and counters

use std::ops::Range;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use super::{body_offset, offset16, read_str};
use crate::config::{format_timestamp, ChannelConfig, RecordingConfig};
use crate::storage::{
    append_growing, info_layout as layout, page_align, ByteStore, ChunkFile, ChunkTag, JumpTable,
    ListLayout, CHUNK_HEADER_SIZE, ENTRY_SIZE, INFO_HEADER_SIZE, INFO_VERSION, PAGE_SIZE,
};
use crate::{Result, WiffError};

/// Maximum number of backing files; the file record index is one byte
pub const MAX_FILES: usize = 256;

/// Room for three file entries before the file records start
const FILE_LIST: ListLayout = ListLayout {
    first_record: 12,
    table_growth: 12,
};

/// The channel table is sized exactly once, at creation
fn channel_list(count: usize) -> ListLayout {
    ListLayout {
        first_record: (count as u64 * ENTRY_SIZE) as u16,
        table_growth: ENTRY_SIZE as u16,
    }
}

/// Channel definition as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Channel index (position in the catalog)
    pub index: u8,
    /// Channel name
    pub name: String,
    /// Physical unit
    pub unit: String,
    /// Arbitrary comment
    pub comment: String,
    /// Bits per sample
    pub bits: u8,
}

impl Channel {
    /// Bytes used to store one sample: `ceil(bits / 8)`
    #[must_use]
    pub fn storage_bytes(&self) -> usize {
        usize::from(self.bits).div_ceil(8)
    }
}

/// Backing file registered in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Position in the file table
    pub index: usize,
    /// File name, relative to the primary file's directory
    pub name: String,
    /// First frame index stored in this file
    pub fidx_start: u64,
    /// One past the last frame index stored in this file
    pub fidx_end: u64,
    /// First annotation index stored in this file
    pub aidx_start: u64,
    /// One past the last annotation index stored in this file
    pub aidx_end: u64,
}

/// Body length needed for `config` with the primary file `primary_name`
pub(crate) fn planned_body_len(config: &RecordingConfig, primary_name: &str) -> u64 {
    let strings = format_timestamp(&config.start).len()
        + format_timestamp(&config.end).len()
        + config.description.len();

    let channels: u64 = config
        .channels
        .iter()
        .map(|c| ENTRY_SIZE + channel_record_len(c))
        .sum();

    INFO_HEADER_SIZE
        + strings as u64
        + channels
        + u64::from(FILE_LIST.first_record)
        + layout::FILE_RECORD
        + primary_name.len() as u64
}

fn channel_record_len(c: &ChannelConfig) -> u64 {
    layout::CHANNEL_RECORD + (c.name.len() + c.unit.len() + c.comment.len()) as u64
}

fn encode_channel(index: u8, c: &ChannelConfig) -> Result<BytesMut> {
    let name_at = layout::CHANNEL_RECORD;
    let unit_at = name_at + c.name.len() as u64;
    let comment_start = unit_at + c.unit.len() as u64;
    let comment_end = comment_start + c.comment.len() as u64;

    let mut buf = BytesMut::with_capacity(comment_end as usize);
    buf.put_u8(index);
    buf.put_u16_le(offset16(name_at)?);
    buf.put_u8(c.bits);
    buf.put_u16_le(offset16(unit_at)?);
    buf.put_u16_le(offset16(comment_start)?);
    buf.put_u16_le(offset16(comment_end)?);
    buf.put_slice(c.name.as_bytes());
    buf.put_slice(c.unit.as_bytes());
    buf.put_slice(c.comment.as_bytes());
    Ok(buf)
}

fn encode_file(index: u8, name: &str, fidx: (u64, u64), aidx: (u64, u64)) -> Result<BytesMut> {
    let name_end = layout::FILE_RECORD + name.len() as u64;

    let mut buf = BytesMut::with_capacity(name_end as usize);
    buf.put_u8(index);
    buf.put_u16_le(offset16(layout::FILE_RECORD)?);
    buf.put_u16_le(offset16(name_end)?);
    buf.put_u64_le(fidx.0);
    buf.put_u64_le(fidx.1);
    buf.put_u64_le(aidx.0);
    buf.put_u64_le(aidx.1);
    buf.put_slice(name.as_bytes());
    Ok(buf)
}

/// Resolve a record-relative string `[from, to)` inside `record`
fn record_str(store: &ByteStore, record: &Range<u64>, from: u16, to: u16) -> Result<String> {
    let range = record.start + u64::from(from)..record.start + u64::from(to);
    if range.end > record.end {
        return Err(WiffError::MalformedChunk {
            offset: record.start,
            reason: format!("string ends at {} past record end {}", range.end, record.end),
        });
    }
    read_str(store, range)
}

fn read_channel(store: &ByteStore, record: &Range<u64>) -> Result<Channel> {
    let at = record.start;
    let index = store.read_u8(at)?;
    let name_at = store.read_u16(at + 1)?;
    let bits = store.read_u8(at + 3)?;
    let unit_at = store.read_u16(at + 4)?;
    let comment_start = store.read_u16(at + 6)?;
    let comment_end = store.read_u16(at + 8)?;

    Ok(Channel {
        index,
        name: record_str(store, record, name_at, unit_at)?,
        unit: record_str(store, record, unit_at, comment_start)?,
        comment: record_str(store, record, comment_start, comment_end)?,
        bits,
    })
}

fn read_file_entry(store: &ByteStore, index: usize, record: &Range<u64>) -> Result<FileEntry> {
    let at = record.start;
    let name_start = store.read_u16(at + 1)?;
    let name_end = store.read_u16(at + 3)?;

    Ok(FileEntry {
        index,
        name: record_str(store, record, name_start, name_end)?,
        fidx_start: store.read_u64(at + 5)?,
        fidx_end: store.read_u64(at + 13)?,
        aidx_start: store.read_u64(at + 21)?,
        aidx_end: store.read_u64(at + 29)?,
    })
}

/// Handle on the WIFFINFO chunk, always the first chunk of the primary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoBlock {
    chunk: usize,
}

impl InfoBlock {
    /// Write a new catalog as the first chunk of an empty file, registering
    /// `primary_name` as file 0
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the file already
    /// holds chunks
    pub fn create(
        file: &mut ChunkFile,
        config: &RecordingConfig,
        primary_name: &str,
    ) -> Result<Self> {
        config.validate()?;

        if !file.chunks().is_empty() {
            return Err(WiffError::AlreadyExists(format!(
                "chunks in {}",
                file.store().path().display()
            )));
        }

        let planned = planned_body_len(config, primary_name);
        if planned > u64::from(u16::MAX) {
            return Err(WiffError::ConfigError(format!(
                "Catalog needs {planned} bytes, exceeding the 16-bit offset range"
            )));
        }

        let pages = page_align(CHUNK_HEADER_SIZE + planned) / PAGE_SIZE;
        let chunk = file.append_chunk(ChunkTag::Info, pages, [INFO_VERSION, 0, 0, 0, 0, 0, 0, 0])?;
        let block = Self { chunk };
        let body = block.body(file)?;

        let start = format_timestamp(&config.start);
        let end = format_timestamp(&config.end);

        let index_start = INFO_HEADER_SIZE;
        let index_end = index_start + start.len() as u64;
        let index_description = index_end + end.len() as u64;
        let index_channels = index_description + config.description.len() as u64;

        let num_channels = u16::try_from(config.channels.len())
            .map_err(|_| WiffError::ConfigError("Too many channels".to_string()))?;

        {
            let store = file.store_mut();
            store.write_u16(body + layout::INDEX_START, offset16(index_start)?)?;
            store.write_u16(body + layout::INDEX_END, offset16(index_end)?)?;
            store.write_u16(body + layout::INDEX_DESCRIPTION, offset16(index_description)?)?;
            store.write_u16(body + layout::INDEX_CHANNELS, offset16(index_channels)?)?;
            store.write_u32(body + layout::FS, config.fs)?;
            store.write_u16(body + layout::NUM_CHANNELS, num_channels)?;
            store.write_u16(body + layout::NUM_FILES, 0)?;
            store.write_u64(body + layout::NUM_FRAMES, 0)?;
            store.write_u64(body + layout::NUM_ANNOTATIONS, 0)?;
            store.write_u64(body + layout::NUM_METAS, 0)?;

            store.write(body + index_start, start.as_bytes())?;
            store.write(body + index_end, end.as_bytes())?;
            store.write(body + index_description, config.description.as_bytes())?;
        }

        let mut list = JumpTable::new(
            body + index_channels,
            0,
            channel_list(config.channels.len()),
        );
        for (i, channel) in config.channels.iter().enumerate() {
            let index = u8::try_from(i)
                .map_err(|_| WiffError::ConfigError("Too many channels".to_string()))?;
            let record = encode_channel(index, channel)?;
            let at = append_growing(file, chunk, &mut list, record.len() as u64)?;
            let range = list.get(file.store(), at)?;
            file.store_mut().write(range.start, &record)?;
        }

        let index_file_start = offset16(index_channels + list.data_end(file.store())?)?;
        let store = file.store_mut();
        store.write_u16(body + layout::INDEX_FILE_START, index_file_start)?;
        store.write_u16(body + layout::INDEX_FILE_END, index_file_start)?;

        block.add_file(file, primary_name, (0, 0), (0, 0))?;

        debug!(
            "Initialized catalog with {} channels at {} Hz",
            config.channels.len(),
            config.fs
        );

        Ok(block)
    }

    /// Locate the catalog in an opened primary file
    ///
    /// # Errors
    ///
    /// Returns error if the first chunk is not a WIFFINFO chunk of a known
    /// revision
    pub fn open(file: &ChunkFile) -> Result<Self> {
        let first = file.chunks().first().ok_or_else(|| WiffError::MalformedChunk {
            offset: 0,
            reason: "file holds no chunks".to_string(),
        })?;
        crate::storage::validate_tag(first, ChunkTag::Info)?;

        if first.attributes[0] != INFO_VERSION {
            return Err(WiffError::MalformedChunk {
                offset: first.offset,
                reason: format!(
                    "unsupported WIFFINFO revision {}, expected {INFO_VERSION}",
                    first.attributes[0]
                ),
            });
        }

        Ok(Self { chunk: 0 })
    }

    fn body(&self, file: &ChunkFile) -> Result<u64> {
        body_offset(file, self.chunk, ChunkTag::Info)
    }

    fn read_u16(&self, file: &ChunkFile, field: u64) -> Result<u16> {
        file.store().read_u16(self.body(file)? + field)
    }

    fn read_u64(&self, file: &ChunkFile, field: u64) -> Result<u64> {
        file.store().read_u64(self.body(file)? + field)
    }

    fn write_u64(&self, file: &mut ChunkFile, field: u64, value: u64) -> Result<()> {
        let body = self.body(file)?;
        file.store_mut().write_u64(body + field, value)
    }

    /// Sampling rate in frames per second
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn fs(&self, file: &ChunkFile) -> Result<u32> {
        file.store().read_u32(self.body(file)? + layout::FS)
    }

    /// Number of channels in the catalog
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_channels(&self, file: &ChunkFile) -> Result<usize> {
        Ok(usize::from(self.read_u16(file, layout::NUM_CHANNELS)?))
    }

    /// Number of registered backing files
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_files(&self, file: &ChunkFile) -> Result<usize> {
        Ok(usize::from(self.read_u16(file, layout::NUM_FILES)?))
    }

    /// Recording-wide frame count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_frames(&self, file: &ChunkFile) -> Result<u64> {
        self.read_u64(file, layout::NUM_FRAMES)
    }

    /// Set the recording-wide frame count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be written
    pub fn set_num_frames(&self, file: &mut ChunkFile, value: u64) -> Result<()> {
        self.write_u64(file, layout::NUM_FRAMES, value)
    }

    /// Recording-wide annotation count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_annotations(&self, file: &ChunkFile) -> Result<u64> {
        self.read_u64(file, layout::NUM_ANNOTATIONS)
    }

    /// Set the recording-wide annotation count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be written
    pub fn set_num_annotations(&self, file: &mut ChunkFile, value: u64) -> Result<()> {
        self.write_u64(file, layout::NUM_ANNOTATIONS, value)
    }

    /// Recording-wide meta value count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_metas(&self, file: &ChunkFile) -> Result<u64> {
        self.read_u64(file, layout::NUM_METAS)
    }

    /// Set the recording-wide meta value count
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be written
    pub fn set_num_metas(&self, file: &mut ChunkFile, value: u64) -> Result<()> {
        self.write_u64(file, layout::NUM_METAS, value)
    }

    fn string_field(&self, file: &ChunkFile, from: u64, to: u64) -> Result<String> {
        let body = self.body(file)?;
        let start = u64::from(self.read_u16(file, from)?);
        let end = u64::from(self.read_u16(file, to)?);
        read_str(file.store(), body + start..body + end)
    }

    fn set_fixed_field(
        &self,
        file: &mut ChunkFile,
        field: &'static str,
        from: u64,
        to: u64,
        value: &str,
    ) -> Result<()> {
        let body = self.body(file)?;
        let start = u64::from(self.read_u16(file, from)?);
        let end = u64::from(self.read_u16(file, to)?);

        let expected = (end - start) as usize;
        if value.len() != expected {
            return Err(WiffError::FixedFieldLengthMismatch {
                field,
                expected,
                actual: value.len(),
            });
        }

        file.store_mut().write(body + start, value.as_bytes())
    }

    /// Recording start timestamp as stored
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn start(&self, file: &ChunkFile) -> Result<String> {
        self.string_field(file, layout::INDEX_START, layout::INDEX_END)
    }

    /// Recording end timestamp as stored
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn end(&self, file: &ChunkFile) -> Result<String> {
        self.string_field(file, layout::INDEX_END, layout::INDEX_DESCRIPTION)
    }

    /// Recording description
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn description(&self, file: &ChunkFile) -> Result<String> {
        self.string_field(file, layout::INDEX_DESCRIPTION, layout::INDEX_CHANNELS)
    }

    /// Overwrite the start timestamp; the length must not change
    ///
    /// # Errors
    ///
    /// Returns `FixedFieldLengthMismatch` on a length change
    pub fn set_start(&self, file: &mut ChunkFile, value: &str) -> Result<()> {
        self.set_fixed_field(file, "start", layout::INDEX_START, layout::INDEX_END, value)
    }

    /// Overwrite the end timestamp; the length must not change
    ///
    /// # Errors
    ///
    /// Returns `FixedFieldLengthMismatch` on a length change
    pub fn set_end(&self, file: &mut ChunkFile, value: &str) -> Result<()> {
        self.set_fixed_field(file, "end", layout::INDEX_END, layout::INDEX_DESCRIPTION, value)
    }

    /// Overwrite the description; the length must not change
    ///
    /// # Errors
    ///
    /// Returns `FixedFieldLengthMismatch` on a length change
    pub fn set_description(&self, file: &mut ChunkFile, value: &str) -> Result<()> {
        self.set_fixed_field(
            file,
            "description",
            layout::INDEX_DESCRIPTION,
            layout::INDEX_CHANNELS,
            value,
        )
    }

    /// Channel catalog in index order
    ///
    /// # Errors
    ///
    /// Returns error if a channel record is malformed
    pub fn channels(&self, file: &ChunkFile) -> Result<Vec<Channel>> {
        let count = self.num_channels(file)?;
        let base = self.body(file)? + u64::from(self.read_u16(file, layout::INDEX_CHANNELS)?);
        let list = JumpTable::new(base, count, channel_list(count));

        (0..count)
            .map(|i| read_channel(file.store(), &list.get(file.store(), i)?))
            .collect()
    }

    fn file_list(&self, file: &ChunkFile) -> Result<JumpTable> {
        let base = self.body(file)? + u64::from(self.read_u16(file, layout::INDEX_FILE_START)?);
        Ok(JumpTable::new(base, self.num_files(file)?, FILE_LIST))
    }

    /// File table in registration order
    ///
    /// # Errors
    ///
    /// Returns error if a file record is malformed
    pub fn files(&self, file: &ChunkFile) -> Result<Vec<FileEntry>> {
        let list = self.file_list(file)?;
        (0..list.len())
            .map(|i| read_file_entry(file.store(), i, &list.get(file.store(), i)?))
            .collect()
    }

    /// File entry at `index`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such entry
    pub fn file(&self, file: &ChunkFile, index: usize) -> Result<FileEntry> {
        let list = self.file_list(file)?;
        read_file_entry(file.store(), index, &list.get(file.store(), index)?)
    }

    /// File entry named `name`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no file has that name
    pub fn get_file_by_name(&self, file: &ChunkFile, name: &str) -> Result<FileEntry> {
        self.files(file)?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| WiffError::NotFound(format!("file '{name}'")))
    }

    /// Register a backing file, growing the chunk a page if needed
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` on a name collision
    pub fn add_file(
        &self,
        file: &mut ChunkFile,
        name: &str,
        fidx: (u64, u64),
        aidx: (u64, u64),
    ) -> Result<usize> {
        if self.files(file)?.iter().any(|f| f.name == name) {
            return Err(WiffError::AlreadyExists(format!("file '{name}'")));
        }

        let mut list = self.file_list(file)?;
        let index = u8::try_from(list.len()).map_err(|_| {
            WiffError::ConfigError(format!("At most {MAX_FILES} files are supported"))
        })?;

        let record = encode_file(index, name, fidx, aidx)?;
        let at = append_growing(file, self.chunk, &mut list, record.len() as u64)?;
        let range = list.get(file.store(), at)?;

        let body = self.body(file)?;
        let index_file_start = u64::from(self.read_u16(file, layout::INDEX_FILE_START)?);
        let index_file_end = offset16(index_file_start + list.data_end(file.store())?)?;

        let store = file.store_mut();
        store.write(range.start, &record)?;
        store.write_u16(body + layout::INDEX_FILE_END, index_file_end)?;
        store.write_u16(body + layout::NUM_FILES, (at + 1) as u16)?;

        debug!("Registered file {} as '{}'", at, name);

        Ok(at)
    }

    /// Overwrite the frame range of file `index`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such entry
    pub fn set_file_frames(
        &self,
        file: &mut ChunkFile,
        index: usize,
        fidx: (u64, u64),
    ) -> Result<()> {
        let at = self.file_list(file)?.get(file.store(), index)?.start;
        let store = file.store_mut();
        store.write_u64(at + 5, fidx.0)?;
        store.write_u64(at + 13, fidx.1)
    }

    /// Overwrite the annotation range of file `index`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no such entry
    pub fn set_file_annotations(
        &self,
        file: &mut ChunkFile,
        index: usize,
        aidx: (u64, u64),
    ) -> Result<()> {
        let at = self.file_list(file)?.get(file.store(), index)?.start;
        let store = file.store_mut();
        store.write_u64(at + 21, aidx.0)?;
        store.write_u64(at + 29, aidx.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DATE_FMT;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn config() -> RecordingConfig {
        RecordingConfig {
            start: NaiveDateTime::parse_from_str("20010203 040506.070809", DATE_FMT).unwrap(),
            end: NaiveDateTime::parse_from_str("20101112 131415.161718", DATE_FMT).unwrap(),
            description: "hello world".to_string(),
            fs: 12345,
            channels: vec![
                ChannelConfig::new("I", 12, "uV").with_comment("lead test I"),
                ChannelConfig::new("X", 12, "mA").with_comment("lead test X"),
            ],
        }
    }

    fn create(dir: &TempDir) -> (ChunkFile, InfoBlock) {
        let mut file = ChunkFile::create(&dir.path().join("rec.wiff")).unwrap();
        let info = InfoBlock::create(&mut file, &config(), "rec.wiff").unwrap();
        (file, info)
    }

    #[test]
    fn test_catalog_fields() {
        let dir = TempDir::new().unwrap();
        let (file, info) = create(&dir);

        assert_eq!(info.start(&file).unwrap(), "20010203 040506.070809");
        assert_eq!(info.end(&file).unwrap(), "20101112 131415.161718");
        assert_eq!(info.description(&file).unwrap(), "hello world");
        assert_eq!(info.fs(&file).unwrap(), 12345);
        assert_eq!(info.num_channels(&file).unwrap(), 2);
        assert_eq!(info.num_files(&file).unwrap(), 1);
        assert_eq!(info.num_frames(&file).unwrap(), 0);
        assert_eq!(info.num_annotations(&file).unwrap(), 0);
        assert_eq!(file.chunks().len(), 1);
        assert_eq!(file.chunk(0).unwrap().size, 4096);
    }

    #[test]
    fn test_binary_layout() {
        let dir = TempDir::new().unwrap();
        let (file, _) = create(&dir);
        let store = file.store();

        assert_eq!(store.read(0, 8).unwrap(), b"WIFFINFO");
        assert_eq!(store.read_u64(8).unwrap(), 4096);
        assert_eq!(store.read_u8(16).unwrap(), INFO_VERSION);

        // index_start, index_end, index_description, index_channels
        assert_eq!(store.read_u16(24).unwrap(), 44);
        assert_eq!(store.read_u16(26).unwrap(), 66);
        assert_eq!(store.read_u16(28).unwrap(), 88);
        assert_eq!(store.read_u16(30).unwrap(), 99);
        // Two 24-byte channel records behind an 8-byte table
        assert_eq!(store.read_u16(32).unwrap(), 99 + 8 + 48);
        assert_eq!(store.read(24 + 44, 22).unwrap(), b"20010203 040506.070809");

        // Channel jump table and first record
        let base = 24 + 99;
        assert_eq!(store.read_u16(base).unwrap(), 8);
        assert_eq!(store.read_u16(base + 2).unwrap(), 32);
        assert_eq!(store.read_u16(base + 4).unwrap(), 32);
        assert_eq!(store.read_u16(base + 6).unwrap(), 56);
        assert_eq!(
            store.read(base + 8, 24).unwrap(),
            b"\x00\x0a\x00\x0c\x0b\x00\x0d\x00\x18\x00IuVlead test I"
        );
    }

    #[test]
    fn test_channels() {
        let dir = TempDir::new().unwrap();
        let (file, info) = create(&dir);

        let channels = info.channels(&file).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].index, 1);
        assert_eq!(channels[1].name, "X");
        assert_eq!(channels[1].unit, "mA");
        assert_eq!(channels[1].comment, "lead test X");
        assert_eq!(channels[1].bits, 12);
        assert_eq!(channels[1].storage_bytes(), 2);
    }

    #[test]
    fn test_files() {
        let dir = TempDir::new().unwrap();
        let (mut file, info) = create(&dir);

        let primary = info.get_file_by_name(&file, "rec.wiff").unwrap();
        assert_eq!(primary.index, 0);
        assert_eq!((primary.fidx_start, primary.fidx_end), (0, 0));

        for i in 1..10 {
            let at = info
                .add_file(&mut file, &format!("rec.{i}.wiff"), (i * 10, i * 10), (0, 0))
                .unwrap();
            assert_eq!(at, i as usize);
        }

        info.set_file_frames(&mut file, 3, (30, 45)).unwrap();
        info.set_file_annotations(&mut file, 3, (2, 5)).unwrap();

        let files = info.files(&file).unwrap();
        assert_eq!(files.len(), 10);
        assert_eq!(files[9].name, "rec.9.wiff");
        assert_eq!(files[9].fidx_start, 90);
        assert_eq!((files[3].fidx_start, files[3].fidx_end), (30, 45));
        assert_eq!((files[3].aidx_start, files[3].aidx_end), (2, 5));

        assert!(matches!(
            info.add_file(&mut file, "rec.4.wiff", (0, 0), (0, 0)),
            Err(WiffError::AlreadyExists(_))
        ));
        assert!(matches!(
            info.get_file_by_name(&file, "missing.wiff"),
            Err(WiffError::NotFound(_))
        ));
    }

    #[test]
    fn test_files_grow_chunk() {
        let dir = TempDir::new().unwrap();
        let (mut file, info) = create(&dir);
        let long = "x".repeat(200);

        for i in 0..40 {
            info.add_file(&mut file, &format!("{long}.{i}"), (0, 0), (0, 0))
                .unwrap();
        }

        assert!(file.chunk(0).unwrap().size > PAGE_SIZE);
        assert_eq!(info.num_files(&file).unwrap(), 41);
        assert_eq!(info.file(&file, 40).unwrap().name, format!("{long}.39"));
        // Channels are untouched by file table growth
        assert_eq!(info.channels(&file).unwrap()[0].comment, "lead test I");
    }

    #[test]
    fn test_fixed_fields() {
        let dir = TempDir::new().unwrap();
        let (mut file, info) = create(&dir);

        info.set_end(&mut file, "20111112 131415.161718").unwrap();
        assert_eq!(info.end(&file).unwrap(), "20111112 131415.161718");

        info.set_description(&mut file, "HELLO WORLD").unwrap();
        assert_eq!(info.description(&file).unwrap(), "HELLO WORLD");

        assert!(matches!(
            info.set_description(&mut file, "a much longer description"),
            Err(WiffError::FixedFieldLengthMismatch {
                field: "description",
                expected: 11,
                ..
            })
        ));
        assert!(matches!(
            info.set_start(&mut file, "2001"),
            Err(WiffError::FixedFieldLengthMismatch { field: "start", .. })
        ));
        assert_eq!(info.description(&file).unwrap(), "HELLO WORLD");
    }

    #[test]
    fn test_counters() {
        let dir = TempDir::new().unwrap();
        let (mut file, info) = create(&dir);

        info.set_num_frames(&mut file, 1234).unwrap();
        info.set_num_annotations(&mut file, 5).unwrap();
        info.set_num_metas(&mut file, 2).unwrap();
        assert_eq!(info.num_frames(&file).unwrap(), 1234);
        assert_eq!(info.num_annotations(&file).unwrap(), 5);
        assert_eq!(info.num_metas(&file).unwrap(), 2);
    }

    #[test]
    fn test_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.wiff");
        {
            let (mut file, info) = create(&dir);
            info.add_file(&mut file, "rec.1.wiff", (0, 0), (0, 0)).unwrap();
        }

        let file = ChunkFile::open(&path).unwrap();
        let info = InfoBlock::open(&file).unwrap();
        assert_eq!(info.num_files(&file).unwrap(), 2);
        assert_eq!(info.channels(&file).unwrap()[0].name, "I");
    }
}
