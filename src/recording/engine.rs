//! Recording engine: routes appends and answers queries across backing files

use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::cursor::{AppendCursor, SegmentCursor};
use crate::bits::ChannelSet;
use crate::block::info::planned_body_len;
use crate::block::{
    AnnoBlock, Annotation, AnnotationQuery, Channel, FileEntry, Frame, FrameLayout, InfoBlock,
    MetaBlock, MetaEntry, MetaLevel, WaveBlock,
};
use crate::config::{format_timestamp, RecordingConfig, DATE_FMT};
use crate::storage::{ChunkFile, ChunkTag, Compression};
use crate::{Result, WiffError};

/// One open backing file
#[derive(Debug)]
pub struct BackingFile {
    name: String,
    chunks: ChunkFile,
}

impl BackingFile {
    /// Name relative to the recording directory
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chunk index and mapping
    #[must_use]
    pub fn chunks(&self) -> &ChunkFile {
        &self.chunks
    }
}

/// Summary of one WIFFWAVE chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Backing file index
    pub file: usize,
    /// Block handle
    pub block: WaveBlock,
    /// Segment id
    pub segment_id: u32,
    /// Channels present in every frame
    pub channels: ChannelSet,
    /// Compression tag
    pub compression: Compression,
    /// First global frame index
    pub fidx_start: u64,
    /// One past the last global frame index
    pub fidx_end: u64,
}

impl Segment {
    /// Frames stored in the segment
    #[must_use]
    pub fn num_frames(&self) -> u64 {
        self.fidx_end - self.fidx_start
    }
}

/// Summary of one WIFFANNO chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationBlock {
    /// Backing file index
    pub file: usize,
    /// Block handle
    pub block: AnnoBlock,
    /// Compression tag
    pub compression: Compression,
    /// Global index of the first annotation
    pub aidx_start: u64,
    /// One past the global index of the last annotation
    pub aidx_end: u64,
    /// Frames touched by the block's annotations
    pub bounds: Option<RangeInclusive<u64>>,
}

/// A WIFF recording spread over one or more backing files
///
/// File 0 is the primary file; it carries the WIFFINFO catalog. Additional
/// files live next to it and are named relative to its directory.
#[derive(Debug)]
pub struct Recording {
    dir: PathBuf,
    files: Vec<BackingFile>,
    info: InfoBlock,
    cursor: AppendCursor,
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            WiffError::ConfigError(format!("{} has no UTF-8 file name", path.display()))
        })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map_or_else(PathBuf::new, Path::to_path_buf)
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATE_FMT).map_err(|e| WiffError::MalformedChunk {
        offset: 0,
        reason: format!("timestamp '{s}': {e}"),
    })
}

/// Smallest half-open range covering both; an empty `current` is replaced
fn hull(current: (u64, u64), added: (u64, u64)) -> (u64, u64) {
    if current.0 == current.1 {
        added
    } else {
        (current.0.min(added.0), current.1.max(added.1))
    }
}

impl Recording {
    /// Create a recording whose primary file is `path`
    ///
    /// The configuration is validated before any byte is written.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid configuration or `AlreadyExists`
    /// if `path` exists
    pub fn create(path: &Path, config: &RecordingConfig) -> Result<Self> {
        config.validate()?;
        let name = file_name(path)?;

        let planned = planned_body_len(config, &name);
        if planned > u64::from(u16::MAX) {
            return Err(WiffError::ConfigError(format!(
                "Catalog needs {planned} bytes, exceeding the 16-bit offset range"
            )));
        }

        if path.exists() {
            return Err(WiffError::AlreadyExists(path.display().to_string()));
        }

        let mut chunks = ChunkFile::create(path)?;
        let info_block = InfoBlock::create(&mut chunks, config, &name)?;
        chunks.flush()?;

        info!(
            "Created recording {} with {} channels at {} Hz",
            path.display(),
            config.channels.len(),
            config.fs
        );

        Ok(Self {
            dir: parent_dir(path),
            files: vec![BackingFile { name, chunks }],
            info: info_block,
            cursor: AppendCursor::default(),
        })
    }

    /// Open the recording whose primary file is `path`, along with every
    /// file its catalog lists
    ///
    /// The cursor starts out empty; call [`Recording::resume`] to continue
    /// appending.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if a listed file is missing, or `MalformedChunk` if
    /// any file's chunk chain is corrupt
    pub fn open(path: &Path) -> Result<Self> {
        let primary = ChunkFile::open(path)?;
        let info_block = InfoBlock::open(&primary)?;
        let entries = info_block.files(&primary)?;
        let dir = parent_dir(path);

        let mut files = Vec::with_capacity(entries.len().max(1));
        files.push(BackingFile {
            name: file_name(path)?,
            chunks: primary,
        });
        for entry in entries.iter().skip(1) {
            files.push(BackingFile {
                name: entry.name.clone(),
                chunks: ChunkFile::open(&dir.join(&entry.name))?,
            });
        }

        info!(
            "Opened recording {} ({} files)",
            path.display(),
            files.len()
        );

        Ok(Self {
            dir,
            files,
            info: info_block,
            cursor: AppendCursor::default(),
        })
    }

    /// Flush every backing file and close the recording
    ///
    /// # Errors
    ///
    /// Returns error if a flush fails
    pub fn close(self) -> Result<()> {
        self.flush()?;
        info!("Closed recording in {}", self.dir.display());
        Ok(())
    }

    /// Flush every backing file
    ///
    /// # Errors
    ///
    /// Returns error if a flush fails
    pub fn flush(&self) -> Result<()> {
        for file in &self.files {
            file.chunks.flush()?;
        }
        Ok(())
    }

    fn primary(&self) -> &ChunkFile {
        &self.files[0].chunks
    }

    fn primary_mut(&mut self) -> &mut ChunkFile {
        &mut self.files[0].chunks
    }

    fn chunks(&self, file: usize) -> Result<&ChunkFile> {
        self.files
            .get(file)
            .map(|f| &f.chunks)
            .ok_or_else(|| WiffError::NotFound(format!("backing file {file}")))
    }

    fn chunks_mut(&mut self, file: usize) -> Result<&mut ChunkFile> {
        self.files
            .get_mut(file)
            .map(|f| &mut f.chunks)
            .ok_or_else(|| WiffError::NotFound(format!("backing file {file}")))
    }

    /// Directory holding the primary file
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open backing files, indexed like the file table
    #[must_use]
    pub fn backing_files(&self) -> &[BackingFile] {
        &self.files
    }

    /// Current append cursor
    #[must_use]
    pub fn cursor(&self) -> &AppendCursor {
        &self.cursor
    }

    /// Recording start
    ///
    /// # Errors
    ///
    /// Returns error if the stored timestamp cannot be parsed
    pub fn start(&self) -> Result<NaiveDateTime> {
        parse_timestamp(&self.info.start(self.primary())?)
    }

    /// Recording end
    ///
    /// # Errors
    ///
    /// Returns error if the stored timestamp cannot be parsed
    pub fn end(&self) -> Result<NaiveDateTime> {
        parse_timestamp(&self.info.end(self.primary())?)
    }

    /// Recording description
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn description(&self) -> Result<String> {
        self.info.description(self.primary())
    }

    /// Sampling rate
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn fs(&self) -> Result<u32> {
        self.info.fs(self.primary())
    }

    /// Number of channels
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_channels(&self) -> Result<usize> {
        self.info.num_channels(self.primary())
    }

    /// Number of backing files
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_files(&self) -> Result<usize> {
        self.info.num_files(self.primary())
    }

    /// Number of frames across all files
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_frames(&self) -> Result<u64> {
        self.info.num_frames(self.primary())
    }

    /// Number of annotations across all files
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_annotations(&self) -> Result<u64> {
        self.info.num_annotations(self.primary())
    }

    /// Number of meta values across all files
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read
    pub fn num_metas(&self) -> Result<u64> {
        self.info.num_metas(self.primary())
    }

    /// Overwrite the start timestamp
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be written
    pub fn set_start(&mut self, ts: &NaiveDateTime) -> Result<()> {
        let info = self.info;
        info.set_start(self.primary_mut(), &format_timestamp(ts))
    }

    /// Overwrite the end timestamp
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be written
    pub fn set_end(&mut self, ts: &NaiveDateTime) -> Result<()> {
        let info = self.info;
        info.set_end(self.primary_mut(), &format_timestamp(ts))
    }

    /// Overwrite the description with one of the same byte length
    ///
    /// # Errors
    ///
    /// Returns `FixedFieldLengthMismatch` on a length change
    pub fn set_description(&mut self, description: &str) -> Result<()> {
        let info = self.info;
        info.set_description(self.primary_mut(), description)
    }

    /// Channel catalog
    ///
    /// # Errors
    ///
    /// Returns error if the catalog is malformed
    pub fn channels(&self) -> Result<Vec<Channel>> {
        self.info.channels(self.primary())
    }

    /// File table
    ///
    /// # Errors
    ///
    /// Returns error if the catalog is malformed
    pub fn files(&self) -> Result<Vec<FileEntry>> {
        self.info.files(self.primary())
    }

    /// Create backing file `name` next to the primary file and route new
    /// blocks to it
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is in the file table or on disk
    pub fn add_file(&mut self, name: &str) -> Result<usize> {
        if self.files()?.iter().any(|f| f.name == name) {
            return Err(WiffError::AlreadyExists(format!("file '{name}'")));
        }

        let chunks = ChunkFile::create(&self.dir.join(name))?;
        let fidx = self.num_frames()?;
        let aidx = self.num_annotations()?;

        let info = self.info;
        let index = info.add_file(self.primary_mut(), name, (fidx, fidx), (aidx, aidx))?;
        self.files.push(BackingFile {
            name: name.to_string(),
            chunks,
        });
        self.cursor.select_file(index);

        info!("Added backing file {} as '{}'", index, name);

        Ok(index)
    }

    /// Route new blocks to the registered file `name`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no file has that name
    pub fn set_file(&mut self, name: &str) -> Result<usize> {
        let index = self.info.get_file_by_name(self.primary(), name)?.index;
        self.cursor.select_file(index);
        Ok(index)
    }

    /// Start a segment for `channels` at the current frame count
    ///
    /// The segment id defaults to one more than the number of segments.
    ///
    /// # Errors
    ///
    /// Returns error if `channels` is empty or names an unknown channel
    pub fn new_segment(
        &mut self,
        channels: &ChannelSet,
        compression: Compression,
        segment_id: Option<u32>,
    ) -> Result<u32> {
        let layout = FrameLayout::new(&self.channels()?, channels)?;
        let segment_id = match segment_id {
            Some(id) => id,
            None => self.segments()?.len() as u32 + 1,
        };
        let fidx = self.num_frames()?;

        let file = self.cursor.file;
        let block = WaveBlock::create(
            self.chunks_mut(file)?,
            channels,
            compression,
            segment_id,
            fidx,
        )?;
        self.cursor.segment = Some(SegmentCursor {
            file,
            block,
            layout,
        });

        Ok(segment_id)
    }

    fn segment_cursor(&self) -> Result<SegmentCursor> {
        self.cursor.segment.clone().ok_or(WiffError::NoCursor("segment"))
    }

    /// Grow the current segment so `frames` more frames fit
    ///
    /// # Errors
    ///
    /// Returns `NoCursor` without a current segment
    pub fn reserve_frames(&mut self, frames: u64) -> Result<()> {
        let segment = self.segment_cursor()?;
        segment
            .block
            .reserve(self.chunks_mut(segment.file)?, &segment.layout, frames)
    }

    /// Append frames of raw little-endian samples to the current segment
    ///
    /// Returns the new frame count.
    ///
    /// # Errors
    ///
    /// Returns `NoCursor` without a current segment, `StaleCursor` if the
    /// segment no longer ends at the frame count, or `ChannelSizeMismatch`/
    /// `ChannelCountMismatch` for a malformed frame
    pub fn add_frames<F, S>(&mut self, frames: &[F]) -> Result<u64>
    where
        F: AsRef<[S]>,
        S: AsRef<[u8]>,
    {
        let segment = self.segment_cursor()?;
        let num_frames = self.num_frames()?;

        let chunks = self.chunks(segment.file)?;
        let fidx_start = segment.block.fidx_start(chunks)?;
        let segment_end = segment.block.fidx_end(chunks)?;
        if segment_end != num_frames {
            return Err(WiffError::StaleCursor {
                segment_end,
                num_frames,
            });
        }

        let fidx_end = segment.block.add_frames(
            self.chunks_mut(segment.file)?,
            &segment.layout,
            frames,
        )?;

        let info = self.info;
        let entry = info.file(self.primary(), segment.file)?;
        let range = hull((entry.fidx_start, entry.fidx_end), (fidx_start, fidx_end));
        info.set_file_frames(self.primary_mut(), segment.file, range)?;
        info.set_num_frames(self.primary_mut(), fidx_end)?;

        debug!(
            "Appended {} frames to file {}, now {} frames",
            frames.len(),
            segment.file,
            fidx_end
        );

        Ok(fidx_end)
    }

    /// Append frames given as one unsigned value per channel
    ///
    /// # Errors
    ///
    /// Same as [`Recording::add_frames`]
    pub fn add_frame_values<V: AsRef<[u64]>>(&mut self, frames: &[V]) -> Result<u64> {
        let segment = self.segment_cursor()?;
        let encoded = frames
            .iter()
            .map(|values| segment.layout.encode(values.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.add_frames(&encoded)
    }

    /// All segments in every file, ordered by `fidx_start`
    ///
    /// # Errors
    ///
    /// Returns error if a chunk cannot be read
    pub fn segments(&self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();

        for (file, backing) in self.files.iter().enumerate() {
            let chunks = &backing.chunks;
            for chunk in chunks.indices_of(ChunkTag::Wave) {
                let block = WaveBlock::open(chunks, chunk)?;
                let header = block.header(chunks)?;
                segments.push(Segment {
                    file,
                    block,
                    segment_id: block.segment_id(chunks)?,
                    channels: ChannelSet::from_bytes(header.channels),
                    compression: block.compression(chunks)?,
                    fidx_start: header.fidx_start(),
                    fidx_end: header.fidx_end(),
                });
            }
        }

        segments.sort_by_key(|s| s.fidx_start);
        Ok(segments)
    }

    /// Frame `fidx`, wherever it is stored
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no segment covers `fidx`
    pub fn get_frame(&self, fidx: u64) -> Result<Frame> {
        let segment = self
            .segments()?
            .into_iter()
            .find(|s| (s.fidx_start..s.fidx_end).contains(&fidx))
            .ok_or_else(|| WiffError::NotFound(format!("frame {fidx}")))?;

        let layout = FrameLayout::new(&self.channels()?, &segment.channels)?;
        segment
            .block
            .get_frame(self.chunks(segment.file)?, &layout, fidx)
    }

    /// Iterate frames in `range`, clamped to the frame count
    ///
    /// # Errors
    ///
    /// Returns error if the segment table cannot be read
    pub fn frames(&self, range: Range<u64>) -> Result<Frames<'_>> {
        let channels = self.channels()?;
        let segments = self
            .segments()?
            .into_iter()
            .filter(|s| s.fidx_end > s.fidx_start)
            .map(|s| FrameLayout::new(&channels, &s.channels).map(|layout| (s, layout)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Frames {
            recording: self,
            segments,
            current: 0,
            next: range.start,
            end: range.end.min(self.num_frames()?),
        })
    }

    /// Open an annotation block in the current file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn new_annotations(&mut self, compression: Compression) -> Result<()> {
        let aidx = self.num_annotations()?;
        let file = self.cursor.file;
        let block = AnnoBlock::create(self.chunks_mut(file)?, compression, aidx)?;
        self.cursor.annotations = Some((file, block));
        Ok(())
    }

    /// Append an annotation to the current block and return its global index
    ///
    /// A full block is replaced by a fresh one in the current file.
    ///
    /// # Errors
    ///
    /// Returns `NoCursor` without a current block or `InvalidAnnotation`
    pub fn add_annotation(&mut self, annotation: &Annotation) -> Result<u64> {
        annotation.validate()?;
        let frames_end = annotation
            .frames()
            .end()
            .checked_add(1)
            .ok_or_else(|| {
                WiffError::InvalidAnnotation("frame range ends at u64::MAX".to_string())
            })?;
        let (mut file, mut block) = self
            .cursor
            .annotations
            .ok_or(WiffError::NoCursor("annotation block"))?;

        let aidx = match block.add(self.chunks_mut(file)?, annotation) {
            Err(WiffError::RecordListFull { .. }) => {
                let compression = block.compression(self.chunks(file)?)?;
                debug!("Annotation block in file {} is full, opening another", file);
                self.new_annotations(compression)?;
                (file, block) = self
                    .cursor
                    .annotations
                    .ok_or(WiffError::NoCursor("annotation block"))?;
                block.add(self.chunks_mut(file)?, annotation)?
            }
            other => other?,
        };

        let info = self.info;
        let entry = info.file(self.primary(), file)?;
        let aidx_range = hull((entry.aidx_start, entry.aidx_end), (aidx, aidx + 1));
        // Only the end moves; the start stays where the file was registered
        let fidx_range = (entry.fidx_start, entry.fidx_end.max(frames_end));

        let count = info.num_annotations(self.primary())?.max(aidx + 1);
        let primary = self.primary_mut();
        info.set_file_annotations(primary, file, aidx_range)?;
        info.set_file_frames(primary, file, fidx_range)?;
        info.set_num_annotations(primary, count)?;

        Ok(aidx)
    }

    /// All annotation blocks, ordered by `aidx_start`
    ///
    /// # Errors
    ///
    /// Returns error if a chunk cannot be read
    pub fn annotation_blocks(&self) -> Result<Vec<AnnotationBlock>> {
        let mut blocks = Vec::new();

        for (file, backing) in self.files.iter().enumerate() {
            let chunks = &backing.chunks;
            for chunk in chunks.indices_of(ChunkTag::Anno) {
                let block = AnnoBlock::open(chunks, chunk)?;
                blocks.push(AnnotationBlock {
                    file,
                    block,
                    compression: block.compression(chunks)?,
                    aidx_start: block.aidx_start(chunks)?,
                    aidx_end: block.aidx_end(chunks)?,
                    bounds: block.bounds(chunks)?,
                });
            }
        }

        blocks.sort_by_key(|b| b.aidx_start);
        Ok(blocks)
    }

    /// Annotations passing `query`, with global indices, in index order
    ///
    /// # Errors
    ///
    /// Returns error if a record is malformed
    pub fn annotations(&self, query: &AnnotationQuery) -> Result<Vec<(u64, Annotation)>> {
        let mut found = Vec::new();
        for b in self.annotation_blocks()? {
            found.extend(b.block.query(self.chunks(b.file)?, query)?);
        }
        found.sort_by_key(|(aidx, _)| *aidx);
        Ok(found)
    }

    /// Store a meta value in the current file
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMetaKey` if `(level, level_index, key)` is taken
    pub fn add_meta(&mut self, entry: MetaEntry) -> Result<()> {
        let mut entry = entry;
        if entry.level == MetaLevel::Recording {
            entry.level_index = 0;
        }

        if self
            .metas()?
            .iter()
            .any(|m| m.is(entry.level, entry.level_index, &entry.key))
        {
            return Err(WiffError::DuplicateMetaKey {
                level: entry.level.to_string(),
                level_index: entry.level_index,
                key: entry.key,
            });
        }

        let file = self.cursor.file;
        let block = match self.cursor.meta {
            Some((f, block)) if f == file => block,
            _ => match self.chunks(file)?.indices_of(ChunkTag::Meta).last() {
                Some(chunk) => MetaBlock::open(self.chunks(file)?, chunk)?,
                None => MetaBlock::create(self.chunks_mut(file)?)?,
            },
        };

        let block = match block.add(self.chunks_mut(file)?, &entry) {
            Err(WiffError::RecordListFull { .. }) => {
                let fresh = MetaBlock::create(self.chunks_mut(file)?)?;
                fresh.add(self.chunks_mut(file)?, &entry)?;
                fresh
            }
            other => {
                other?;
                block
            }
        };
        self.cursor.meta = Some((file, block));

        let info = self.info;
        let count = info.num_metas(self.primary())?;
        info.set_num_metas(self.primary_mut(), count + 1)
    }

    /// Every meta value in every file
    ///
    /// # Errors
    ///
    /// Returns error if a record is malformed
    pub fn metas(&self) -> Result<Vec<MetaEntry>> {
        let mut entries = Vec::new();
        for backing in &self.files {
            let chunks = &backing.chunks;
            for chunk in chunks.indices_of(ChunkTag::Meta) {
                entries.extend(MetaBlock::open(chunks, chunk)?.entries(chunks)?);
            }
        }
        Ok(entries)
    }

    /// Meta value with the given identity
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is none
    pub fn meta(&self, level: MetaLevel, level_index: u64, key: &str) -> Result<MetaEntry> {
        let level_index = if level == MetaLevel::Recording { 0 } else { level_index };
        self.metas()?
            .into_iter()
            .find(|m| m.is(level, level_index, key))
            .ok_or_else(|| WiffError::NotFound(format!("meta {level} {level_index} '{key}'")))
    }

    /// Point the cursor at the last file, the segment ending at the frame
    /// count, the last annotation block and the last file's meta block
    ///
    /// # Errors
    ///
    /// Returns error if the chunk tables cannot be read
    pub fn resume(&mut self) -> Result<()> {
        let last = self.files.len() - 1;
        self.cursor.select_file(last);

        let num_frames = self.num_frames()?;
        if let Some(segment) = self
            .segments()?
            .into_iter()
            .rev()
            .find(|s| s.fidx_end == num_frames)
        {
            let layout = FrameLayout::new(&self.channels()?, &segment.channels)?;
            self.cursor.segment = Some(SegmentCursor {
                file: segment.file,
                block: segment.block,
                layout,
            });
        }

        self.cursor.annotations = self
            .annotation_blocks()?
            .last()
            .map(|b| (b.file, b.block));

        let chunks = self.chunks(last)?;
        let meta = chunks
            .indices_of(ChunkTag::Meta)
            .last()
            .map(|chunk| MetaBlock::open(chunks, chunk).map(|b| (last, b)))
            .transpose()?;
        self.cursor.meta = meta;

        debug!("Resumed at file {} with {} frames", last, num_frames);

        Ok(())
    }
}

/// Iterator over a frame range, see [`Recording::frames`]
#[derive(Debug)]
pub struct Frames<'a> {
    recording: &'a Recording,
    segments: Vec<(Segment, FrameLayout)>,
    current: usize,
    next: u64,
    end: u64,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let fidx = self.next;
        self.next += 1;

        while self
            .segments
            .get(self.current)
            .is_some_and(|(s, _)| s.fidx_end <= fidx)
        {
            self.current += 1;
        }

        Some(match self.segments.get(self.current) {
            Some((segment, layout)) if segment.fidx_start <= fidx => self
                .recording
                .chunks(segment.file)
                .and_then(|chunks| segment.block.get_frame(chunks, layout, fidx)),
            _ => Err(WiffError::NotFound(format!("frame {fidx}"))),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}
