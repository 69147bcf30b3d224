//! WIFFWAVE: one contiguous run of fixed-stride frames

use tracing::debug;

use super::body_offset;
use super::info::Channel;
use crate::bits::ChannelSet;
use crate::codec;
use crate::storage::{
    page_align, ChunkFile, ChunkTag, Compression, WaveHeader, CHUNK_HEADER_SIZE, WAVE_HEADER_SIZE,
};
use crate::{Result, WiffError};

/// Bytes of header preceding the first frame slot
const FRAMES_OFFSET: u64 = CHUNK_HEADER_SIZE + WAVE_HEADER_SIZE;

/// Samples of one frame, as `(channel index, value)` in channel order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Global frame index
    pub index: u64,
    /// Decoded samples
    pub samples: Vec<(u8, u64)>,
}

impl Frame {
    /// Value of channel `channel`, if present in this frame
    #[must_use]
    pub fn sample(&self, channel: u8) -> Option<u64> {
        self.samples
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|&(_, v)| v)
    }
}

/// Storage widths of a segment's channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    channels: Vec<(u8, usize)>,
    stride: usize,
}

impl FrameLayout {
    /// Layout for the channels in `set`, taking widths from `catalog`
    ///
    /// # Errors
    ///
    /// Returns error if `set` is empty or names a channel the catalog lacks
    pub fn new(catalog: &[Channel], set: &ChannelSet) -> Result<Self> {
        if set.is_empty() {
            return Err(WiffError::ConfigError(
                "A segment needs at least one channel".to_string(),
            ));
        }

        let channels = set
            .iter()
            .map(|index| {
                catalog
                    .get(usize::from(index))
                    .map(|c| (index, c.storage_bytes()))
                    .ok_or_else(|| WiffError::NotFound(format!("channel {index}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let stride = channels.iter().map(|&(_, w)| w).sum();
        Ok(Self { channels, stride })
    }

    /// Bytes per frame
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// `(channel index, width)` pairs in channel order
    #[must_use]
    pub fn channels(&self) -> &[(u8, usize)] {
        &self.channels
    }

    /// Little-endian sample bytes for `values`, sized to the channel widths
    ///
    /// # Errors
    ///
    /// Returns `ChannelCountMismatch` if the value count differs from the
    /// channel count, or `ChannelSizeMismatch` if a value needs more bytes
    /// than its channel stores
    pub fn encode(&self, values: &[u64]) -> Result<Vec<Vec<u8>>> {
        if values.len() != self.channels.len() {
            return Err(self.count_mismatch(values.len()));
        }

        self.channels
            .iter()
            .zip(values)
            .map(|(&(channel, width), &value)| {
                let actual = value_bytes(value);
                if actual > width {
                    return Err(WiffError::ChannelSizeMismatch {
                        channel,
                        expected: width,
                        actual,
                    });
                }
                Ok(value.to_le_bytes()[..width].to_vec())
            })
            .collect()
    }

    fn count_mismatch(&self, actual: usize) -> WiffError {
        WiffError::ChannelCountMismatch {
            expected: self.channels.len(),
            actual,
        }
    }

    fn check<S: AsRef<[u8]>>(&self, frame: &[S]) -> Result<()> {
        if frame.len() != self.channels.len() {
            return Err(self.count_mismatch(frame.len()));
        }

        for (&(channel, expected), sample) in self.channels.iter().zip(frame) {
            let actual = sample.as_ref().len();
            if actual != expected {
                return Err(WiffError::ChannelSizeMismatch {
                    channel,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }

    fn decode(&self, index: u64, bytes: &[u8]) -> Frame {
        let mut at = 0;
        let samples = self
            .channels
            .iter()
            .map(|&(channel, width)| {
                let value = decode_sample(&bytes[at..at + width]);
                at += width;
                (channel, value)
            })
            .collect();

        Frame { index, samples }
    }
}

/// Bytes needed to hold `value` without losing set bits
fn value_bytes(value: u64) -> usize {
    (64 - value.leading_zeros() as usize).div_ceil(8)
}

/// Little-endian unsigned sample of 1 to 8 bytes
fn decode_sample(bytes: &[u8]) -> u64 {
    match bytes.len() {
        1 => u64::from(bytes[0]),
        2 => u64::from(u16::from_le(bytemuck::pod_read_unaligned(bytes))),
        4 => u64::from(u32::from_le(bytemuck::pod_read_unaligned(bytes))),
        8 => u64::from_le(bytemuck::pod_read_unaligned(bytes)),
        _ => bytes
            .iter()
            .rev()
            .fold(0, |acc, &b| (acc << 8) | u64::from(b)),
    }
}

/// Handle on one WIFFWAVE chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveBlock {
    chunk: usize,
}

impl WaveBlock {
    /// Append an empty segment starting at global frame `fidx_start`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn create(
        file: &mut ChunkFile,
        channels: &ChannelSet,
        compression: Compression,
        segment_id: u32,
        fidx_start: u64,
    ) -> Result<Self> {
        let mut attributes = [0u8; 8];
        attributes[0] = compression.tag();
        attributes[4..8].copy_from_slice(&segment_id.to_le_bytes());

        let chunk = file.append_chunk(ChunkTag::Wave, 1, attributes)?;
        let block = Self { chunk };

        let header = WaveHeader::new(channels.to_bytes(), fidx_start, fidx_start);
        let body = block.body(file)?;
        file.store_mut().write(body, bytemuck::bytes_of(&header))?;

        debug!(
            "Created segment {} with {} channels at frame {}",
            segment_id,
            channels.len(),
            fidx_start
        );

        Ok(block)
    }

    /// Handle on an existing chunk
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is missing or not a WIFFWAVE chunk
    pub fn open(file: &ChunkFile, chunk: usize) -> Result<Self> {
        body_offset(file, chunk, ChunkTag::Wave)?;
        Ok(Self { chunk })
    }

    /// Chunk index within its file
    #[must_use]
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    fn body(&self, file: &ChunkFile) -> Result<u64> {
        body_offset(file, self.chunk, ChunkTag::Wave)
    }

    /// Body header
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn header(&self, file: &ChunkFile) -> Result<WaveHeader> {
        let bytes: [u8; WAVE_HEADER_SIZE as usize] = file.store().read_array(self.body(file)?)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    fn write_header(&self, file: &mut ChunkFile, header: &WaveHeader) -> Result<()> {
        let body = self.body(file)?;
        file.store_mut().write(body, bytemuck::bytes_of(header))
    }

    /// Channels present in every frame of this segment
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn channels(&self, file: &ChunkFile) -> Result<ChannelSet> {
        Ok(ChannelSet::from_bytes(self.header(file)?.channels))
    }

    /// First global frame index
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn fidx_start(&self, file: &ChunkFile) -> Result<u64> {
        Ok(self.header(file)?.fidx_start())
    }

    /// One past the last global frame index
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn fidx_end(&self, file: &ChunkFile) -> Result<u64> {
        Ok(self.header(file)?.fidx_end())
    }

    /// Frames stored in this segment
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn num_frames(&self, file: &ChunkFile) -> Result<u64> {
        let header = self.header(file)?;
        Ok(header.fidx_end() - header.fidx_start())
    }

    /// Compression tag from attribute byte 0
    ///
    /// # Errors
    ///
    /// Returns error if the tag is not recognized
    pub fn compression(&self, file: &ChunkFile) -> Result<Compression> {
        Compression::from_tag(file.chunk(self.chunk)?.attributes[0])
    }

    /// Segment id from attribute bytes 4..8
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is missing
    pub fn segment_id(&self, file: &ChunkFile) -> Result<u32> {
        let attributes = file.chunk(self.chunk)?.attributes;
        Ok(u32::from_le_bytes([
            attributes[4],
            attributes[5],
            attributes[6],
            attributes[7],
        ]))
    }

    /// Frame slots the chunk holds at its current size
    ///
    /// # Errors
    ///
    /// Returns error if the chunk is missing
    pub fn frame_space(&self, file: &ChunkFile, layout: &FrameLayout) -> Result<u64> {
        let size = file.chunk(self.chunk)?.size;
        Ok((size - FRAMES_OFFSET) / layout.stride() as u64)
    }

    /// Unused frame slots
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn frame_space_available(&self, file: &ChunkFile, layout: &FrameLayout) -> Result<u64> {
        Ok(self.frame_space(file, layout)? - self.num_frames(file)?)
    }

    /// Grow the chunk so `frames` more frames fit
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn reserve(&self, file: &mut ChunkFile, layout: &FrameLayout, frames: u64) -> Result<()> {
        let used = self.num_frames(file)?;
        let needed = page_align(FRAMES_OFFSET + (used + frames) * layout.stride() as u64);
        let size = file.chunk(self.chunk)?.size;

        if needed > size {
            debug!(
                "Growing segment chunk {} from {} to {} bytes",
                self.chunk, size, needed
            );
            file.resize_chunk(self.chunk, needed)?;
        }

        Ok(())
    }

    /// Append frames; each frame holds one little-endian sample per channel
    /// in channel order
    ///
    /// Returns the new `fidx_end`. Nothing is written if any sample has the
    /// wrong width.
    ///
    /// # Errors
    ///
    /// Returns `ChannelSizeMismatch` on a width mismatch or
    /// `ChannelCountMismatch` on a sample count mismatch
    pub fn add_frames<F, S>(
        &self,
        file: &mut ChunkFile,
        layout: &FrameLayout,
        frames: &[F],
    ) -> Result<u64>
    where
        F: AsRef<[S]>,
        S: AsRef<[u8]>,
    {
        for frame in frames {
            layout.check(frame.as_ref())?;
        }

        self.reserve(file, layout, frames.len() as u64)?;

        let mut header = self.header(file)?;
        let stride = layout.stride() as u64;
        let mut at = self.body(file)? + WAVE_HEADER_SIZE
            + (header.fidx_end() - header.fidx_start()) * stride;

        let store = file.store_mut();
        for frame in frames {
            for sample in frame.as_ref() {
                let bytes = sample.as_ref();
                store.write(at, bytes)?;
                at += bytes.len() as u64;
            }
        }

        let fidx_end = header.fidx_end() + frames.len() as u64;
        header = WaveHeader::new(header.channels, header.fidx_start(), fidx_end);
        self.write_header(file, &header)?;

        Ok(fidx_end)
    }

    /// Decode global frame `fidx`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the segment does not cover `fidx`
    pub fn get_frame(&self, file: &ChunkFile, layout: &FrameLayout, fidx: u64) -> Result<Frame> {
        let header = self.header(file)?;
        if !(header.fidx_start()..header.fidx_end()).contains(&fidx) {
            return Err(WiffError::NotFound(format!(
                "frame {fidx} in segment {}..{}",
                header.fidx_start(),
                header.fidx_end()
            )));
        }

        let stride = layout.stride() as u64;
        let at = self.body(file)? + WAVE_HEADER_SIZE + (fidx - header.fidx_start()) * stride;
        let bytes = file.store().read(at, stride)?;

        Ok(layout.decode(fidx, bytes))
    }

    /// Packed frame bytes as stored
    ///
    /// # Errors
    ///
    /// Returns error if the chunk cannot be read
    pub fn raw_frames<'a>(&self, file: &'a ChunkFile, layout: &FrameLayout) -> Result<&'a [u8]> {
        let len = self.num_frames(file)? * layout.stride() as u64;
        file.store().read(self.body(file)? + WAVE_HEADER_SIZE, len)
    }

    /// Packed frame bytes passed through the segment's codec
    ///
    /// # Errors
    ///
    /// Returns error if the codec fails
    pub fn export(&self, file: &ChunkFile, layout: &FrameLayout) -> Result<Vec<u8>> {
        codec::compress(self.compression(file)?, self.raw_frames(file, layout)?)
    }
}
