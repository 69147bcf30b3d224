//! Chunk discovery, allocation and page-aligned relocation

use std::path::Path;

use tracing::debug;

use super::format::{page_align, ChunkHeader, ChunkTag, CHUNK_HEADER_SIZE, PAGE_SIZE};
use super::store::ByteStore;
use crate::{Result, WiffError};

/// Location of one chunk discovered in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Chunk type
    pub tag: ChunkTag,
    /// Total size including the header
    pub size: u64,
    /// Attribute bytes
    pub attributes: [u8; 8],
    /// Absolute offset of the header
    pub offset: u64,
}

impl ChunkInfo {
    /// Absolute offset of the chunk body
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE
    }

    /// Absolute offset one past the last byte of the chunk
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Read the header at `offset`
///
/// # Errors
///
/// Returns error if the header lies past the end of the store
pub fn read_header(store: &ByteStore, offset: u64) -> Result<ChunkHeader> {
    Ok(ChunkHeader::from_bytes(&store.read_array(offset)?))
}

/// Write a header at `offset`
///
/// # Errors
///
/// Returns error if the header lies past the end of the store
pub fn write_header(store: &mut ByteStore, offset: u64, header: &ChunkHeader) -> Result<()> {
    store.write(offset, &header.to_bytes())
}

/// Scan a store from offset 0, following `offset += size` to the end
///
/// A store that is one all-zero page holds no chunks yet.
///
/// # Errors
///
/// Returns `MalformedChunk` on a zero size, unknown tag, unaligned size or a
/// chunk running past the end of the file
pub fn discover(store: &ByteStore) -> Result<Vec<ChunkInfo>> {
    let total = store.len();
    if total == PAGE_SIZE && store.read(0, PAGE_SIZE)?.iter().all(|&b| b == 0) {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut offset = 0;

    while offset < total {
        let malformed = |reason: String| WiffError::MalformedChunk { offset, reason };

        if offset + CHUNK_HEADER_SIZE > total {
            return Err(malformed("truncated header".to_string()));
        }

        let header = read_header(store, offset)?;
        let size = header.size();
        if size == 0 {
            return Err(malformed("zero length chunk".to_string()));
        }

        let tag = header
            .tag()
            .ok_or_else(|| malformed(format!("unknown tag {:?}", header.magic)))?;

        if size % PAGE_SIZE != 0 {
            return Err(malformed(format!("size {size} is not page aligned")));
        }

        if offset + size > total {
            return Err(malformed(format!(
                "size {size} runs past end of file ({total} bytes)"
            )));
        }

        chunks.push(ChunkInfo {
            tag,
            size,
            attributes: header.attributes,
            offset,
        });
        offset += size;
    }

    Ok(chunks)
}

/// Grow the chunk at `offset` to `new_size`, relocating everything after it
///
/// Pages following the chunk are copied forward by the size delta, last page
/// first, then the vacated pages are zeroed and the header size updated.
/// Returns the delta in bytes.
///
/// # Errors
///
/// Returns `InvalidResize` if `new_size` is not page aligned or smaller than
/// the current size
pub fn resize(store: &mut ByteStore, offset: u64, new_size: u64) -> Result<u64> {
    let mut header = read_header(store, offset)?;
    let old_size = header.size();

    if new_size % PAGE_SIZE != 0 || new_size < old_size {
        return Err(WiffError::InvalidResize {
            current: old_size,
            requested: new_size,
        });
    }
    if new_size == old_size {
        return Ok(0);
    }

    let delta = new_size - old_size;
    let file_size = store.len();
    let chunk_end = offset + old_size;

    store.grow(page_align(file_size) + delta)?;

    if file_size > chunk_end {
        let first_page = chunk_end / PAGE_SIZE;
        let last_page = file_size.div_ceil(PAGE_SIZE) - 1;

        debug!(
            "Relocating pages {}..={} of {} forward by {} bytes",
            first_page,
            last_page,
            store.path().display(),
            delta
        );

        for page in (first_page..=last_page).rev() {
            let from = page * PAGE_SIZE;
            store.copy_within(from, from + delta, PAGE_SIZE)?;
        }
    }

    store.fill(chunk_end, delta, 0)?;

    header.set_size(new_size);
    write_header(store, offset, &header)?;

    Ok(delta)
}

/// A byte store together with the index of the chunks it holds
///
/// Chunks are addressed by their position in the index, which never changes
/// because chunks are only ever appended. Offsets in the index are kept in
/// step with relocations done through [`ChunkFile::resize_chunk`].
#[derive(Debug)]
pub struct ChunkFile {
    store: ByteStore,
    chunks: Vec<ChunkInfo>,
}

impl ChunkFile {
    /// Create a new, empty chunk file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists or cannot be created
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            store: ByteStore::create(path)?,
            chunks: Vec::new(),
        })
    }

    /// Open an existing file and discover its chunks
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or its chunk chain is malformed
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WiffError::NotFound(format!("file {}", path.display())));
        }

        let store = ByteStore::open(path)?;
        let chunks = discover(&store)?;

        debug!("Discovered {} chunks in {}", chunks.len(), path.display());

        Ok(Self { store, chunks })
    }

    /// Underlying byte store
    #[must_use]
    pub fn store(&self) -> &ByteStore {
        &self.store
    }

    /// Underlying byte store, mutably
    pub fn store_mut(&mut self) -> &mut ByteStore {
        &mut self.store
    }

    /// All chunks in file order
    #[must_use]
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    /// Chunk at `index`
    ///
    /// # Errors
    ///
    /// Returns error if there is no such chunk
    pub fn chunk(&self, index: usize) -> Result<&ChunkInfo> {
        self.chunks.get(index).ok_or_else(|| {
            WiffError::NotFound(format!(
                "chunk {index} in {}",
                self.store.path().display()
            ))
        })
    }

    /// Indices of chunks with the given tag
    pub fn indices_of(&self, tag: ChunkTag) -> impl Iterator<Item = usize> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.tag == tag)
            .map(|(i, _)| i)
    }

    /// Append a new zero-filled chunk of `pages` pages at the end of the file
    ///
    /// Returns the chunk's index.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn append_chunk(
        &mut self,
        tag: ChunkTag,
        pages: u64,
        attributes: [u8; 8],
    ) -> Result<usize> {
        let offset = self.chunks.last().map_or(0, ChunkInfo::end);
        let size = pages.max(1) * PAGE_SIZE;

        self.store.grow(offset + size)?;
        self.store.fill(offset, size, 0)?;
        write_header(&mut self.store, offset, &ChunkHeader::new(tag, size, attributes))?;

        debug!(
            "Appended {} chunk of {} bytes at offset {} in {}",
            tag,
            size,
            offset,
            self.store.path().display()
        );

        self.chunks.push(ChunkInfo {
            tag,
            size,
            attributes,
            offset,
        });
        Ok(self.chunks.len() - 1)
    }

    /// Grow chunk `index` to `new_size` bytes and shift the offsets of every
    /// later chunk by the delta
    ///
    /// # Errors
    ///
    /// Returns error if the resize is invalid or the file cannot be grown
    pub fn resize_chunk(&mut self, index: usize, new_size: u64) -> Result<()> {
        let offset = self.chunk(index)?.offset;
        let delta = resize(&mut self.store, offset, new_size)?;

        self.chunks[index].size = new_size;
        for later in &mut self.chunks[index + 1..] {
            later.offset += delta;
        }

        Ok(())
    }

    /// Grow chunk `index` by `pages` pages
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be grown
    pub fn grow_chunk(&mut self, index: usize, pages: u64) -> Result<()> {
        let size = self.chunk(index)?.size;
        self.resize_chunk(index, size + pages * PAGE_SIZE)
    }

    /// Flush the mapping to disk
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}
