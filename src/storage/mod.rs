//! Chunked on-disk storage: byte stores, chunk headers and jump tables

mod chunk;
mod format;
mod jump_table;
mod store;

pub use chunk::{discover, read_header, resize, write_header, ChunkFile, ChunkInfo};
pub use format::{
    page_align, ChunkHeader, ChunkTag, Compression, WaveHeader, ANNO_HEADER_SIZE,
    CHUNK_HEADER_SIZE, INFO_HEADER_SIZE, INFO_VERSION, META_HEADER_SIZE, PAGE_SIZE,
    WAVE_HEADER_SIZE,
};
pub use jump_table::{append_growing, JumpTable, ListLayout, ENTRY_SIZE};
pub use store::ByteStore;

pub(crate) use format::{anno as anno_layout, info as info_layout, meta as meta_layout};

use crate::{Result, WiffError};

/// Validate the header of a chunk expected to carry `tag`
///
/// # Errors
///
/// Returns error if the chunk carries a different tag
pub fn validate_tag(chunk: &ChunkInfo, tag: ChunkTag) -> Result<()> {
    if chunk.tag != tag {
        return Err(WiffError::MalformedChunk {
            offset: chunk.offset,
            reason: format!("expected {tag} chunk, found {}", chunk.tag),
        });
    }

    Ok(())
}
