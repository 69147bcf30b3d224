//! Chunk bodies: recording catalog, frame segments, annotations, metadata
//!
//! Blocks are lightweight handles naming a chunk by its index within a
//! [`ChunkFile`]. Every accessor reads straight from the mapped file, so a
//! handle stays valid across relocations of its chunk.

pub mod anno;
pub mod info;
pub mod meta;
pub mod wave;

pub use anno::{Annotation, AnnotationKind, AnnotationQuery, AnnoBlock, MarkerCode};
pub use info::{Channel, FileEntry, InfoBlock};
pub use meta::{MetaBlock, MetaEntry, MetaLevel, MetaValue};
pub use wave::{Frame, FrameLayout, WaveBlock};

use std::ops::Range;

use crate::storage::{ByteStore, ChunkFile, ChunkTag};
use crate::{Result, WiffError};

/// Absolute body offset of chunk `chunk`, checking its tag
fn body_offset(file: &ChunkFile, chunk: usize, tag: ChunkTag) -> Result<u64> {
    let info = file.chunk(chunk)?;
    crate::storage::validate_tag(info, tag)?;
    Ok(info.data_offset())
}

/// Decode a UTF-8 string stored at an absolute byte range
fn read_str(store: &ByteStore, range: Range<u64>) -> Result<String> {
    if range.end < range.start {
        return Err(WiffError::MalformedChunk {
            offset: range.start,
            reason: format!("string range {}..{} is inverted", range.start, range.end),
        });
    }

    let bytes = store.read(range.start, range.end - range.start)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| WiffError::MalformedChunk {
        offset: range.start,
        reason: format!("invalid UTF-8 string: {e}"),
    })
}

/// Convert a relative offset to its 16-bit on-disk form
fn offset16(value: u64) -> Result<u16> {
    u16::try_from(value).map_err(|_| WiffError::RecordListFull { end: value })
}
