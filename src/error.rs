//! Error types for WIFF

use std::io;
use thiserror::Error;

/// Result type for WIFF operations
pub type Result<T> = std::result::Result<T, WiffError>;

/// Errors that can occur while reading or writing a recording
#[derive(Debug, Error)]
pub enum WiffError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Chunk header could not be interpreted during discovery
    #[error("Malformed chunk at offset {offset}: {reason}")]
    MalformedChunk {
        /// Absolute offset of the offending header
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// File, segment, frame, annotation or meta value lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access past the current extent of a byte store
    #[error("Access of {len} bytes at offset {offset} exceeds store extent of {extent} bytes")]
    OutOfBounds {
        /// Requested offset
        offset: u64,
        /// Requested length
        len: u64,
        /// Current store size
        extent: u64,
    },

    /// A chunk is too small for the pending write; resolved by growing the chunk
    #[error("Insufficient space: {needed} more bytes required")]
    InsufficientSpace {
        /// Bytes missing at the end of the chunk
        needed: u64,
    },

    /// Sample byte length disagrees with the channel's storage width
    #[error("Channel {channel}: sample is {actual} bytes but channel stores {expected} bytes")]
    ChannelSizeMismatch {
        /// Channel index
        channel: u8,
        /// Storage width derived from the bit depth
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Frame holds a different number of samples than the segment has channels
    #[error("Frame holds {actual} samples but the segment has {expected} channels")]
    ChannelCountMismatch {
        /// Channels in the segment
        expected: usize,
        /// Samples supplied
        actual: usize,
    },

    /// File name or on-disk path already in use
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Meta value with the same level, index and key already stored
    #[error("Duplicate meta key '{key}' at {level} index {level_index}")]
    DuplicateMetaKey {
        /// Meta level name
        level: String,
        /// Index within the level
        level_index: u64,
        /// Key
        key: String,
    },

    /// Overwrite of a fixed-length string field with a different length
    #[error("Field '{field}' is fixed at {expected} bytes, got {actual}")]
    FixedFieldLengthMismatch {
        /// Field name
        field: &'static str,
        /// Reserved length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Chunk resize to a smaller or non page-aligned size
    #[error("Invalid chunk resize from {current} to {requested} bytes")]
    InvalidResize {
        /// Current chunk size
        current: u64,
        /// Requested chunk size
        requested: u64,
    },

    /// Jump table offsets would no longer fit in 16 bits
    #[error("Record list full: next record would end at {end}, past the 16-bit offset limit")]
    RecordListFull {
        /// Relative end offset the record would have needed
        end: u64,
    },

    /// Annotation is missing a field or has an invalid one
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Append attempted before the matching cursor was set
    #[error("No current {0} selected")]
    NoCursor(&'static str),

    /// Current segment no longer ends at the recording's frame counter
    #[error(
        "Current segment ends at frame {segment_end} but the recording holds {num_frames} frames"
    )]
    StaleCursor {
        /// End of the segment under the cursor
        segment_end: u64,
        /// Recording-wide frame count
        num_frames: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Compression or decompression failure
    #[error("Codec error: {0}")]
    Codec(String),
}
