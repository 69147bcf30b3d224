//! WIFF - chunked, page-aligned container for multi-channel waveform recordings
//!
//! A recording is a catalog (WIFFINFO) plus any number of frame segments
//! (WIFFWAVE), annotation blocks (WIFFANNO) and metadata blocks (WIFFMETA),
//! spread over one or more memory-mapped backing files. Chunks grow in place
//! one page at a time; later chunks are relocated rather than rewritten.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod bits;
pub mod block;
pub mod codec;
pub mod config;
pub mod error;
pub mod recording;
pub mod storage;

pub use bits::ChannelSet;
pub use block::{
    Annotation, AnnotationKind, AnnotationQuery, Frame, MarkerCode, MetaEntry, MetaLevel, MetaValue,
};
pub use config::{ChannelConfig, RecordingConfig};
pub use error::{Result, WiffError};
pub use recording::Recording;
pub use storage::Compression;
