//! Append cursor: where the next frames, annotations and meta values go

use crate::block::{AnnoBlock, FrameLayout, MetaBlock, WaveBlock};

/// Segment currently receiving frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCursor {
    /// Backing file index
    pub file: usize,
    /// Segment chunk
    pub block: WaveBlock,
    /// Channel widths of the segment
    pub layout: FrameLayout,
}

/// Indices of the blocks appends are routed to
///
/// Every block cursor lives in `file` except right after [`resume`], where a
/// segment or annotation block in an earlier file may still be current.
///
/// [`resume`]: crate::Recording::resume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendCursor {
    /// Backing file index new blocks are created in
    pub file: usize,
    /// Current segment
    pub segment: Option<SegmentCursor>,
    /// Current annotation block as `(file, block)`
    pub annotations: Option<(usize, AnnoBlock)>,
    /// Current meta block as `(file, block)`
    pub meta: Option<(usize, MetaBlock)>,
}

impl AppendCursor {
    /// Point at `file` and forget every block cursor
    pub fn select_file(&mut self, file: usize) {
        *self = Self {
            file,
            ..Self::default()
        };
    }
}
