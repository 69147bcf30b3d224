//! Recording orchestration over one or more backing files

mod cursor;
mod engine;

pub use cursor::{AppendCursor, SegmentCursor};
pub use engine::{AnnotationBlock, BackingFile, Frames, Recording, Segment};
