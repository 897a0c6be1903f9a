//! Chunked byte access over memory-mapped files.
//!
//! This module owns everything below the pipeline: the reusable line buffer
//! ([`ByteSpan`]), the random-access seam over a chunk's bytes
//! ([`ChunkSource`] with mmap-backed and in-memory implementations), the
//! forward line scanner ([`LineScanner`]), and the planner that partitions a
//! file into line-aligned chunks ([`ChunkPlanner`]).

pub mod lines;
pub mod mapped;
pub mod planner;
pub mod source;
pub mod span;
pub mod validation;

pub use lines::LineScanner;
pub use mapped::MappedChunk;
pub use planner::ChunkPlanner;
pub use source::{ChunkSource, SliceChunk};
pub use span::ByteSpan;

/// The byte that terminates a line and aligns chunk boundaries.
pub const LINE_TERMINATOR: u8 = b'\n';
