//! Forward line scanning within one chunk.

use crate::chunk::source::ChunkSource;
use crate::chunk::span::ByteSpan;
use crate::chunk::LINE_TERMINATOR;

/// Single-pass scanner producing successive line spans from a chunk.
///
/// Each call to [`next_line`](Self::next_line) materializes the next line,
/// terminator byte included, into an internal reusable [`ByteSpan`]. The
/// final line of the last chunk may lack a terminator; it is yielded up to
/// EOF. Chunk boundaries fall immediately after a terminator, so no line
/// ever spans two chunks and a scanner never needs to look outside its
/// source.
///
/// Not restartable: once exhausted it only returns `None`.
#[derive(Debug)]
pub struct LineScanner<'s, S: ChunkSource> {
    source: &'s S,
    line_start: u64,
    span: ByteSpan,
}

impl<'s, S: ChunkSource> LineScanner<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            line_start: 0,
            span: ByteSpan::new(),
        }
    }

    /// The next line's bytes, or `None` at end of chunk.
    ///
    /// The returned span is only valid until the next call; callers copy out
    /// whatever they keep.
    pub fn next_line(&mut self) -> Option<&ByteSpan> {
        let len = self.source.len();
        if self.line_start >= len {
            return None;
        }

        let end = match self.source.find_byte(self.line_start, LINE_TERMINATOR) {
            Some(pos) => pos + 1,
            None => len,
        };
        let count = (end - self.line_start) as usize;
        self.source.read_into(self.line_start, count, &mut self.span);
        self.line_start = end;
        Some(&self.span)
    }
}
