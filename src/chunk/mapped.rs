//! Memory-mapped chunk of a larger file.

use crate::chunk::source::ChunkSource;
use crate::chunk::span::ByteSpan;
use memchr::memchr;
use memmap2::Mmap;
use std::sync::Arc;

/// One line-aligned byte range of the input file, backed by a view into the
/// shared read-only mapping.
///
/// Each chunk is exclusively owned by the worker task scanning it; the
/// underlying mapping is shared (`Arc`) and unmapped once the last chunk and
/// the planner have released it. Pages are loaded on demand by the OS as the
/// scan walks forward.
#[derive(Debug)]
pub struct MappedChunk {
    map: Arc<Mmap>,
    offset: u64,
    len: u64,
    is_last: bool,
}

impl MappedChunk {
    pub(crate) fn new(map: Arc<Mmap>, offset: u64, len: u64, is_last: bool) -> Self {
        debug_assert!(offset + len <= map.len() as u64);
        Self {
            map,
            offset,
            len,
            is_last,
        }
    }

    /// Absolute file offset where this chunk starts.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True for the final chunk, which may end at EOF without a trailing
    /// line terminator.
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    fn slice(&self) -> &[u8] {
        let start = self.offset as usize;
        let end = start + self.len as usize;
        &self.map[start..end]
    }
}

impl ChunkSource for MappedChunk {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_byte(&self, pos: u64) -> u8 {
        self.slice()[pos as usize]
    }

    fn read_into(&self, pos: u64, count: usize, buf: &mut ByteSpan) -> usize {
        let bytes = self.slice();
        let start = pos as usize;
        let end = start.saturating_add(count).min(bytes.len());
        let copied = end.saturating_sub(start);
        buf.require_size(count)[..copied].copy_from_slice(&bytes[start..end]);
        buf.set_len(copied);
        copied
    }

    fn find_byte(&self, from: u64, needle: u8) -> Option<u64> {
        memchr(needle, &self.slice()[from as usize..]).map(|rel| from + rel as u64)
    }
}
