//! Partitioning a file into line-aligned chunks.

use crate::chunk::mapped::MappedChunk;
use crate::chunk::source::ChunkSource;
use crate::chunk::validation::validate_input_path;
use crate::chunk::LINE_TERMINATOR;
use crate::error::{LinemillError, Result};
use memchr::memrchr;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// How many times a chunk window may grow by 50% while hunting for a line
/// terminator before the search is declared hopeless. With the default
/// 1 MiB target this tolerates single lines in the hundreds of megabytes.
const MAX_GROW_RETRIES: usize = 16;

/// Walks a file front to back, emitting non-overlapping chunks whose
/// boundaries fall immediately after a line terminator.
///
/// Chunks partition the file exactly: no gaps, no overlaps, and every
/// non-last chunk ends one byte past a terminator. The last chunk ends at
/// EOF, terminator or not. Discovery is inherently sequential since each
/// chunk starts where the previous one ended.
///
/// The file is mapped read-only once; chunks hold shared references to the
/// mapping, so it is unmapped only after the planner and every outstanding
/// chunk have been dropped. A zero-length file is never mapped and yields no
/// chunks.
#[derive(Debug)]
pub struct ChunkPlanner {
    map: Option<Arc<Mmap>>,
    total: u64,
    offset: u64,
    rough_chunk_size: u64,
    failed: bool,
}

impl ChunkPlanner {
    /// Validate, open, and map `path`, targeting chunks of roughly
    /// `rough_chunk_size` bytes.
    pub fn open(path: &Path, rough_chunk_size: u64) -> Result<Self> {
        validate_input_path(path)?;

        let file = File::open(path).map_err(|e| {
            LinemillError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;
        let total = file
            .metadata()
            .map_err(|e| LinemillError::file_error("Failed to get file metadata", e))?
            .len();

        let map = if total == 0 {
            // mmap(2) rejects empty ranges; an empty file simply has no chunks.
            None
        } else {
            let map = unsafe {
                Mmap::map(&file).map_err(|e| {
                    LinemillError::file_error(
                        format!("Failed to memory map file: {}", path.display()),
                        e,
                    )
                })?
            };

            #[cfg(unix)]
            {
                if let Err(e) = map.advise(memmap2::Advice::Sequential) {
                    log::warn!("failed to set mmap advice: {e}");
                }
            }

            Some(Arc::new(map))
        };

        Ok(Self {
            map,
            total,
            offset: 0,
            rough_chunk_size: rough_chunk_size.max(1),
            failed: false,
        })
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.total
    }

    fn find_next(&self, map: &Arc<Mmap>) -> Result<MappedChunk> {
        let remaining = self.total - self.offset;
        let mut window = self.rough_chunk_size;

        for _ in 0..MAX_GROW_RETRIES {
            if remaining <= window {
                return Ok(MappedChunk::new(
                    Arc::clone(map),
                    self.offset,
                    remaining,
                    true,
                ));
            }

            let start = self.offset as usize;
            let candidate = &map[start..start + window as usize];
            if let Some(pos) = memrchr(LINE_TERMINATOR, candidate) {
                return Ok(MappedChunk::new(
                    Arc::clone(map),
                    self.offset,
                    pos as u64 + 1,
                    false,
                ));
            }

            // No terminator in this window; widen and retry.
            window += (window / 2).max(1);
            log::trace!(
                "no terminator in window at offset {}, growing to {window}",
                self.offset
            );
        }

        Err(LinemillError::boundary_not_found(self.offset, window))
    }
}

impl Iterator for ChunkPlanner {
    type Item = Result<MappedChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let map = self.map.clone()?;

        match self.find_next(&map) {
            Ok(chunk) => {
                self.offset += chunk.len();
                if chunk.is_last() {
                    self.map = None;
                }
                log::debug!(
                    "chunk at offset {} ({} bytes{})",
                    chunk.offset(),
                    chunk.len(),
                    if chunk.is_last() { ", last" } else { "" }
                );
                Some(Ok(chunk))
            }
            Err(e) => {
                self.failed = true;
                self.map = None;
                Some(Err(e))
            }
        }
    }
}
