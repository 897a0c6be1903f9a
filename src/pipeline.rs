//! Large-file line processing: the public pipeline surface.
//!
//! [`process`] partitions a file into line-aligned chunks, scans every chunk
//! on the blocking pool concurrently, applies the per-line function, and
//! hands results back strictly in file order with correct global line
//! numbers, all under bounded memory.
//!
//! The heavy lifting is split between [`crate::chunk`] (planning and
//! scanning) and [`crate::mapreduce`] (ordered fan-in); this module wires
//! them together and owns line numbering.

use crate::cancel::CancelToken;
use crate::chunk::lines::LineScanner;
use crate::chunk::mapped::MappedChunk;
use crate::chunk::planner::ChunkPlanner;
use crate::error::Result;
use crate::mapreduce::{
    DrainEvent, OrderedReducers, ReducerHandle, ReducerQueue, ReducerSource,
};
use async_trait::async_trait;
use bstr::{BStr, ByteSlice};
use std::borrow::Cow;
use std::marker::PhantomData;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default target chunk size: 1 MiB.
pub const DEFAULT_ROUGH_CHUNK_SIZE: u64 = 1024 * 1024;

/// Pipeline configuration.
///
/// `rough_chunk_size` is a target, not an exact size; actual chunks are
/// adjusted to end exactly after a line terminator. The two depth knobs
/// bound memory: discovery never runs more than `max_pending_chunks` chunks
/// ahead of consumption, and each chunk buffers at most `line_buffer` kept
/// results while waiting for its turn in the in-order drain.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Target chunk size in bytes.
    pub rough_chunk_size: u64,
    /// How many chunks may be discovered (and scanning) ahead of the drain.
    pub max_pending_chunks: usize,
    /// Per-chunk buffer of kept results awaiting the in-order drain.
    pub line_buffer: usize,
    /// Runtime to spawn pipeline tasks on; `None` uses the ambient runtime.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub runtime: Option<Handle>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rough_chunk_size: DEFAULT_ROUGH_CHUNK_SIZE,
            max_pending_chunks: 4,
            line_buffer: 1024,
            runtime: None,
        }
    }
}

impl Settings {
    fn handle(&self) -> Handle {
        self.runtime.clone().unwrap_or_else(Handle::current)
    }
}

/// One line handed to the per-line function.
///
/// Borrowed from the worker's scan buffer; valid only for the duration of
/// the call.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    bytes: &'a [u8],
}

impl<'a> LineContext<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Raw bytes of the line, including the trailing terminator. The final
    /// line of a file may be unterminated.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Line content without the trailing `\n`, and without a `\r` preceding
    /// it (files written on Windows).
    pub fn content(&self) -> &'a [u8] {
        let mut bytes = self.bytes;
        if let [head @ .., b'\n'] = bytes {
            bytes = head;
        }
        if let [head @ .., b'\r'] = bytes {
            bytes = head;
        }
        bytes
    }

    /// The raw bytes as a byte string.
    pub fn as_bstr(&self) -> &'a BStr {
        self.bytes.as_bstr()
    }

    /// Lossy UTF-8 view of the content, terminator stripped.
    pub fn to_text(&self) -> Cow<'a, str> {
        self.content().to_str_lossy()
    }
}

/// Per-line decision returned by the user function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict<T> {
    /// Emit this value, tagged with the line's global line number.
    Keep(T),
    /// Produce nothing for this line.
    Skip,
}

/// A kept value with its 1-based global line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedLine<T> {
    pub value: T,
    pub line_number: u64,
}

/// A kept result carrying its chunk-local line number. Global numbering is
/// resolved on the drain side once the preceding chunk's count is known.
struct ScanItem<T> {
    local_line: u64,
    value: T,
}

/// Scan one chunk on the blocking pool: count every line, run the user
/// function, forward kept values. Returns the chunk's total line count.
///
/// A full channel blocks the send, which is the backpressure that keeps a
/// fast scanner from outrunning the drain. A closed channel means the run is
/// being torn down; the scan just stops.
fn scan_chunk<T, F>(
    chunk: MappedChunk,
    per_line: Arc<F>,
    results: mpsc::Sender<ScanItem<T>>,
    cancel: CancelToken,
) -> Result<u64>
where
    T: Send + 'static,
    F: Fn(LineContext<'_>) -> LineVerdict<T> + Send + Sync + 'static,
{
    let mut scanner = LineScanner::new(&chunk);
    let mut local_line: u64 = 0;

    while let Some(span) = scanner.next_line() {
        local_line += 1;

        if cancel.is_cancelled() {
            log::debug!(
                "scan of chunk at offset {} stopped at line {local_line}: cancelled",
                chunk.offset()
            );
            break;
        }

        match per_line(LineContext::new(span.bytes())) {
            LineVerdict::Keep(value) => {
                if results.blocking_send(ScanItem { local_line, value }).is_err() {
                    break;
                }
            }
            LineVerdict::Skip => {}
        }
    }

    Ok(local_line)
}

/// Discovers chunks sequentially and starts one scan task per chunk.
///
/// Chunk discovery cannot be parallelized (each chunk starts where the
/// previous one ended), but scanning overlaps: every discovered chunk's task
/// is started immediately, and only the handle publication waits for queue
/// capacity.
struct ChunkMapper<T, F> {
    planner: ChunkPlanner,
    per_line: Arc<F>,
    line_buffer: usize,
    runtime: Handle,
    _results: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T, F> ReducerSource for ChunkMapper<T, F>
where
    T: Send + 'static,
    F: Fn(LineContext<'_>) -> LineVerdict<T> + Send + Sync + 'static,
{
    type Item = ScanItem<T>;
    type Summary = u64;

    async fn run(
        mut self,
        queue: ReducerQueue<ScanItem<T>, u64>,
        cancel: CancelToken,
    ) -> Result<()> {
        while let Some(chunk) = self.planner.next() {
            if cancel.is_cancelled() {
                log::debug!("chunk discovery stopped: cancelled");
                return Ok(());
            }

            let chunk = chunk?;
            let (tx, rx) = mpsc::channel(self.line_buffer.max(1));
            let per_line = Arc::clone(&self.per_line);
            let scan_cancel = cancel.clone();
            let task = self
                .runtime
                .spawn_blocking(move || scan_chunk(chunk, per_line, tx, scan_cancel));

            if !queue.publish(ReducerHandle::new(rx, task)).await {
                // Consumer gone; the spawned scan notices its closed channel.
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Drain loop: converts ordered drain events into globally numbered results.
///
/// `lines_before` accumulates each chunk's line count exactly once, right
/// after that chunk is fully drained, so the count for chunk k is always
/// known before chunk k+1's first result is numbered.
async fn drain_ordered<T: Send + 'static>(
    mut ordered: OrderedReducers<ScanItem<T>, u64>,
    out: mpsc::Sender<Result<ProcessedLine<T>>>,
) {
    let mut lines_before: u64 = 0;

    while let Some(event) = ordered.next_event().await {
        match event {
            Ok(DrainEvent::Item(item)) => {
                let line = ProcessedLine {
                    value: item.value,
                    line_number: lines_before + item.local_line,
                };
                if out.send(Ok(line)).await.is_err() {
                    break;
                }
            }
            Ok(DrainEvent::ReducerDone(count)) => {
                lines_before += count;
            }
            Err(e) => {
                let _ = out.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Ordered, lazily produced results of a pipeline run.
///
/// Yields `Ok` results strictly in file order until the run completes, a
/// fatal error is yielded once, or cancellation stops the stream. Dropping
/// the stream cancels the run and releases its resources cooperatively.
///
/// Also implements [`futures::Stream`].
pub struct LineResults<T> {
    results: mpsc::Receiver<Result<ProcessedLine<T>>>,
    cancel: CancelToken,
    _drain: JoinHandle<()>,
}

impl<T> LineResults<T> {
    /// The next result in file order, or `None` once the stream is over.
    pub async fn next(&mut self) -> Option<Result<ProcessedLine<T>>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.results.recv().await
    }

    /// Request cooperative cancellation: no further results are yielded and
    /// in-flight work winds down at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation token, usable from other tasks.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl<T> Drop for LineResults<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> futures::Stream for LineResults<T> {
    type Item = Result<ProcessedLine<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        this.results.poll_recv(cx)
    }
}

/// Process `path` line by line, in parallel, preserving file order.
///
/// Applies `per_line` to every line of the file and returns the kept values
/// with their 1-based global line numbers, strictly in file order. The
/// returned stream is lazy; chunks are scanned concurrently ahead of
/// consumption, bounded by [`Settings::max_pending_chunks`].
///
/// # Errors
/// Fails eagerly if the file cannot be validated, opened, or mapped. Faults
/// discovered during the run (a pathologically long line, a panicking
/// callback) are yielded once through the stream, after any results produced
/// before the fault.
pub async fn process<T, F>(
    path: impl AsRef<Path>,
    per_line: F,
    settings: Settings,
) -> Result<LineResults<T>>
where
    T: Send + 'static,
    F: Fn(LineContext<'_>) -> LineVerdict<T> + Send + Sync + 'static,
{
    process_with_token(path, per_line, settings, CancelToken::new()).await
}

/// [`process`] with an externally owned cancellation token.
pub async fn process_with_token<T, F>(
    path: impl AsRef<Path>,
    per_line: F,
    settings: Settings,
    cancel: CancelToken,
) -> Result<LineResults<T>>
where
    T: Send + 'static,
    F: Fn(LineContext<'_>) -> LineVerdict<T> + Send + Sync + 'static,
{
    let path = path.as_ref();
    let planner = ChunkPlanner::open(path, settings.rough_chunk_size)?;
    log::debug!(
        "processing {} ({} bytes, rough chunk size {})",
        path.display(),
        planner.file_size(),
        settings.rough_chunk_size
    );

    let runtime = settings.handle();
    let mapper = ChunkMapper {
        planner,
        per_line: Arc::new(per_line),
        line_buffer: settings.line_buffer,
        runtime: runtime.clone(),
        _results: PhantomData,
    };

    let ordered = OrderedReducers::spawn(
        mapper,
        settings.max_pending_chunks,
        cancel.clone(),
        &runtime,
    );

    let (out_tx, out_rx) = mpsc::channel(settings.line_buffer.max(1));
    let drain = runtime.spawn(drain_ordered(ordered, out_tx));

    Ok(LineResults {
        results: out_rx,
        cancel,
        _drain: drain,
    })
}
