//! # linemill - Parallel Line Processing for Very Large Files
//!
//! linemill partitions a file into byte-range chunks aligned on line
//! boundaries, scans each chunk concurrently, applies a user-supplied
//! per-line function, and re-assembles results in original file order with
//! correct global line numbers. Memory stays bounded and streaming; the file
//! is memory-mapped read-only, never buffered whole.
//!
//! ## Architecture
//!
//! The library is organized into focused modules, leaves first:
//!
//! - [`error`] - Centralized error types and handling
//! - [`cancel`] - Cooperative cancellation token
//! - [`chunk`] - Line-aligned chunk planning and scanning over memory maps
//! - [`mapreduce`] - Generic ordered map-reduce driver (order-preserving
//!   fan-in over concurrently produced sub-streams)
//! - [`pipeline`] - The public processing surface wiring it all together
//!
//! ## Example
//!
//! ```no_run
//! use linemill::{process, LineVerdict, Settings};
//!
//! # async fn run() -> linemill::Result<()> {
//! let mut results = process(
//!     "app.log",
//!     |line| {
//!         if line.content().starts_with(b"ERROR") {
//!             LineVerdict::Keep(line.to_text().into_owned())
//!         } else {
//!             LineVerdict::Skip
//!         }
//!     },
//!     Settings::default(),
//! )
//! .await?;
//!
//! while let Some(result) = results.next().await {
//!     let line = result?;
//!     println!("{}: {}", line.line_number, line.value);
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod cancel;
pub mod chunk;
pub mod error;
pub mod mapreduce;
pub mod pipeline;

// Re-export commonly used types for convenience
pub use cancel::CancelToken;
pub use error::{LinemillError, Result};
pub use pipeline::{
    process, process_with_token, LineContext, LineResults, LineVerdict, ProcessedLine, Settings,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
