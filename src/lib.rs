#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Replayline
//!
//! Replayline replays previously captured network traffic back into a
//! live pipeline. The capture side of the toolchain records traffic to
//! framed files; this crate reads those files back, merges any number of
//! them into a single stream ordered by capture timestamp, and re-emits
//! the recorded payloads with their original temporal spacing,
//! optionally accelerated or decelerated, optionally looping forever.
//!
//! ## Quick Start
//!
//! ```no_run
//! use replayline::{FileReplayer, ReplayConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let replayer = FileReplayer::new(
//!         ReplayConfig::new("./captures/*.cap")
//!             .with_speed(1.0),
//!     );
//!
//!     let mut records = replayer.start()?;
//!     while let Some(record) = records.recv().await {
//!         println!("{} {} at {}", record.kind.name(), record.id, record.timestamp);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Behavior Notes
//!
//! - Gzip-compressed capture files (`.gz` suffix) are read transparently.
//! - Timestamps are merged across files, so concurrent captures replay
//!   interleaved exactly as they were observed.
//! - The output queue is bounded: a slow consumer applies backpressure to
//!   the replay worker instead of buffering without limit.
//! - Malformed record metadata and truncated files degrade gracefully;
//!   they never abort a replay.

pub mod error;
pub mod replay;

pub use error::{ReplayError, Result};
pub use replay::{FileReplayer, PacingMode, Record, RecordKind, ReplayConfig, ReplayerStats};
