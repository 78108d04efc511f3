//! Traffic replay from capture files
//!
//! This module is the playback half of the capture/replay pipeline: it
//! reads framed capture files back and re-emits the recorded payloads as
//! one time-ordered stream with the original inter-arrival spacing.
//!
//! - [`codec`]: the on-disk payload framing (separator, header, body)
//! - [`reader`]: per-file sequential decoding, gzip-transparent
//! - [`pacing`]: the delay computation between emissions
//! - [`playback`]: the multi-file merge scheduler and its lifecycle
//!
//! # Usage
//!
//! ```rust,ignore
//! use replayline::{FileReplayer, ReplayConfig};
//!
//! let replayer = FileReplayer::new(
//!     ReplayConfig::new("./captures/*.cap")
//!         .with_speed(2.0), // replay at twice the captured rate
//! );
//!
//! let mut records = replayer.start()?;
//! while let Some(record) = records.recv().await {
//!     forward(record.body).await?;
//! }
//! ```
//!
//! Pass `.with_loop()` to restart from the first file indefinitely after
//! the last record; the file pattern is re-resolved on every pass.

pub mod codec;
pub mod pacing;
pub mod playback;
pub mod reader;

pub use codec::{Record, RecordKind, RECORD_SEPARATOR};
pub use pacing::Pacer;
pub use playback::{FileReplayer, PacingMode, ReplayConfig, ReplayerStats};
pub use reader::FileReader;
