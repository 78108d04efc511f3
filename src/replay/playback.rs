//! Traffic playback from capture files
//!
//! The scheduler owns one [`FileReader`] per file matched by the
//! configured glob pattern and merges them into a single time-ordered
//! stream: each round it selects the reader holding the chronologically
//! earliest pending record, paces against the previously emitted
//! timestamp, and publishes the record to a bounded output channel. A
//! single background worker runs the whole merge, so reader state needs
//! no per-record locking; the reader set itself is guarded by one mutex
//! because loop restarts replace it wholesale while `stop` may be closing
//! handles concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ReplayError, Result};
use crate::replay::codec::{Record, RecordKind};
use crate::replay::pacing::Pacer;
use crate::replay::reader::FileReader;

/// Pause between attempts to re-resolve an empty pattern while looping
const RESTART_RETRY: Duration = Duration::from_secs(1);

/// Which record kinds participate in pacing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Every emitted record consults and advances the pacing clock,
    /// reproducing the full inter-arrival spacing of the captured stream
    #[default]
    AllRecords,
    /// Only request records are paced; responses are emitted immediately,
    /// their timing being a byproduct of request timing
    RequestsOnly,
}

/// Configuration for file replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Glob pattern matching the capture files to replay; re-resolved on
    /// every loop restart
    pub pattern: String,

    /// Speed multiplier (1.0 = original pacing, >1.0 accelerates)
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Restart from the first matched file after the last record
    #[serde(default)]
    pub loop_replay: bool,

    /// Which record kinds participate in pacing
    #[serde(default)]
    pub pacing: PacingMode,

    /// Output queue capacity; a full queue blocks the replay worker until
    /// the consumer drains
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_speed() -> f64 {
    1.0
}

fn default_queue_capacity() -> usize {
    1000
}

impl ReplayConfig {
    /// Create a config for a file pattern with default settings
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            speed: default_speed(),
            loop_replay: false,
            pacing: PacingMode::default(),
            queue_capacity: default_queue_capacity(),
        }
    }

    /// Set the speed factor
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Enable loop replay
    pub fn with_loop(mut self) -> Self {
        self.loop_replay = true;
        self
    }

    /// Set which record kinds participate in pacing
    pub fn with_pacing(mut self, pacing: PacingMode) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the output queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Check the configuration for values that would misbehave at replay
    /// time; called by [`FileReplayer::start`]
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ReplayError::Config(format!(
                "Speed factor must be a positive number, got {}",
                self.speed
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ReplayError::Config(
                "Output queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics about a replay run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayerStats {
    /// Records emitted to the output queue
    pub records_replayed: u64,
    /// Body bytes emitted
    pub bytes_replayed: u64,
    /// Completed passes over the file set (0 during the first pass)
    pub passes: u64,
    /// Files matched but skipped because they could not be opened
    pub skipped_files: u64,
    /// Whether the emission worker is running
    pub active: bool,
    /// Replay start time (ms since epoch)
    pub start_time: i64,
    /// Elapsed time in milliseconds
    pub elapsed_ms: i64,
}

/// Replays captured traffic files into a bounded output channel
pub struct FileReplayer {
    config: ReplayConfig,
    readers: Arc<Mutex<Vec<FileReader>>>,
    active: Arc<AtomicBool>,
    stats: Arc<RwLock<ReplayerStats>>,
}

impl FileReplayer {
    /// Create a replayer; no files are touched until [`start`](Self::start)
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            readers: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(ReplayerStats::default())),
        }
    }

    /// Resolve the pattern, open a reader per matched file, and spawn the
    /// emission worker. Returns the receiving end of the output queue.
    ///
    /// Fails with [`ReplayError::NoMatchingFiles`] if the pattern matches
    /// nothing; no worker is spawned in that case. Matched files that
    /// cannot be opened are logged and skipped; their siblings replay
    /// normally.
    pub fn start(&self) -> Result<mpsc::Receiver<Record>> {
        self.config.validate()?;

        if self.active.swap(true, Ordering::SeqCst) {
            return Err(ReplayError::AlreadyActive);
        }

        let (fresh, skipped) = match resolve_readers(&self.config.pattern) {
            Ok(set) => set,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(
            pattern = %self.config.pattern,
            files = fresh.len(),
            speed = self.config.speed,
            loop_replay = self.config.loop_replay,
            "starting file replay"
        );

        {
            let mut stats = self.stats.write();
            *stats = ReplayerStats {
                active: true,
                skipped_files: skipped,
                start_time: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            };
        }
        *self.readers.lock() = fresh;

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        tokio::spawn(emit(
            self.config.clone(),
            Arc::clone(&self.readers),
            Arc::clone(&self.active),
            Arc::clone(&self.stats),
            tx,
        ));

        Ok(rx)
    }

    /// Stop replay; idempotent.
    ///
    /// The worker observes the flag at its next iteration boundary: an
    /// in-progress pacing sleep completes first, so stop latency is
    /// bounded by the largest single inter-record delay. All still-open
    /// file handles are released here.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        info!(pattern = %self.config.pattern, "stopping file replay");
        let mut readers = self.readers.lock();
        for reader in readers.iter_mut() {
            reader.close();
        }
    }

    /// Whether the emission worker is running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Current replay statistics
    pub fn stats(&self) -> ReplayerStats {
        let mut stats = self.stats.read().clone();
        if stats.active {
            stats.elapsed_ms = chrono::Utc::now().timestamp_millis() - stats.start_time;
        }
        stats
    }
}

impl std::fmt::Display for FileReplayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file replay: {}", self.config.pattern)
    }
}

/// Resolve a glob pattern into one opened reader per readable file.
///
/// Returns the readers plus the count of matched-but-unreadable files.
/// The glob crate yields matches in sorted order, which keeps tie-breaking
/// across equal timestamps deterministic between runs.
fn resolve_readers(pattern: &str) -> Result<(Vec<FileReader>, u64)> {
    let entries = glob::glob(pattern).map_err(|e| ReplayError::InvalidPattern {
        pattern: pattern.to_string(),
        detail: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    paths.push(path);
                }
            }
            Err(e) => warn!(error = %e, "skipping unreadable path while resolving pattern"),
        }
    }

    if paths.is_empty() {
        return Err(ReplayError::NoMatchingFiles(pattern.to_string()));
    }

    let mut readers = Vec::with_capacity(paths.len());
    let mut skipped = 0u64;
    for path in paths {
        match FileReader::open(&path) {
            Ok(reader) => {
                debug!(path = %reader.path().display(), "opened capture file");
                readers.push(reader);
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable capture file");
                skipped += 1;
            }
        }
    }

    Ok((readers, skipped))
}

/// Index of the reader holding the earliest pending record; ties go to the
/// lowest index. Nanosecond-identical timestamps across independently
/// captured files carry no ordering signal, so first-match-wins is fine.
fn next_ready(readers: &[FileReader]) -> Option<usize> {
    let mut next: Option<(usize, i64)> = None;
    for (idx, reader) in readers.iter().enumerate() {
        if let Some(ts) = reader.timestamp() {
            if next.map(|(_, best)| ts < best).unwrap_or(true) {
                next = Some((idx, ts));
            }
        }
    }
    next.map(|(idx, _)| idx)
}

/// The single background emission worker: merge, pace, publish, repeat.
async fn emit(
    config: ReplayConfig,
    readers: Arc<Mutex<Vec<FileReader>>>,
    active: Arc<AtomicBool>,
    stats: Arc<RwLock<ReplayerStats>>,
    tx: mpsc::Sender<Record>,
) {
    let mut pacer = Pacer::new(config.speed);

    while active.load(Ordering::SeqCst) {
        // Selection round: pick the earliest pending record, take it, and
        // refill that reader's slot. The taken record owns its body, so
        // nothing here aliases reader buffers once the lock drops.
        let record = {
            let mut set = readers.lock();
            match next_ready(&set) {
                Some(idx) => {
                    let record = set[idx].take_pending();
                    set[idx].advance();
                    record
                }
                None => None,
            }
        };

        let Some(record) = record else {
            if !config.loop_replay {
                break;
            }
            match resolve_readers(&config.pattern) {
                Ok((fresh, skipped)) => {
                    *readers.lock() = fresh;
                    pacer.reset();
                    let mut stats = stats.write();
                    stats.passes += 1;
                    stats.skipped_files += skipped;
                    debug!(pattern = %config.pattern, pass = stats.passes, "restarting replay pass");
                }
                Err(e) => {
                    // Nothing to replay this round; keep looping rather
                    // than terminating, the files may come back.
                    warn!(error = %e, "loop restart found nothing to replay, retrying");
                    if tx.is_closed() {
                        break;
                    }
                    tokio::time::sleep(RESTART_RETRY).await;
                }
            }
            continue;
        };

        let paced = match config.pacing {
            PacingMode::AllRecords => true,
            PacingMode::RequestsOnly => record.kind == RecordKind::Request,
        };
        if paced {
            let delay = pacer.delay_for(record.timestamp);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let body_len = record.body.len() as u64;
        if tx.send(record).await.is_err() {
            debug!("output channel closed, stopping replay");
            break;
        }

        let mut stats = stats.write();
        stats.records_replayed += 1;
        stats.bytes_replayed += body_len;
    }

    {
        let mut set = readers.lock();
        for reader in set.iter_mut() {
            reader.close();
        }
    }
    active.store(false, Ordering::SeqCst);

    let records = {
        let mut stats = stats.write();
        stats.active = false;
        stats.elapsed_ms = chrono::Utc::now().timestamp_millis() - stats.start_time;
        stats.records_replayed
    };
    info!(pattern = %config.pattern, records, "file replay finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_config_default_values() {
        let config = ReplayConfig::new("./captures/*.cap");
        assert_eq!(config.speed, 1.0);
        assert!(!config.loop_replay);
        assert_eq!(config.pacing, PacingMode::AllRecords);
        assert_eq!(config.queue_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replay_config_builder() {
        let config = ReplayConfig::new("traffic-*.cap.gz")
            .with_speed(2.5)
            .with_loop()
            .with_pacing(PacingMode::RequestsOnly)
            .with_queue_capacity(16);

        assert_eq!(config.pattern, "traffic-*.cap.gz");
        assert_eq!(config.speed, 2.5);
        assert!(config.loop_replay);
        assert_eq!(config.pacing, PacingMode::RequestsOnly);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_validate_rejects_non_positive_speed() {
        assert!(ReplayConfig::new("*").with_speed(0.0).validate().is_err());
        assert!(ReplayConfig::new("*").with_speed(-1.0).validate().is_err());
        assert!(ReplayConfig::new("*")
            .with_speed(f64::NAN)
            .validate()
            .is_err());
        assert!(ReplayConfig::new("*").with_speed(0.25).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity_queue() {
        let result = ReplayConfig::new("*").with_queue_capacity(0).validate();
        assert!(matches!(result, Err(ReplayError::Config(_))));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ReplayConfig =
            serde_json::from_str(r#"{"pattern": "/var/captures/*.cap"}"#).unwrap();
        assert_eq!(config.pattern, "/var/captures/*.cap");
        assert_eq!(config.speed, 1.0);
        assert!(!config.loop_replay);
        assert_eq!(config.pacing, PacingMode::AllRecords);

        let config: ReplayConfig =
            serde_json::from_str(r#"{"pattern": "x", "pacing": "requests_only"}"#).unwrap();
        assert_eq!(config.pacing, PacingMode::RequestsOnly);
    }

    #[test]
    fn test_replayer_display() {
        let replayer = FileReplayer::new(ReplayConfig::new("/tmp/run-*.cap"));
        assert_eq!(replayer.to_string(), "file replay: /tmp/run-*.cap");
        assert!(!replayer.is_active());
    }
}
