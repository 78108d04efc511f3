//! Sequential reader for a single capture file
//!
//! Wraps one capture file (optionally gzip-compressed, detected from the
//! `.gz` filename suffix), applies the framing codec incrementally, and
//! holds the next not-yet-emitted record. The reader pulls ahead by one:
//! immediately after `open` it already carries a pending record, so the
//! merge step across readers only ever compares already-parsed records.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, error};

use crate::error::{ReplayError, Result};
use crate::replay::codec::{self, Record};

/// Per-file sequential decoder and its open-handle lifecycle
pub struct FileReader {
    path: PathBuf,
    stream: Option<BufReader<Box<dyn Read + Send>>>,
    /// Scan buffer accumulating the current record's bytes; reused across
    /// records, which is why the codec copies the body out on decode
    scratch: Vec<u8>,
    line: Vec<u8>,
    pending: Option<Record>,
}

impl FileReader {
    /// Open a capture file and pull its first record.
    ///
    /// Fails with [`ReplayError::Unreadable`] if the file cannot be opened
    /// or, for `.gz` files, if the gzip header is invalid (flate2 surfaces
    /// that on the first read, which the initial pull performs).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| ReplayError::unreadable(path.display(), e))?;

        let source: Box<dyn Read + Send> =
            if path.extension().map(|ext| ext == "gz").unwrap_or(false) {
                Box::new(GzDecoder::new(file))
            } else {
                Box::new(file)
            };

        let mut reader = Self {
            path,
            stream: Some(BufReader::new(source)),
            scratch: Vec::new(),
            line: Vec::new(),
            pending: None,
        };

        if let Err(e) = reader.fill_pending() {
            return Err(ReplayError::unreadable(reader.path.display(), e));
        }

        Ok(reader)
    }

    /// Path of the underlying capture file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next not-yet-emitted record, if any
    pub fn pending(&self) -> Option<&Record> {
        self.pending.as_ref()
    }

    /// Timestamp of the pending record
    pub fn timestamp(&self) -> Option<i64> {
        self.pending.as_ref().map(|r| r.timestamp)
    }

    /// True once the stream has ended and no record is left to emit
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_none() && self.stream.is_none()
    }

    /// Hand the pending record to the caller, leaving the slot empty until
    /// the next [`advance`](Self::advance)
    pub fn take_pending(&mut self) -> Option<Record> {
        self.pending.take()
    }

    /// Read forward to the next complete record.
    ///
    /// On end-of-stream the file handle is dropped and the reader becomes
    /// exhausted; a truncated final record (data after the last separator)
    /// is discarded, not emitted. An I/O error mid-file is logged and the
    /// reader is excluded from further replay; it never propagates to
    /// sibling readers.
    pub fn advance(&mut self) {
        if let Err(e) = self.fill_pending() {
            error!(
                path = %self.path.display(),
                error = %e,
                "read failed, dropping file from replay"
            );
            self.close();
        }
    }

    /// Release the file handle; the pending record (if any) stays readable
    pub fn close(&mut self) {
        self.stream = None;
    }

    fn fill_pending(&mut self) -> std::io::Result<()> {
        self.pending = None;
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        self.scratch.clear();
        loop {
            self.line.clear();
            let n = stream.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                if !self.scratch.is_empty() {
                    debug!(
                        path = %self.path.display(),
                        bytes = self.scratch.len(),
                        "discarding truncated record at end of capture file"
                    );
                }
                self.stream = None;
                return Ok(());
            }

            if self.line == codec::separator_line() {
                // The last accumulated byte is the newline that introduces
                // the separator; it is framing, not body.
                let end = self.scratch.len().saturating_sub(1);
                self.pending = Some(codec::decode(&self.scratch[..end]));
                return Ok(());
            }

            self.scratch.extend_from_slice(&self.line);
        }
    }
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("path", &self.path)
            .field("open", &self.stream.is_some())
            .field("pending_timestamp", &self.timestamp())
            .finish()
    }
}
