//! Buffered capture log with a hybrid time/size flush policy
//!
//! Flushing on every byte is too slow for the medium; never flushing loses
//! everything on power loss. The log is made durable when more than a
//! second has passed since the last flush or when 512 records have piled
//! up, whichever comes first.

use tracing::{debug, trace};

use super::record::ByteRecord;
use crate::config::{FLUSH_BYTE_COUNT, FLUSH_INTERVAL_MS};
use crate::error::StorageError;
use crate::hal::LogFile;

/// When to force buffered records onto the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub interval_ms: u64,
    pub byte_count: u32,
}

impl FlushPolicy {
    pub fn due(&self, since_flush_ms: u64, pending: u32) -> bool {
        since_flush_ms > self.interval_ms || pending >= self.byte_count
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            interval_ms: FLUSH_INTERVAL_MS,
            byte_count: FLUSH_BYTE_COUNT,
        }
    }
}

/// Totals reported when a session log closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub records: u64,
    pub flushes: u64,
}

/// The open log of the active capture session
pub struct SessionLog<F: LogFile> {
    file: F,
    policy: FlushPolicy,
    last_flush_ms: u64,
    pending: u32,
    records: u64,
    flushes: u64,
}

impl<F: LogFile> SessionLog<F> {
    pub fn new(file: F, policy: FlushPolicy, now_ms: u64) -> Self {
        Self {
            file,
            policy,
            last_flush_ms: now_ms,
            pending: 0,
            records: 0,
            flushes: 0,
        }
    }

    /// Write one record and flush if the policy says so.
    /// Returns whether a flush happened.
    pub fn append(&mut self, record: &ByteRecord, now_ms: u64) -> Result<bool, StorageError> {
        let line = record.to_string();
        trace!("{}", line);
        self.file.write_line(&line)?;
        self.pending += 1;
        self.records += 1;

        if self
            .policy
            .due(now_ms.saturating_sub(self.last_flush_ms), self.pending)
        {
            self.flush(now_ms)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Flush lingering records once the interval has elapsed with no traffic
    pub fn tick(&mut self, now_ms: u64) -> Result<bool, StorageError> {
        if self.pending > 0 && now_ms.saturating_sub(self.last_flush_ms) > self.policy.interval_ms {
            self.flush(now_ms)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn flush(&mut self, now_ms: u64) -> Result<(), StorageError> {
        self.file.flush()?;
        debug!("Flushed {} records", self.pending);
        self.last_flush_ms = now_ms;
        self.pending = 0;
        self.flushes += 1;
        Ok(())
    }

    /// Flush whatever is pending and release the file
    pub fn close(self) -> Result<LogSummary, StorageError> {
        let summary = LogSummary {
            records: self.records,
            flushes: self.flushes,
        };
        self.file.close()?;
        Ok(summary)
    }
}
