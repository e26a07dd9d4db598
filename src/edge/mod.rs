//! Edge timestamp recording
//!
//! The recorder runs at interrupt priority and owns a fixed array of
//! timestamps. The main loop arms it, waits, disarms it and only then
//! reads the snapshot; there is never a window where both sides touch the
//! array.

mod feed;

pub use feed::EdgeFeed;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::EDGE_CAPACITY;

/// Capability interface over the interrupt-driven recorder
pub trait EdgeRecorder {
    /// Reset the count and start recording transitions
    fn arm(&self);

    /// Stop recording; the snapshot becomes readable
    fn disarm(&self);

    /// Edges recorded so far (safe to poll while armed)
    fn edge_count(&self) -> usize;

    /// Recorded timestamps, or `None` while the recorder is armed
    fn snapshot(&self) -> Option<EdgeSnapshot>;
}

impl<T: EdgeRecorder + ?Sized> EdgeRecorder for Arc<T> {
    fn arm(&self) {
        (**self).arm()
    }

    fn disarm(&self) {
        (**self).disarm()
    }

    fn edge_count(&self) -> usize {
        (**self).edge_count()
    }

    fn snapshot(&self) -> Option<EdgeSnapshot> {
        (**self).snapshot()
    }
}

/// Copy of the recorded timestamps taken after disarming
#[derive(Debug, Clone, Copy)]
pub struct EdgeSnapshot {
    times: [u32; EDGE_CAPACITY],
    len: usize,
}

impl EdgeSnapshot {
    /// Build from a slice, keeping at most `EDGE_CAPACITY` entries
    pub fn from_slice(edges: &[u32]) -> Self {
        let len = edges.len().min(EDGE_CAPACITY);
        let mut times = [0u32; EDGE_CAPACITY];
        times[..len].copy_from_slice(&edges[..len]);
        Self { times, len }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.times[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The recorder proper: a fixed ring of wrapping microsecond timestamps.
/// `record` is the interrupt handler body and never blocks or allocates.
pub struct EdgeRing {
    times: [AtomicU32; EDGE_CAPACITY],
    count: AtomicUsize,
    armed: AtomicBool,
}

impl EdgeRing {
    pub fn new() -> Self {
        Self {
            times: std::array::from_fn(|_| AtomicU32::new(0)),
            count: AtomicUsize::new(0),
            armed: AtomicBool::new(false),
        }
    }

    /// Record one transition. Dropped when disarmed or full.
    pub fn record(&self, timestamp_us: u32) {
        if !self.armed.load(Ordering::Acquire) {
            return;
        }
        // Single writer: load/store on the count is enough
        let n = self.count.load(Ordering::Relaxed);
        if n < EDGE_CAPACITY {
            self.times[n].store(timestamp_us, Ordering::Relaxed);
            self.count.store(n + 1, Ordering::Release);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

impl Default for EdgeRing {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeRecorder for EdgeRing {
    fn arm(&self) {
        self.count.store(0, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    fn edge_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Option<EdgeSnapshot> {
        if self.is_armed() {
            return None;
        }
        let len = self.count.load(Ordering::Acquire);
        let mut times = [0u32; EDGE_CAPACITY];
        for (slot, t) in times.iter_mut().zip(&self.times[..len]) {
            *slot = t.load(Ordering::Relaxed);
        }
        Some(EdgeSnapshot { times, len })
    }
}
