//! Pipeline counters.
//!
//! Updated from the reader thread and every worker, so each counter is an
//! independent relaxed atomic. A snapshot is not a consistent cut across
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    received: AtomicU64,
    dropped: AtomicU64,
    read_errors: AtomicU64,
    processed: AtomicU64,
    panicked: AtomicU64,
    written: AtomicU64,
    write_errors: AtomicU64,
}

/// Point-in-time copy of `Stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams accepted as requests.
    pub received: u64,
    /// Requests discarded because the queue was full.
    pub dropped: u64,
    /// Failed or rejected reads.
    pub read_errors: u64,
    /// Requests whose processor returned normally.
    pub processed: u64,
    /// Requests whose processor panicked.
    pub panicked: u64,
    /// Responses written successfully.
    pub written: u64,
    /// Responses whose write failed.
    pub write_errors: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = Stats::new();
        stats.record_received();
        stats.record_received();
        stats.record_processed();
        stats.record_write_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.write_errors, 1);
        assert_eq!(snapshot.dropped, 0);
    }
}
