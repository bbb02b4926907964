use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks scan progress across all workers
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    batches: Arc<AtomicU64>,
    candidates: Arc<AtomicU64>,
    records_skipped: Arc<AtomicU64>,
    bytes_covered: Arc<AtomicU64>,
    partitions_completed: Arc<AtomicU64>,
}

/// Counters a worker accumulates locally and flushes once.
///
/// Updating the shared atomics per batch would put every worker on the same cache
/// lines in the hot loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub batches: u64,
    pub candidates: u64,
    pub records_skipped: u64,
    pub bytes_covered: u64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(AtomicU64::new(0)),
            candidates: Arc::new(AtomicU64::new(0)),
            records_skipped: Arc::new(AtomicU64::new(0)),
            bytes_covered: Arc::new(AtomicU64::new(0)),
            partitions_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds a worker's tally; `completed` is false when the worker stopped early
    pub fn record_partition(&self, partition: usize, tally: &WorkerTally, completed: bool) {
        self.batches.fetch_add(tally.batches, Ordering::Relaxed);
        self.candidates.fetch_add(tally.candidates, Ordering::Relaxed);
        self.records_skipped
            .fetch_add(tally.records_skipped, Ordering::Relaxed);
        self.bytes_covered
            .fetch_add(tally.bytes_covered, Ordering::Relaxed);
        if completed {
            self.partitions_completed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            "Partition {}: {} batches, {} candidates, {} records skipped{}",
            partition,
            tally.batches,
            tally.candidates,
            tally.records_skipped,
            if completed { "" } else { " (cancelled)" }
        );
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            batches: self.batches.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            bytes_covered: self.bytes_covered.load(Ordering::Relaxed),
            partitions_completed: self.partitions_completed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Batches evaluated: {}\n\
             Candidates evaluated: {}\n\
             Records skipped: {}\n\
             Bytes covered: {}\n\
             Partitions completed: {}",
            stats.batches,
            stats.candidates,
            stats.records_skipped,
            stats.bytes_covered,
            stats.partitions_completed
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub batches: u64,
    pub candidates: u64,
    pub records_skipped: u64,
    pub bytes_covered: u64,
    pub partitions_completed: u64,
}
