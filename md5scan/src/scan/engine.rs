use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::boundary::RecordCursor;
use super::partition::{partition, Partition};
use super::window::WindowBuilder;
use crate::config::ScanConfig;
use crate::corpus::Corpus;
use crate::errors::{ScanError, ScanResult};
use crate::kernel::Kernel;
use crate::metrics::{ScanMetrics, WorkerTally};
use crate::results::{Match, ScanOutcome, ScanReport};
use crate::target::TargetDigest;

/// State shared by all workers of one scan. Everything but the cancel flag and the
/// metrics counters is read-only.
struct ScanContext<'a> {
    data: &'a [u8],
    target: &'a TargetDigest,
    windows: WindowBuilder,
    kernel: Kernel,
    cancel: AtomicBool,
    metrics: ScanMetrics,
}

impl<'a> ScanContext<'a> {
    fn new(data: &'a [u8], target: &'a TargetDigest, windows: WindowBuilder, kernel: Kernel) -> Self {
        Self {
            data,
            target,
            windows,
            kernel,
            cancel: AtomicBool::new(false),
            metrics: ScanMetrics::new(),
        }
    }

    /// Scans one partition; returns the lowest matching offset in it
    fn scan_partition(&self, partition: &Partition) -> Option<Match> {
        let len = self.windows.substring_len();
        let mut cursor = RecordCursor::new(self.data, partition.start, partition.read_end, len);
        let mut block = self.windows.empty_block();
        let mut tally = WorkerTally::default();
        let mut offset = partition.start;
        let mut found = None;

        while offset < partition.end {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            let valid = cursor.valid_lanes(offset, partition.end);
            if valid != 0 {
                self.windows.fill(&mut block, self.data, offset);
                let hits = self.kernel.match_mask(&block, self.target) & valid;
                tally.batches += 1;
                tally.candidates += u64::from(valid.count_ones());

                if hits != 0 {
                    let lane = hits.trailing_zeros() as usize;
                    let at = offset + lane;
                    self.cancel.store(true, Ordering::Relaxed);
                    found = Some(Match {
                        offset: at,
                        partition: partition.index,
                        lane,
                        bytes: self.data[at..at + len].to_vec(),
                    });
                    break;
                }
            }

            offset = cursor.advance(offset);
        }

        let stopped = offset.min(partition.end);
        tally.records_skipped = cursor.records_skipped();
        tally.bytes_covered = (stopped - partition.start) as u64;
        self.metrics.record_partition(
            partition.index,
            &tally,
            found.is_none() && stopped == partition.end,
        );
        found
    }
}

/// Runs searches with a fixed configuration and kernel backend
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
    kernel: Kernel,
}

impl Scanner {
    /// Validates `config` and picks the fastest supported kernel
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kernel: Kernel::detect(),
        })
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Searches every record-internal substring of `corpus` for one hashing to `target`.
    ///
    /// Each worker of a dedicated pool scans one partition. The first worker to find a
    /// match raises the cancel flag and the others stop at their next batch. When the
    /// target occurs more than once, which occurrence is reported depends on timing.
    pub fn scan(&self, corpus: &Corpus, target: &TargetDigest) -> ScanResult<ScanReport> {
        let started = Instant::now();
        let len = self.config.substring_len;
        let threads = self.config.thread_count;
        let windows = WindowBuilder::new(len)?;

        if let Some(manifest) = corpus.manifest() {
            if !manifest.covers_substring_len(len) {
                warn!(
                    "Corpus was built for substrings of {} bytes; lines shorter than that were dropped and cannot match at {}",
                    manifest.substring_len, len
                );
            }
        }

        info!(
            "Scanning {} bytes for {} (L = {}, {} threads, {} kernel)",
            corpus.len(),
            target,
            len,
            threads,
            self.kernel.backend()
        );

        let partitions = partition(corpus.len(), threads, len);
        for p in &partitions {
            debug!(
                "Partition {}: offsets {}..{}, reads up to {}",
                p.index, p.start, p.end, p.read_end
            );
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("md5scan-worker-{}", i))
            .build()
            .map_err(|e| ScanError::thread_pool(e.to_string()))?;

        let ctx = ScanContext::new(corpus.data(), target, windows, self.kernel);
        let found = pool.install(|| {
            partitions
                .par_iter()
                .with_max_len(1)
                .find_map_any(|p| ctx.scan_partition(p))
        });

        ctx.metrics.log_stats();
        let outcome = match found {
            Some(m) => {
                info!(
                    "Match at offset {} (partition {}, lane {})",
                    m.offset, m.partition, m.lane
                );
                ScanOutcome::Found(m)
            }
            None => {
                info!("Corpus exhausted without a match");
                ScanOutcome::NotFound
            }
        };

        Ok(ScanReport {
            outcome,
            stats: ctx.metrics.get_stats(),
            elapsed: started.elapsed(),
            backend: self.kernel.backend(),
            threads,
        })
    }
}

/// Validates `config` and scans `corpus` with the detected kernel
pub fn scan(corpus: &Corpus, target: &TargetDigest, config: &ScanConfig) -> ScanResult<ScanReport> {
    Scanner::new(config.clone())?.scan(corpus, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(substring_len: usize, thread_count: usize) -> ScanConfig {
        ScanConfig {
            substring_len,
            thread_count,
            ..ScanConfig::default()
        }
    }

    fn target_of(bytes: &[u8]) -> TargetDigest {
        TargetDigest::from_bytes(md5::compute(bytes).0)
    }

    #[test]
    fn test_finds_substring() {
        let corpus = Corpus::from_records([
            "It was the best of times, it was the worst of times",
            "it was the age of wisdom, it was the age of foolishness",
        ]);
        let target = target_of(b"age of wisdom, it w");
        let report = scan(&corpus, &target, &config(19, 2)).unwrap();

        let m = report.outcome.as_match().unwrap();
        assert_eq!(m.bytes, b"age of wisdom, it w");
        assert_eq!(&corpus.data()[m.offset..m.offset + 19], m.bytes.as_slice());
    }

    #[test]
    fn test_stats_cover_every_candidate() {
        let corpus = Corpus::from_records(["a".repeat(40), "b".repeat(5), "c".repeat(19)]);
        let report = scan(&corpus, &target_of(b""), &config(19, 1)).unwrap();

        assert_eq!(report.outcome, ScanOutcome::NotFound);
        assert_eq!(report.stats.candidates, (40 - 19 + 1) + 1);
        assert_eq!(report.stats.records_skipped, 1);
        assert_eq!(report.stats.partitions_completed, 1);
        assert_eq!(report.stats.bytes_covered, corpus.len() as u64);
        assert_eq!(report.threads, 1);
    }

    #[test]
    fn test_empty_corpus_is_not_found() {
        let corpus = Corpus::from_bytes(Vec::new());
        let report = scan(&corpus, &target_of(b"anything at all here"), &config(20, 4)).unwrap();
        assert!(!report.outcome.is_found());
    }

    #[test]
    fn test_invalid_config_rejected_before_scan() {
        let corpus = Corpus::from_records(["x".repeat(30)]);
        let err = scan(&corpus, &target_of(b""), &config(19, 64)).unwrap_err();
        assert!(err.is_config_error());
        let err = scan(&corpus, &target_of(b""), &config(56, 1)).unwrap_err();
        assert!(err.is_config_error());
    }

    const TIMES: &str = "It was the best of times, it was the worst";

    fn context<'a>(corpus: &'a Corpus, target: &'a TargetDigest) -> ScanContext<'a> {
        let windows = WindowBuilder::new(19).unwrap();
        ScanContext::new(corpus.data(), target, windows, Kernel::detect())
    }

    #[test]
    fn test_cancelled_partition_does_no_work() {
        let corpus = Corpus::from_records([TIMES]);
        let target = target_of(&TIMES.as_bytes()[..19]);
        let ctx = context(&corpus, &target);
        ctx.cancel.store(true, Ordering::Relaxed);

        let parts = partition(corpus.len(), 1, 19);
        assert_eq!(ctx.scan_partition(&parts[0]), None);

        let stats = ctx.metrics.get_stats();
        assert_eq!(stats.batches, 0);
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.partitions_completed, 0);
    }

    #[test]
    fn test_match_stops_other_partitions() {
        let corpus = Corpus::from_records([TIMES, TIMES]);
        let target = target_of(&TIMES.as_bytes()[..19]);
        let parts = partition(corpus.len(), 2, 19);
        assert_eq!((parts[1].start, parts[1].end), (42, 85));

        let ctx = context(&corpus, &target);
        let first = ctx.scan_partition(&parts[0]).unwrap();
        assert_eq!(first.offset, 0);
        assert!(ctx.cancel.load(Ordering::Relaxed));

        let batches = ctx.metrics.get_stats().batches;
        assert_eq!(ctx.scan_partition(&parts[1]), None);
        let stats = ctx.metrics.get_stats();
        assert_eq!(stats.batches, batches);
        assert_eq!(stats.partitions_completed, 0);

        // The second occurrence is still there for a scan that was never cancelled
        let fresh = context(&corpus, &target);
        let second = fresh.scan_partition(&parts[1]).unwrap();
        assert_eq!((second.offset, second.partition), (43, 1));
    }

    #[test]
    fn test_portable_kernel() {
        let corpus = Corpus::from_records(["0123456789abcdefghijklmnopqrstuvwxyz"]);
        let scanner = Scanner::new(config(25, 3)).unwrap().with_kernel(Kernel::portable());
        let report = scanner.scan(&corpus, &target_of(b"bcdefghijklmnopqrstuvwxyz")).unwrap();
        assert_eq!(report.backend, crate::kernel::Backend::Portable);
        assert_eq!(report.outcome.as_match().map(|m| m.offset), Some(11));
    }
}
