//! Stress tests for Rotalog.
//!
//! These tests drive many writes through shared writers and check that the
//! rotation state still agrees with what the store holds.

use crate::fixtures::padded_fields;
use rotalog_core::{CoreError, RotatingWriter, SegmentStore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Records written.
    pub written: usize,
    /// Writes rejected with a state conflict and retried.
    pub conflicts: usize,
    /// Writes that failed for any other reason.
    pub failed: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Writes per second, retries excluded.
    pub fn writes_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.written as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Written: {}", self.written);
        println!("Conflicts retried: {}", self.conflicts);
        println!("Failed: {}", self.failed);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} writes/sec", self.writes_per_second());
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Records each thread writes.
    pub records_per_thread: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Encoded size of each record in bytes.
    pub record_size: u64,
    /// Attempts per record before giving up on conflicts.
    pub max_attempts: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            records_per_thread: 250,
            threads: 4,
            record_size: 300,
            max_attempts: 1000,
        }
    }
}

/// Writes `config.records_per_thread` records through one writer, retrying
/// conflicts.
fn write_with_retry<S: SegmentStore>(
    writer: &RotatingWriter<S>,
    config: &StressConfig,
) -> (usize, usize, usize) {
    let fields = padded_fields(config.record_size);
    let (mut written, mut conflicts, mut failed) = (0, 0, 0);
    for _ in 0..config.records_per_thread {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match writer.write(fields.clone()) {
                Ok(_) => {
                    written += 1;
                    break;
                }
                Err(CoreError::StateConflict { .. }) => {
                    conflicts += 1;
                    if attempts >= config.max_attempts {
                        failed += 1;
                        break;
                    }
                }
                Err(_) => {
                    failed += 1;
                    break;
                }
            }
        }
    }
    (written, conflicts, failed)
}

/// Runs `config.threads` threads that all write through the same writer.
pub fn stress_shared_writer<S>(
    writer: Arc<RotatingWriter<S>>,
    config: &StressConfig,
) -> StressTestResult
where
    S: SegmentStore + 'static,
{
    let writers = (0..config.threads).map(|_| Arc::clone(&writer)).collect();
    stress_writers(writers, config)
}

/// Runs one thread per writer. Writers opened on the same tag race each
/// other through the store's version check.
pub fn stress_writers<S>(
    writers: Vec<Arc<RotatingWriter<S>>>,
    config: &StressConfig,
) -> StressTestResult
where
    S: SegmentStore + 'static,
{
    let start = Instant::now();
    let handles: Vec<_> = writers
        .into_iter()
        .map(|writer| {
            let config = config.clone();
            thread::spawn(move || write_with_retry(&writer, &config))
        })
        .collect();

    let mut result = StressTestResult {
        written: 0,
        conflicts: 0,
        failed: 0,
        duration: Duration::ZERO,
    };
    for handle in handles {
        let (written, conflicts, failed) = handle.join().expect("Writer thread panicked");
        result.written += written;
        result.conflicts += conflicts;
        result.failed += failed;
    }
    result.duration = start.elapsed();
    result
}
