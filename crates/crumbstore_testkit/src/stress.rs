//! Stress tests for CrumbStore.
//!
//! These tests verify behavior under heavy load and concurrent writers.

use crumbstore_core::{BreadcrumbStore, NewBreadcrumb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Adds per thread.
    pub operations: usize,
    /// Number of concurrent writers.
    pub threads: usize,
    /// Attributes attached to each breadcrumb.
    pub attributes: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            attributes: 2,
        }
    }
}

fn draft(thread: usize, i: usize, attributes: usize) -> NewBreadcrumb {
    NewBreadcrumb::new(format!("thread {thread} breadcrumb {i}"))
        .attributes((0..attributes).map(|a| (format!("key{a}"), format!("value {thread}-{i}"))))
}

/// Adds `operations` breadcrumbs from the calling thread.
pub fn stress_sequential_adds(store: &BreadcrumbStore, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        if store.add(draft(0, i, config.attributes)) {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Adds `operations` breadcrumbs from each of `threads` threads at once.
pub fn stress_concurrent_adds(
    store: Arc<BreadcrumbStore>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;
            let attributes = config.attributes;

            thread::spawn(move || {
                for i in 0..operations {
                    if store.add(draft(t, i, attributes)) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Adds from writer threads while reader threads snapshot the log.
///
/// Every snapshot must list strictly increasing ids.
pub fn stress_adds_with_readers(
    store: Arc<BreadcrumbStore>,
    config: &StressConfig,
) -> StressTestResult {
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let rounds = config.operations / 10;
            thread::spawn(move || {
                for _ in 0..rounds {
                    let crumbs = store.breadcrumbs();
                    for pair in crumbs.windows(2) {
                        assert!(pair[0].id < pair[1].id, "snapshot out of order");
                    }
                }
            })
        })
        .collect();

    let result = stress_concurrent_adds(store, config);
    for reader in readers {
        reader.join().expect("Reader panicked");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;
    use crumbstore_core::Config;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_adds() {
        let store = TestStore::new();
        let config = StressConfig {
            operations: 500,
            ..Default::default()
        };

        let result = stress_sequential_adds(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 500);
        assert!(store.size_bytes() <= 65536);
    }

    #[test]
    fn test_concurrent_adds_get_unique_ids() {
        let test_store = TestStore::new();
        let store = Arc::new(
            crumbstore_core::BreadcrumbStore::open_at(
                test_store.dir().join("concurrent"),
                Config::default().sync_on_write(false).capacity_bytes(1 << 20),
            )
            .unwrap(),
        );
        let config = StressConfig {
            operations: 100,
            threads: 8,
            attributes: 1,
        };

        let result = stress_concurrent_adds(Arc::clone(&store), &config);
        assert_eq!(result.successful_ops, 800);

        // nothing evicted at this capacity
        let crumbs = store.breadcrumbs();
        assert_eq!(crumbs.len(), 801);
        let ids: HashSet<u64> = crumbs.iter().map(|c| c.id.as_u64()).collect();
        assert_eq!(ids.len(), 801);
        assert_eq!(store.current_id().as_u64(), 801);
    }

    #[test]
    fn test_readers_see_ordered_snapshots() {
        let test_store = TestStore::new();
        let store = Arc::new(
            crumbstore_core::BreadcrumbStore::open_at(
                test_store.dir().join("readers"),
                Config::default().sync_on_write(false),
            )
            .unwrap(),
        );
        let config = StressConfig {
            operations: 200,
            threads: 3,
            attributes: 0,
        };

        let result = stress_adds_with_readers(store, &config);
        assert_eq!(result.failed_ops, 0);
    }
}
