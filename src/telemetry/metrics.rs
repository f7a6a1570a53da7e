//! Lock-free counters and gauges for operational visibility.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Executor counters and gauges, updated without locks.
///
/// Monotone counters use atomic adds; the execution-time extrema use CAS
/// loops; gauges use atomic stores. A [`snapshot`](Metrics::snapshot) is a
/// set of independent atomic loads, so fields may be read at slightly
/// different instants: cross-field consistency is traded for a
/// contention-free hot path.
#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_timed_out: AtomicU64,
    tasks_panicked: AtomicU64,

    total_execution_ns: AtomicU64,
    min_execution_ns: AtomicU64,
    max_execution_ns: AtomicU64,

    active_workers: AtomicUsize,
    core_workers: AtomicUsize,
    max_workers: AtomicUsize,
    queue_len: AtomicUsize,
    queue_capacity: AtomicUsize,

    start_time: Instant,
}

impl Metrics {
    /// Fresh metrics; the minimum extremum starts at `u64::MAX` so the
    /// first recorded duration always wins the CAS.
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_timed_out: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            total_execution_ns: AtomicU64::new(0),
            min_execution_ns: AtomicU64::new(u64::MAX),
            max_execution_ns: AtomicU64::new(0),
            active_workers: AtomicUsize::new(0),
            core_workers: AtomicUsize::new(0),
            max_workers: AtomicUsize::new(0),
            queue_len: AtomicUsize::new(0),
            queue_capacity: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count a successfully enqueued submission.
    pub fn inc_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a task that returned a value.
    pub fn inc_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a task that returned an error.
    pub fn inc_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an expired bounded wait on a future.
    pub fn inc_timed_out(&self) {
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a task that panicked.
    pub fn inc_panicked(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one execution's wall-clock time into the total and the min/max
    /// extrema. Called for every wrapper a worker processes.
    pub fn record_execution(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos() as u64;
        self.total_execution_ns.fetch_add(nanos, Ordering::Relaxed);

        let mut current = self.min_execution_ns.load(Ordering::Relaxed);
        while nanos < current {
            match self.min_execution_ns.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let mut current = self.max_execution_ns.load(Ordering::Relaxed);
        while nanos > current {
            match self.max_execution_ns.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Set the active-worker gauge.
    pub fn set_active_workers(&self, count: usize) {
        self.active_workers.store(count, Ordering::Relaxed);
    }

    /// Set the core-worker gauge.
    pub fn set_core_workers(&self, count: usize) {
        self.core_workers.store(count, Ordering::Relaxed);
    }

    /// Set the worker-ceiling gauge.
    pub fn set_max_workers(&self, count: usize) {
        self.max_workers.store(count, Ordering::Relaxed);
    }

    /// Set the queue-length gauge.
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Set the queue-capacity gauge.
    pub fn set_queue_capacity(&self, capacity: usize) {
        self.queue_capacity.store(capacity, Ordering::Relaxed);
    }

    /// Capture every field under a single timestamp.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            total_execution_ns: self.total_execution_ns.load(Ordering::Relaxed),
            min_execution_ns: self.min_execution_ns.load(Ordering::Relaxed),
            max_execution_ns: self.max_execution_ns.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            core_workers: self.core_workers.load(Ordering::Relaxed),
            max_workers: self.max_workers.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            queue_capacity: self.queue_capacity.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`Metrics`] with derived ratios.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken.
    pub timestamp: Instant,
    /// Time since the metrics were created.
    pub uptime: Duration,
    /// Successfully enqueued submissions.
    pub tasks_submitted: u64,
    /// Tasks that returned a value.
    pub tasks_completed: u64,
    /// Tasks that returned an error.
    pub tasks_failed: u64,
    /// Expired bounded waits on futures.
    pub tasks_timed_out: u64,
    /// Tasks that panicked.
    pub tasks_panicked: u64,
    /// Total execution wall-clock nanoseconds.
    pub total_execution_ns: u64,
    /// Shortest observed execution; `u64::MAX` until something runs.
    pub min_execution_ns: u64,
    /// Longest observed execution.
    pub max_execution_ns: u64,
    /// Worker count at sampling time.
    pub active_workers: usize,
    /// Configured core worker count.
    pub core_workers: usize,
    /// Configured worker ceiling.
    pub max_workers: usize,
    /// Queue length at sampling time.
    pub queue_len: usize,
    /// Configured queue capacity.
    pub queue_capacity: usize,
}

impl MetricsSnapshot {
    /// Mean execution time, zero when nothing has completed.
    pub fn avg_execution_time(&self) -> Duration {
        if self.tasks_completed == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_execution_ns / self.tasks_completed)
    }

    /// Completed tasks per second of uptime, zero at zero uptime.
    pub fn throughput(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_completed as f64 / seconds
    }

    /// Completed over submitted, zero when nothing was submitted.
    pub fn success_rate(&self) -> f64 {
        if self.tasks_submitted == 0 {
            return 0.0;
        }
        self.tasks_completed as f64 / self.tasks_submitted as f64
    }

    /// Queue length over capacity, zero for a zero-capacity queue.
    pub fn queue_utilization(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        self.queue_len as f64 / self.queue_capacity as f64
    }

    /// Active workers over the ceiling, zero when the ceiling is zero.
    pub fn worker_utilization(&self) -> f64 {
        if self.max_workers == 0 {
            return 0.0;
        }
        self.active_workers as f64 / self.max_workers as f64
    }
}
