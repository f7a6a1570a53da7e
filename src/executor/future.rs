//! Single-completion handle to a submitted task's outcome.

use crate::error::{Error, Result};
use crate::scope::CancelScope;
use crate::telemetry::Metrics;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle through which a submitter observes completion, reads the outcome,
/// applies read timeouts, or requests cancellation.
///
/// A future completes exactly once, whether by the executing worker, the
/// rejection handler, or forced shutdown. After completion the outcome is
/// immutable and reads are repeatable.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
    scope: CancelScope,
}

struct Shared<T> {
    outcome: Mutex<Option<Result<T>>>,
    done: Condvar,
    completed: AtomicBool,
    metrics: Option<Arc<Metrics>>,
}

impl<T> TaskFuture<T> {
    pub(crate) fn new(scope: CancelScope, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: Mutex::new(None),
                done: Condvar::new(),
                completed: AtomicBool::new(false),
                metrics,
            }),
            scope,
        }
    }

    pub(crate) fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Non-blocking probe of the done signal.
    pub fn is_done(&self) -> bool {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Signal cancellation on the future's scope. Tasks that consult the
    /// scope observe it; tasks that ignore it run to completion and their
    /// outcome is still recorded. The outcome slot is not written here.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    /// Install the outcome and fire the done signal. Only the first caller
    /// wins; later calls are no-ops.
    pub(crate) fn complete(&self, outcome: Result<T>) {
        let mut slot = self.shared.outcome.lock();
        if slot.is_some() {
            return;
        }
        *slot = Some(outcome);
        self.shared.completed.store(true, Ordering::Release);
        self.shared.done.notify_all();
    }
}

impl<T: Clone> TaskFuture<T> {
    /// Block until completion and return the outcome.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.shared.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.shared.done.wait(&mut slot);
        }
    }

    /// Block up to `timeout` for completion. Expiry returns a timeout error
    /// and leaves the task untouched; a later [`get`](Self::get) observes
    /// the eventual outcome.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            let now = Instant::now();
            if now >= deadline {
                drop(slot);
                if let Some(metrics) = &self.shared.metrics {
                    metrics.inc_timed_out();
                }
                return Err(Error::Timeout);
            }
            self.shared.done.wait_for(&mut slot, deadline - now);
        }
    }
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn future<T>() -> TaskFuture<T> {
        TaskFuture::new(CancelScope::root(), None)
    }

    #[test]
    fn test_complete_then_get() {
        let f = future();
        assert!(!f.is_done());

        f.complete(Ok("hello"));

        assert!(f.is_done());
        assert_eq!(f.get().unwrap(), "hello");
        // reads are repeatable
        assert_eq!(f.get().unwrap(), "hello");
    }

    #[test]
    fn test_first_completion_wins() {
        let f = future();
        f.complete(Ok(1));
        f.complete(Ok(2));
        f.complete(Err(Error::Rejected));

        assert_eq!(f.get().unwrap(), 1);
    }

    #[test]
    fn test_get_blocks_until_completion() {
        let f = future();
        let reader = f.clone();

        let handle = thread::spawn(move || reader.get());
        thread::sleep(Duration::from_millis(20));
        f.complete(Ok(42));

        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_get_timeout_expires() {
        let f: TaskFuture<i32> = future();
        let err = f.get_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(!f.is_done());
    }

    #[test]
    fn test_get_timeout_then_get_sees_outcome() {
        let f = future();
        assert!(f.get_timeout(Duration::from_millis(10)).is_err());

        f.complete(Ok("late"));
        assert_eq!(f.get().unwrap(), "late");
        assert_eq!(f.get_timeout(Duration::from_millis(1)).unwrap(), "late");
    }

    #[test]
    fn test_cancel_signals_scope_without_completing() {
        let f: TaskFuture<i32> = future();
        f.cancel();

        assert!(f.scope().is_cancelled());
        assert!(!f.is_done());
    }

    #[test]
    fn test_concurrent_completers_single_winner() {
        let f = future();
        let mut handles = Vec::new();
        for i in 0..8 {
            let f = f.clone();
            handles.push(thread::spawn(move || f.complete(Ok(i))));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let winner = f.get().unwrap();
        for _ in 0..4 {
            assert_eq!(f.get().unwrap(), winner);
        }
    }
}
