//! Tree-structured cancellation and deadline tokens.
//!
//! Every submission gets its own child scope, so cancelling a future never
//! disturbs the scope the caller submitted under. Cancellation flows from
//! parent to child only.

use crate::error::Error;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Cloneable handle to a cancellation scope.
///
/// A scope is cancelled at most once; the first cancellation installs the
/// reason and wakes all waiters. Deadline scopes cancel themselves with a
/// timeout reason when the deadline passes.
#[derive(Clone)]
pub struct CancelScope {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    reason: Option<Error>,
    children: Vec<Weak<Inner>>,
}

impl CancelScope {
    /// A root scope with no parent and no deadline.
    pub fn root() -> Self {
        Self::make(None, None)
    }

    fn make(deadline: Option<Instant>, reason: Option<Error>) -> Self {
        let cancelled = reason.is_some();
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(cancelled),
                deadline,
                state: Mutex::new(State {
                    reason,
                    children: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Derive a child scope. The child inherits this scope's deadline and
    /// is cancelled when this scope is cancelled; cancelling the child has
    /// no effect on this scope.
    pub fn child(&self) -> CancelScope {
        self.derive(self.inner.deadline)
    }

    /// Derive a child scope that additionally cancels itself with a timeout
    /// reason once `timeout` has elapsed.
    pub fn with_timeout(&self, timeout: Duration) -> CancelScope {
        let deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> CancelScope {
        let mut state = self.inner.state.lock();
        // a parent already cancelled yields an already-cancelled child
        let child = Self::make(deadline, state.reason.clone());
        if state.reason.is_none() {
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Cancel with the standard cancellation reason.
    pub fn cancel(&self) {
        self.cancel_with(Error::Cancelled);
    }

    /// Cancel with an explicit reason. Only the first cancellation takes
    /// effect; it propagates to all derived children.
    pub fn cancel_with(&self, reason: Error) {
        let children = {
            let mut state = self.inner.state.lock();
            if state.reason.is_some() {
                return;
            }
            state.reason = Some(reason.clone());
            self.inner.cancelled.store(true, Ordering::Release);
            self.inner.cond.notify_all();
            std::mem::take(&mut state.children)
        };

        for child in children {
            if let Some(child) = child.upgrade() {
                CancelScope { inner: child }.cancel_with(reason.clone());
            }
        }
    }

    /// Whether the scope's done signal has fired. Checks the deadline, so
    /// an expired deadline scope reports cancelled from here on.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel_with(Error::Timeout);
                true
            }
            _ => false,
        }
    }

    /// The cancellation reason, if the scope has been cancelled.
    pub fn reason(&self) -> Option<Error> {
        if !self.is_cancelled() {
            return None;
        }
        self.inner.state.lock().reason.clone()
    }

    /// Block until the scope is cancelled or `timeout` elapses. Returns
    /// true if the scope was cancelled. Cooperative tasks use this as an
    /// interruptible sleep.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        let mut wake_at = Instant::now() + timeout;
        if let Some(deadline) = self.inner.deadline {
            wake_at = wake_at.min(deadline);
        }

        let mut state = self.inner.state.lock();
        while state.reason.is_none() {
            let now = Instant::now();
            if now >= wake_at {
                drop(state);
                // the deadline may have been what woke us
                return self.is_cancelled();
            }
            self.inner.cond.wait_for(&mut state, wake_at - now);
        }
        true
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("cancelled", &self.inner.cancelled.load(Ordering::Relaxed))
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_scope_not_cancelled() {
        let scope = CancelScope::root();
        assert!(!scope.is_cancelled());
        assert!(scope.reason().is_none());
    }

    #[test]
    fn test_cancel_sets_reason_once() {
        let scope = CancelScope::root();
        scope.cancel();
        assert!(scope.is_cancelled());
        assert!(matches!(scope.reason(), Some(Error::Cancelled)));

        // second cancellation does not overwrite the reason
        scope.cancel_with(Error::Timeout);
        assert!(matches!(scope.reason(), Some(Error::Cancelled)));
    }

    #[test]
    fn test_parent_cancel_propagates_to_child() {
        let parent = CancelScope::root();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_cancel_leaves_parent_alone() {
        let parent = CancelScope::root();
        let child = parent.child();

        child.cancel();

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelScope::root();
        parent.cancel();

        let child = parent.child();
        assert!(child.is_cancelled());
        assert!(matches!(child.reason(), Some(Error::Cancelled)));
    }

    #[test]
    fn test_deadline_reports_timeout() {
        let scope = CancelScope::root().with_timeout(Duration::from_millis(20));
        assert!(!scope.is_cancelled());

        thread::sleep(Duration::from_millis(40));

        assert!(scope.is_cancelled());
        assert!(matches!(scope.reason(), Some(Error::Timeout)));
    }

    #[test]
    fn test_wait_timeout_observes_cancel() {
        let scope = CancelScope::root();
        let waiter = scope.clone();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        scope.cancel();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_timeout_expires_without_cancel() {
        let scope = CancelScope::root();
        assert!(!scope.wait_timeout(Duration::from_millis(20)));
        assert!(!scope.is_cancelled());
    }

    #[test]
    fn test_child_deadline_capped_by_parent() {
        let parent = CancelScope::root().with_timeout(Duration::from_millis(20));
        let child = parent.with_timeout(Duration::from_secs(60));

        thread::sleep(Duration::from_millis(40));

        assert!(child.is_cancelled());
        assert!(matches!(child.reason(), Some(Error::Timeout)));
    }
}
