//! Worker loop: multi-way wait, fault barrier, idle reaping.

use super::pool::{PoolShared, SHUTDOWN};
use super::task::TaskWrapper;
use crate::error::{Error, Result};
use crossbeam_channel::select;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

enum Verdict<T> {
    Cancelled,
    Ran(Result<T>),
}

pub(crate) struct Worker<T: Send + 'static> {
    name: String,
    is_core: bool,
    shared: Arc<PoolShared<T>>,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) fn new(name: String, is_core: bool, shared: Arc<PoolShared<T>>) -> Self {
        Self {
            name,
            is_core,
            shared,
        }
    }

    // main loop
    pub(crate) fn run(self) {
        self.shared
            .logger
            .debugf(format_args!("worker {} started", self.name));

        loop {
            select! {
                recv(self.shared.shutdown_rx) -> _ => {
                    self.shared
                        .logger
                        .debugf(format_args!("worker {} received shutdown signal", self.name));
                    // graceful shutdown drains; immediate shutdown leaves the
                    // queue to the shutdown_now caller
                    if self.shared.state() == SHUTDOWN {
                        self.drain();
                    }
                    break;
                }
                recv(self.shared.queue_rx) -> wrapper => match wrapper {
                    Ok(wrapper) => self.execute(wrapper),
                    Err(_) => break,
                },
                default(self.shared.config.keep_alive_time) => {
                    if self.should_reap() {
                        self.shared
                            .logger
                            .debugf(format_args!("worker {} idle timeout, exiting", self.name));
                        break;
                    }
                }
            }
        }

        self.shared.worker_exited(self.is_core);
    }

    fn drain(&self) {
        while let Ok(wrapper) = self.shared.queue_rx.try_recv() {
            self.execute(wrapper);
        }
    }

    // Idle reaping keeps at least core_pool_size workers alive, or none at
    // all when core workers may time out.
    fn should_reap(&self) -> bool {
        if self.is_core && !self.shared.config.allow_core_thread_timeout {
            return false;
        }
        let minimum = if self.shared.config.allow_core_thread_timeout {
            0
        } else {
            self.shared.config.core_pool_size
        };
        self.shared.workers.load(Ordering::Acquire) > minimum
    }

    fn execute(&self, wrapper: TaskWrapper<T>) {
        let start = Instant::now();
        let TaskWrapper { task, future } = wrapper;
        let scope = future.scope().clone();

        // The barrier covers the scope check as well as the task body: a
        // wrapper must never take its worker down with it.
        let verdict = catch_unwind(AssertUnwindSafe(|| {
            if scope.is_cancelled() {
                return Verdict::Cancelled;
            }
            Verdict::Ran(task.run(&scope))
        }));

        match verdict {
            Ok(Verdict::Cancelled) => {
                self.shared
                    .logger
                    .debugf(format_args!("worker {} task cancelled", self.name));
                future.complete(Err(scope.reason().unwrap_or(Error::Cancelled)));
            }
            Ok(Verdict::Ran(Ok(value))) => {
                self.shared.metrics.inc_completed();
                future.complete(Ok(value));
            }
            Ok(Verdict::Ran(Err(err))) => {
                self.shared.metrics.inc_failed();
                self.shared
                    .logger
                    .debugf(format_args!("worker {} task failed: {}", self.name, err));
                future.complete(Err(err));
            }
            Err(payload) => {
                let msg = panic_message(payload);
                self.shared
                    .logger
                    .errorf(format_args!("worker {} task panicked: {}", self.name, msg));
                self.shared.metrics.inc_panicked();
                future.complete(Err(Error::panicked(msg)));
            }
        }

        let elapsed = start.elapsed();
        self.shared.metrics.record_execution(elapsed);
        self.shared.logger.debugf(format_args!(
            "worker {} finished task in {:?}",
            self.name, elapsed
        ));
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_str() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload), "boom");
    }

    #[test]
    fn test_panic_message_string() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom".to_string());
        assert_eq!(panic_message(payload), "kaboom");
    }

    #[test]
    fn test_panic_message_opaque() {
        let payload: Box<dyn Any + Send> = Box::new(100_i32);
        assert_eq!(panic_message(payload), "unknown panic");
    }
}
