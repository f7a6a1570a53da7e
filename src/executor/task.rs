//! Task capability and the wrapper that crosses the queue.

use super::future::TaskFuture;
use crate::error::Result;
use crate::scope::CancelScope;
use std::fmt;

/// A unit of work with a single run operation.
///
/// `run` consumes the task; boxing keeps undispatched tasks returned by
/// [`shutdown_now`](crate::ThreadPoolExecutor::shutdown_now) runnable. The
/// scope argument is the submission's child cancellation scope; cooperative
/// tasks consult it, others are free to ignore it.
pub trait Task<T>: Send {
    /// Execute the work, observing `scope` for cancellation.
    fn run(self: Box<Self>, scope: &CancelScope) -> Result<T>;
}

// Any callable of the right shape is a task.
impl<T, F> Task<T> for F
where
    F: FnOnce(&CancelScope) -> Result<T> + Send,
{
    fn run(self: Box<Self>, scope: &CancelScope) -> Result<T> {
        (*self)(scope)
    }
}

/// Internal pairing of a task with its future; the only element type in the
/// queue.
pub(crate) struct TaskWrapper<T> {
    pub(crate) task: Box<dyn Task<T>>,
    pub(crate) future: TaskFuture<T>,
}

impl<T> fmt::Debug for TaskWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWrapper")
            .field("future", &self.future)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_closure_is_a_task() {
        let task = |_scope: &CancelScope| Ok(7);
        let boxed: Box<dyn Task<i32>> = Box::new(task);
        assert_eq!(boxed.run(&CancelScope::root()).unwrap(), 7);
    }

    #[test]
    fn test_task_error_propagates_verbatim() {
        let task = |_scope: &CancelScope| -> Result<i32> { Err(Error::task("no input")) };
        let result = Box::new(task).run(&CancelScope::root());
        assert!(matches!(result, Err(Error::Task(msg)) if msg == "no input"));
    }
}
