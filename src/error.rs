//! Error types for the surgepool executor.

/// Result type alias for surgepool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the executor, its futures, and its tasks.
///
/// The enum is `Clone` because a future's outcome stays readable after the
/// first `get`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Submission attempted after shutdown began, or the wrapper was
    /// drained by `shutdown_now`.
    #[error("executor has been shut down")]
    Shutdown,

    /// Queue saturated and the rejection policy declined to run the task.
    #[error("task rejected by executor")]
    Rejected,

    /// A bounded wait expired, or a scope deadline passed.
    #[error("task timed out")]
    Timeout,

    /// The task's cancellation scope was cancelled.
    #[error("task cancelled")]
    Cancelled,

    /// The task terminated abnormally; carries the captured panic payload.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Domain error returned by the task itself.
    #[error("task failed: {0}")]
    Task(String),

    /// Executor infrastructure failure (e.g. worker thread spawn).
    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Create a task error
    pub fn task<S: Into<String>>(msg: S) -> Self {
        Error::Task(msg.into())
    }

    /// Create an executor error
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    /// Create a panic error from a captured payload description
    pub fn panicked<S: Into<String>>(msg: S) -> Self {
        Error::Panicked(msg.into())
    }
}
