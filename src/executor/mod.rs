//! Task execution infrastructure.
//!
//! The executor core: the bounded task queue, the worker population, the
//! future handed back to submitters, and the shutdown protocol.

pub mod future;
pub mod pool;
pub mod task;

mod worker;

pub use future::TaskFuture;
pub use pool::ThreadPoolExecutor;
pub use task::Task;
