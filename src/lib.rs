//! surgepool - bounded, elastic worker-pool task executor
//!
//! Tasks are scheduled onto a managed set of worker threads; excess work
//! buffers in a bounded FIFO queue, and every submission returns a
//! [`TaskFuture`] for observing completion, reading the result, applying
//! read timeouts, or requesting cancellation.
//!
//! # Quick Start
//!
//! ```no_run
//! use surgepool::prelude::*;
//!
//! let pool = ThreadPoolExecutor::new(Config::default()).unwrap();
//!
//! let future = pool
//!     .submit_callable(|_scope| Ok::<_, Error>(21 * 2))
//!     .unwrap();
//!
//! assert_eq!(future.get().unwrap(), 42);
//!
//! pool.shutdown();
//! ```
//!
//! # Features
//!
//! - **Elastic workers**: a resident core set, plus surge workers started
//!   on backlog and reaped after an idle interval
//! - **Backpressure**: a bounded FIFO queue with pluggable rejection
//!   policies (abort, caller-runs, discard)
//! - **Futures**: blocking, bounded, and non-blocking reads; external
//!   cancellation through per-submission scopes
//! - **Fault isolation**: a panicking task never takes its worker down
//! - **Two-phase shutdown**: graceful drain or immediate with undispatched
//!   task recovery
//! - **Metrics**: lock-free counters with monotonic extrema and snapshot
//!   rates

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod prelude;
pub mod scope;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, RejectPolicy};
pub use error::{Error, Result};
pub use executor::{Task, TaskFuture, ThreadPoolExecutor};
pub use logging::{LogLevel, Logger, NopLogger, SimpleLogger};
pub use scope::CancelScope;
pub use telemetry::{Metrics, MetricsSnapshot};
