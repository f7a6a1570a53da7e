//! Convenience re-exports for typical usage.
//!
//! ```
//! use surgepool::prelude::*;
//! ```

pub use crate::config::{Config, ConfigBuilder, RejectPolicy};
pub use crate::error::{Error, Result};
pub use crate::executor::{Task, TaskFuture, ThreadPoolExecutor};
pub use crate::logging::{LogLevel, Logger};
pub use crate::scope::CancelScope;
pub use crate::telemetry::{Metrics, MetricsSnapshot};
