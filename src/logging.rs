//! Leveled logging capability consumed by the executor.
//!
//! The executor takes a [`Logger`] at construction and never reads global
//! state; the process-wide default logger exists only as a convenience for
//! glue code.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Log severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fine-grained diagnostics
    Debug,
    /// Normal operational messages
    Info,
    /// Recoverable anomalies
    Warn,
    /// Failures
    Error,
    /// Unrecoverable failures
    Fatal,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. Unknown names fall back to
    /// `Info`.
    pub fn parse(s: &str) -> LogLevel {
        match s.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }

    fn name(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Narrow logging capability: five level messages, each in a plain and a
/// formatted variant.
///
/// The formatted variants take [`fmt::Arguments`] so implementations can
/// skip rendering entirely when the level is filtered out; call them as
/// `logger.infof(format_args!("started {n} workers"))`.
pub trait Logger: Send + Sync {
    /// Log at debug level.
    fn debug(&self, msg: &str);
    /// Log at info level.
    fn info(&self, msg: &str);
    /// Log at warn level.
    fn warn(&self, msg: &str);
    /// Log at error level.
    fn error(&self, msg: &str);
    /// Log at fatal level.
    fn fatal(&self, msg: &str);

    /// Log a formatted message at debug level.
    fn debugf(&self, args: fmt::Arguments<'_>) {
        self.debug(&args.to_string());
    }
    /// Log a formatted message at info level.
    fn infof(&self, args: fmt::Arguments<'_>) {
        self.info(&args.to_string());
    }
    /// Log a formatted message at warn level.
    fn warnf(&self, args: fmt::Arguments<'_>) {
        self.warn(&args.to_string());
    }
    /// Log a formatted message at error level.
    fn errorf(&self, args: fmt::Arguments<'_>) {
        self.error(&args.to_string());
    }
    /// Log a formatted message at fatal level.
    fn fatalf(&self, args: fmt::Arguments<'_>) {
        self.fatal(&args.to_string());
    }
}

/// Logger that writes `[LEVEL] message` lines to stderr, filtered by a
/// runtime-adjustable minimum level.
#[derive(Debug)]
pub struct SimpleLogger {
    level: RwLock<LogLevel>,
}

impl SimpleLogger {
    /// Create a logger with the given minimum level.
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: RwLock::new(level),
        }
    }

    /// Adjust the minimum level.
    pub fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= *self.level.read()
    }

    fn write(&self, level: LogLevel, msg: &str) {
        if self.enabled(level) {
            eprintln!("[{}] {}", level.name(), msg);
        }
    }
}

impl Default for SimpleLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl Logger for SimpleLogger {
    fn debug(&self, msg: &str) {
        self.write(LogLevel::Debug, msg);
    }
    fn info(&self, msg: &str) {
        self.write(LogLevel::Info, msg);
    }
    fn warn(&self, msg: &str) {
        self.write(LogLevel::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.write(LogLevel::Error, msg);
    }
    fn fatal(&self, msg: &str) {
        self.write(LogLevel::Fatal, msg);
    }

    fn debugf(&self, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Debug) {
            eprintln!("[DEBUG] {}", args);
        }
    }
    fn infof(&self, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Info) {
            eprintln!("[INFO] {}", args);
        }
    }
    fn warnf(&self, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Warn) {
            eprintln!("[WARN] {}", args);
        }
    }
    fn errorf(&self, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Error) {
            eprintln!("[ERROR] {}", args);
        }
    }
    fn fatalf(&self, args: fmt::Arguments<'_>) {
        if self.enabled(LogLevel::Fatal) {
            eprintln!("[FATAL] {}", args);
        }
    }
}

/// Logger that discards everything. The default when logging is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn debug(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
    fn fatal(&self, _msg: &str) {}

    fn debugf(&self, _args: fmt::Arguments<'_>) {}
    fn infof(&self, _args: fmt::Arguments<'_>) {}
    fn warnf(&self, _args: fmt::Arguments<'_>) {}
    fn errorf(&self, _args: fmt::Arguments<'_>) {}
    fn fatalf(&self, _args: fmt::Arguments<'_>) {}
}

// Process-wide default logger for glue code
static DEFAULT_LOGGER: RwLock<Option<Arc<dyn Logger>>> = RwLock::new(None);

/// Replace the process-wide default logger. Intended to be called once
/// during startup.
pub fn set_default_logger(logger: Arc<dyn Logger>) {
    *DEFAULT_LOGGER.write() = Some(logger);
}

/// The process-wide default logger; a [`NopLogger`] until one is set.
pub fn default_logger() -> Arc<dyn Logger> {
    DEFAULT_LOGGER
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NopLogger))
}

/// Log at debug level via the default logger.
pub fn debug(msg: &str) {
    default_logger().debug(msg);
}

/// Log at info level via the default logger.
pub fn info(msg: &str) {
    default_logger().info(msg);
}

/// Log at warn level via the default logger.
pub fn warn(msg: &str) {
    default_logger().warn(msg);
}

/// Log at error level via the default logger.
pub fn error(msg: &str) {
    default_logger().error(msg);
}

/// Log at fatal level via the default logger.
pub fn fatal(msg: &str) {
    default_logger().fatal(msg);
}

/// Log a formatted message at debug level via the default logger.
pub fn debugf(args: fmt::Arguments<'_>) {
    default_logger().debugf(args);
}

/// Log a formatted message at info level via the default logger.
pub fn infof(args: fmt::Arguments<'_>) {
    default_logger().infof(args);
}

/// Log a formatted message at warn level via the default logger.
pub fn warnf(args: fmt::Arguments<'_>) {
    default_logger().warnf(args);
}

/// Log a formatted message at error level via the default logger.
pub fn errorf(args: fmt::Arguments<'_>) {
    default_logger().errorf(args);
}

/// Log a formatted message at fatal level via the default logger.
pub fn fatalf(args: fmt::Arguments<'_>) {
    default_logger().fatalf(args);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("Warn"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("fatal"), LogLevel::Fatal);
    }

    #[test]
    fn test_parse_unknown_falls_back_to_info() {
        assert_eq!(LogLevel::parse(""), LogLevel::Info);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
        assert_eq!(LogLevel::parse("trace"), LogLevel::Info);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_simple_logger_filtering() {
        let logger = SimpleLogger::new(LogLevel::Warn);
        assert!(!logger.enabled(LogLevel::Debug));
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Warn));
        assert!(logger.enabled(LogLevel::Fatal));

        logger.set_level(LogLevel::Debug);
        assert!(logger.enabled(LogLevel::Debug));
    }

    #[test]
    fn test_nop_logger_accepts_everything() {
        let logger = NopLogger;
        logger.info("nothing happens");
        logger.errorf(format_args!("still nothing: {}", 42));
    }
}
