use crate::logging::LogLevel;
use std::time::Duration;

/// Behavior when a submission cannot be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectPolicy {
    /// Complete the future with a rejection error and surface the error to
    /// the submitter.
    Abort,
    /// Run the task outside the pool on a helper thread; the submitter is
    /// not blocked and sees no error.
    CallerRuns,
    /// Complete the future with a rejection error but report success to the
    /// submitter; rejection is observed only when reading the future.
    Discard,
}

impl RejectPolicy {
    /// Parse a policy name. Unknown names fall back to `Abort`.
    pub fn parse(s: &str) -> RejectPolicy {
        match s.to_ascii_lowercase().as_str() {
            "abort" => RejectPolicy::Abort,
            "caller_runs" => RejectPolicy::CallerRuns,
            "discard" => RejectPolicy::Discard,
            _ => RejectPolicy::Abort,
        }
    }
}

impl Default for RejectPolicy {
    fn default() -> Self {
        RejectPolicy::Abort
    }
}

/// Executor configuration, immutable for the executor's lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum resident worker count.
    pub core_pool_size: usize,
    /// Absolute worker ceiling.
    pub max_pool_size: usize,
    /// Task queue capacity. Zero means a submission succeeds only when a
    /// worker is waiting on the queue at that instant.
    pub queue_size: usize,
    /// Idle interval after which a surplus worker exits.
    pub keep_alive_time: Duration,
    /// Permit idle reaping of core workers as well.
    pub allow_core_thread_timeout: bool,
    /// Queue-full behavior.
    pub reject_policy: RejectPolicy,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Start the periodic gauge sampler.
    pub enable_metrics: bool,
    /// Gauge refresh interval for the sampler.
    pub metrics_interval: Duration,
    /// Emit diagnostics through a [`SimpleLogger`](crate::SimpleLogger)
    /// instead of the no-op logger.
    pub enable_logging: bool,
    /// Minimum diagnostic level when logging is enabled.
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            core_pool_size: cpus,
            max_pool_size: cpus * 4,
            queue_size: 1000,
            keep_alive_time: Duration::from_secs(60),
            allow_core_thread_timeout: false,
            reject_policy: RejectPolicy::Abort,
            thread_name_prefix: "surgepool".to_string(),
            enable_metrics: false,
            metrics_interval: Duration::from_secs(10),
            enable_logging: false,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Defaults overlaid with any `SURGEPOOL_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Overlay `SURGEPOOL_*` environment variables onto this config.
    /// Values that fail to parse leave the field unchanged.
    pub fn load_from_env(&mut self) {
        if let Some(n) = env_parse::<usize>("SURGEPOOL_CORE_POOL_SIZE") {
            self.core_pool_size = n;
        }
        if let Some(n) = env_parse::<usize>("SURGEPOOL_MAX_POOL_SIZE") {
            self.max_pool_size = n;
        }
        if let Some(n) = env_parse::<usize>("SURGEPOOL_QUEUE_SIZE") {
            self.queue_size = n;
        }
        if let Some(secs) = env_parse::<u64>("SURGEPOOL_KEEP_ALIVE_TIME") {
            self.keep_alive_time = Duration::from_secs(secs);
        }
        if let Some(b) = env_bool("SURGEPOOL_ALLOW_CORE_THREAD_TIMEOUT") {
            self.allow_core_thread_timeout = b;
        }
        if let Ok(val) = std::env::var("SURGEPOOL_REJECT_POLICY") {
            self.reject_policy = RejectPolicy::parse(&val);
        }
        if let Ok(val) = std::env::var("SURGEPOOL_THREAD_NAME_PREFIX") {
            if !val.is_empty() {
                self.thread_name_prefix = val;
            }
        }
        if let Some(b) = env_bool("SURGEPOOL_ENABLE_METRICS") {
            self.enable_metrics = b;
        }
        if let Some(secs) = env_parse::<u64>("SURGEPOOL_METRICS_INTERVAL") {
            self.metrics_interval = Duration::from_secs(secs);
        }
        if let Some(b) = env_bool("SURGEPOOL_ENABLE_LOGGING") {
            self.enable_logging = b;
        }
        if let Ok(val) = std::env::var("SURGEPOOL_LOG_LEVEL") {
            self.log_level = LogLevel::parse(&val);
        }
    }

    /// Clamp fields into their valid ranges. Applied once when the executor
    /// is constructed.
    ///
    /// Invariants afterwards: `core_pool_size >= 1`,
    /// `max_pool_size >= core_pool_size`, non-zero `keep_alive_time` and
    /// `metrics_interval`, non-empty `thread_name_prefix`.
    pub fn normalize(&mut self) {
        if self.core_pool_size == 0 {
            self.core_pool_size = 1;
        }
        if self.max_pool_size < self.core_pool_size {
            self.max_pool_size = self.core_pool_size;
        }
        if self.keep_alive_time.is_zero() {
            self.keep_alive_time = Duration::from_secs(60);
        }
        if self.metrics_interval.is_zero() {
            self.metrics_interval = Duration::from_secs(10);
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = "surgepool".to_string();
        }
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Chainable builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the minimum resident worker count.
    pub fn core_pool_size(mut self, n: usize) -> Self {
        self.config.core_pool_size = n;
        self
    }

    /// Set the worker ceiling.
    pub fn max_pool_size(mut self, n: usize) -> Self {
        self.config.max_pool_size = n;
        self
    }

    /// Set the queue capacity.
    pub fn queue_size(mut self, n: usize) -> Self {
        self.config.queue_size = n;
        self
    }

    /// Set the idle interval before a surplus worker exits.
    pub fn keep_alive_time(mut self, d: Duration) -> Self {
        self.config.keep_alive_time = d;
        self
    }

    /// Permit idle reaping of core workers.
    pub fn allow_core_thread_timeout(mut self, allow: bool) -> Self {
        self.config.allow_core_thread_timeout = allow;
        self
    }

    /// Set the queue-full behavior.
    pub fn reject_policy(mut self, policy: RejectPolicy) -> Self {
        self.config.reject_policy = policy;
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Enable the periodic gauge sampler.
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.config.enable_metrics = enable;
        self
    }

    /// Set the sampler interval.
    pub fn metrics_interval(mut self, d: Duration) -> Self {
        self.config.metrics_interval = d;
        self
    }

    /// Enable diagnostic logging.
    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    /// Set the diagnostic level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Finish, clamping fields into their valid ranges.
    pub fn build(self) -> Config {
        self.config.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.core_pool_size, num_cpus::get());
        assert_eq!(config.max_pool_size, num_cpus::get() * 4);
        assert_eq!(config.queue_size, 1000);
        assert_eq!(config.keep_alive_time, Duration::from_secs(60));
        assert!(!config.allow_core_thread_timeout);
        assert_eq!(config.reject_policy, RejectPolicy::Abort);
        assert_eq!(config.thread_name_prefix, "surgepool");
        assert!(!config.enable_metrics);
        assert!(!config.enable_logging);
    }

    #[test]
    fn test_normalize_clamps() {
        let mut config = Config {
            core_pool_size: 0,
            max_pool_size: 0,
            keep_alive_time: Duration::ZERO,
            thread_name_prefix: String::new(),
            ..Config::default()
        };
        config.normalize();

        assert_eq!(config.core_pool_size, 1);
        assert_eq!(config.max_pool_size, 1);
        assert_eq!(config.keep_alive_time, Duration::from_secs(60));
        assert_eq!(config.thread_name_prefix, "surgepool");
    }

    #[test]
    fn test_normalize_raises_max_to_core() {
        let mut config = Config {
            core_pool_size: 8,
            max_pool_size: 2,
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.max_pool_size, 8);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .core_pool_size(2)
            .max_pool_size(4)
            .queue_size(16)
            .reject_policy(RejectPolicy::Discard)
            .thread_name_prefix("pool")
            .build();

        assert_eq!(config.core_pool_size, 2);
        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.queue_size, 16);
        assert_eq!(config.reject_policy, RejectPolicy::Discard);
        assert_eq!(config.thread_name_prefix, "pool");
    }

    #[test]
    fn test_reject_policy_parse() {
        assert_eq!(RejectPolicy::parse("abort"), RejectPolicy::Abort);
        assert_eq!(RejectPolicy::parse("caller_runs"), RejectPolicy::CallerRuns);
        assert_eq!(RejectPolicy::parse("DISCARD"), RejectPolicy::Discard);
        assert_eq!(RejectPolicy::parse("drop_oldest"), RejectPolicy::Abort);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SURGEPOOL_CORE_POOL_SIZE", "3");
        std::env::set_var("SURGEPOOL_QUEUE_SIZE", "not-a-number");
        std::env::set_var("SURGEPOOL_REJECT_POLICY", "caller_runs");
        std::env::set_var("SURGEPOOL_ENABLE_METRICS", "yes");
        std::env::set_var("SURGEPOOL_LOG_LEVEL", "warn");

        let mut config = Config::default();
        let prior_queue = config.queue_size;
        config.load_from_env();

        assert_eq!(config.core_pool_size, 3);
        // parse failure leaves the prior value
        assert_eq!(config.queue_size, prior_queue);
        assert_eq!(config.reject_policy, RejectPolicy::CallerRuns);
        // booleans only accept literal true/false
        assert!(!config.enable_metrics);
        assert_eq!(config.log_level, LogLevel::Warn);

        std::env::remove_var("SURGEPOOL_CORE_POOL_SIZE");
        std::env::remove_var("SURGEPOOL_QUEUE_SIZE");
        std::env::remove_var("SURGEPOOL_REJECT_POLICY");
        std::env::remove_var("SURGEPOOL_ENABLE_METRICS");
        std::env::remove_var("SURGEPOOL_LOG_LEVEL");
    }
}
