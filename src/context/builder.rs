//! Builder for [`Executor`] configuration.

use std::time::Duration;

use super::Executor;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved executor settings.
#[derive(Debug, Clone)]
pub(crate) struct ExecutorConfig {
    pub(crate) thread_name_prefix: String,
    pub(crate) pool_max_threads: usize,
    pub(crate) idle_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(4, usize::from);
        Self {
            thread_name_prefix: "pledge".to_owned(),
            pool_max_threads: parallelism.max(2),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Builder for constructing an [`Executor`] with custom settings.
///
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Default)]
pub struct ExecutorBuilder {
    pub(crate) config: ExecutorConfig,
}

impl ExecutorBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix used for every spawned thread's name.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the maximum number of threads per priority pool. Clamped to at
    /// least 1.
    #[must_use]
    pub fn pool_max_threads(mut self, max: usize) -> Self {
        self.config.pool_max_threads = max.max(1);
        self
    }

    /// Sets how long an idle pool thread lingers before retiring.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Builds the executor, spawning the main queue and timer threads.
    #[must_use]
    pub fn build(&self) -> Executor {
        Executor::from_config(&self.config)
    }
}
