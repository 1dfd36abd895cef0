use core::num::NonZeroUsize;
use thiserror::Error;

/// Environment variable read by [`ExecutorConfig::from_env`] for the worker
/// count.
pub const MAX_WORKERS_VAR: &str = "MELDER_MAX_WORKERS";
/// Environment variable read by [`ExecutorConfig::from_env`] for the worker
/// thread name prefix.
pub const THREAD_PREFIX_VAR: &str = "MELDER_THREAD_PREFIX";

const DEFAULT_THREAD_PREFIX: &str = "melder-worker";

/// Settings for layered execution.
///
/// `max_workers` bounds the pool every layer is dispatched to; worker threads
/// are named `{thread_name_prefix}-{index}`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ExecutorConfig {
    max_workers: NonZeroUsize,
    thread_name_prefix: String,
}

/// Invalid value in an environment-provided [`ExecutorConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidWorkers { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    EmptyThreadPrefix { var: &'static str },
}

impl ExecutorConfig {
    pub fn new(max_workers: NonZeroUsize) -> Self {
        Self::default().with_max_workers(max_workers)
    }

    pub fn with_max_workers(mut self, max_workers: NonZeroUsize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn max_workers(&self) -> NonZeroUsize {
        self.max_workers
    }

    #[must_use]
    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    /// Defaults overridden by `MELDER_MAX_WORKERS` and
    /// `MELDER_THREAD_PREFIX` when set.
    ///
    /// # Errors
    /// If a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`Self::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    /// If a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(MAX_WORKERS_VAR) {
            let workers = value
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ConfigError::InvalidWorkers {
                    var: MAX_WORKERS_VAR,
                    value,
                })?;
            config = config.with_max_workers(workers);
        }
        if let Some(prefix) = lookup(THREAD_PREFIX_VAR) {
            if prefix.is_empty() {
                return Err(ConfigError::EmptyThreadPrefix {
                    var: THREAD_PREFIX_VAR,
                });
            }
            config = config.with_thread_name_prefix(prefix);
        }
        Ok(config)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            vars.iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn unset_variables_keep_defaults() {
        assert_eq!(
            ExecutorConfig::from_lookup(lookup(&[])).unwrap(),
            ExecutorConfig::default()
        );
    }

    #[test]
    fn reads_both_variables() {
        let config = ExecutorConfig::from_lookup(lookup(&[
            (MAX_WORKERS_VAR, " 3 "),
            (THREAD_PREFIX_VAR, "resolver"),
        ]))
        .unwrap();
        assert_eq!(config.max_workers().get(), 3);
        assert_eq!(config.thread_name_prefix(), "resolver");
    }

    #[test]
    fn rejects_zero_workers() {
        let err = ExecutorConfig::from_lookup(lookup(&[(MAX_WORKERS_VAR, "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidWorkers {
                var: MAX_WORKERS_VAR,
                value: "0".to_owned()
            }
        );
        assert!(ExecutorConfig::from_lookup(lookup(&[(THREAD_PREFIX_VAR, "")])).is_err());
    }
}
