use crate::error::{Error, Result};
use crate::queue::hazard;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "karya-worker".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        // Two hazard slots per participating thread.
        let max_threads = hazard::DOMAIN_CAPACITY / hazard::SLOTS_PER_THREAD;
        if let Some(n) = self.num_threads {
            if n > max_threads {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    max_threads
                )));
            }
        }

        Ok(())
    }

    /// Effective worker count: requested, else detected parallelism,
    /// never less than one.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_zero_threads_normalized() {
        let config = Config::builder().num_threads(0).build().unwrap();
        assert_eq!(config.worker_threads(), 1);
    }

    #[test]
    fn test_too_many_threads_rejected() {
        let result = Config::builder().num_threads(100_000).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_fields() {
        let config = Config::builder()
            .num_threads(4)
            .stack_size(1024 * 1024)
            .thread_name_prefix("test-worker")
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 4);
        assert_eq!(config.stack_size, Some(1024 * 1024));
        assert_eq!(config.thread_name_prefix, "test-worker");
    }
}
