//! Event bus configuration.
//!
//! The configuration only matters when the bus owns its dispatch runtime,
//! i.e. when it is created outside of a tokio runtime. A bus built on an
//! existing [`tokio::runtime::Handle`] dispatches on that runtime instead.

use serde::{Deserialize, Serialize};

use crate::error::{EventBusError, Result};

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Async worker threads of an owned dispatch runtime.
    pub worker_threads: usize,
    /// Upper bound on threads running dispatch units at the same time.
    pub max_blocking_threads: usize,
    /// Name given to the dispatch runtime's threads.
    pub thread_name: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 64,
            thread_name: "tuktuk-dispatch".to_string(),
        }
    }
}

impl EventBusConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    ///
    /// ```
    /// use tuktuk_core::EventBusConfig;
    ///
    /// let config = EventBusConfig::from_toml_str("max_blocking_threads = 8").unwrap();
    /// assert_eq!(config.max_blocking_threads, 8);
    /// assert_eq!(config.thread_name, "tuktuk-dispatch");
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EventBusError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that an owned runtime can be built from this configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(EventBusError::config("worker_threads must be at least 1"));
        }
        if self.max_blocking_threads == 0 {
            return Err(EventBusError::config(
                "max_blocking_threads must be at least 1",
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(EventBusError::config("thread_name must not be empty"));
        }
        Ok(())
    }
}
