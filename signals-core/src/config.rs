//! Runtime Configuration
//!
//! Each thread owns its own reactive runtime. When a thread touches the
//! reactive system for the first time, its runtime is built from the
//! process-wide default configuration held here.
//!
//! # Example
//!
//! ```rust
//! use signals_core::config::{RuntimeConfig, set_default_config};
//!
//! let config = RuntimeConfig::from_json(r#"{ "flush_limit": 500 }"#).unwrap();
//! set_default_config(config);
//! ```

use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Tunables for a thread's reactive runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of times one effect may be notified in a single flush.
    ///
    /// Effects that keep re-triggering each other are cut off once one of
    /// them goes over it. The rest of the queue is dropped and runs on the
    /// next write that reaches it.
    pub flush_limit: usize,

    /// Initial capacity of the node arena.
    pub node_capacity: usize,

    /// Initial capacity of the link arena.
    pub link_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_limit: 100_000,
            node_capacity: 64,
            link_capacity: 128,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.flush_limit == 0 {
            return Err(ReactiveError::InvalidConfig(
                "flush_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Process-wide default, copied into each thread's runtime on first use.
static DEFAULT_CONFIG: OnceLock<RwLock<RuntimeConfig>> = OnceLock::new();

fn default_slot() -> &'static RwLock<RuntimeConfig> {
    DEFAULT_CONFIG.get_or_init(|| RwLock::new(RuntimeConfig::default()))
}

/// Replace the process-wide default configuration.
///
/// Only runtimes created afterwards (threads that have not touched the
/// reactive system yet) pick it up. Use [`crate::reactive::configure`] to
/// change the current thread.
pub fn set_default_config(config: RuntimeConfig) {
    *default_slot().write() = config;
}

/// Get the process-wide default configuration.
pub fn default_config() -> RuntimeConfig {
    *default_slot().read()
}
