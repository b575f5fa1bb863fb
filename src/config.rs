//! Run configuration.
//!
//! A run is configured from three layers, later layers winning:
//! 1. built-in defaults ([`RunConfig::default`])
//! 2. an optional JSON file ([`RunConfig::from_file`])
//! 3. command-line overrides applied by the binary
//!
//! ```json
//! {
//!   "workers": 9,
//!   "memory_cap": 50000,
//!   "output_order": "submission",
//!   "write_header": true,
//!   "store": {
//!     "endpoint": "/var/lib/shardstash",
//!     "database": "sales",
//!     "collection": "by_region",
//!     "connect_timeout_ms": 1000
//!   }
//! }
//! ```

use crate::error::{Error, Result};
use crate::runner::Grouping;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Order in which decompressed groups reach the output file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputOrder {
    /// Whichever worker finishes first is written first.
    #[default]
    Completion,
    /// Groups are held back and released in query-result order.
    Submission,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection descriptor; the root directory for the directory store.
    pub endpoint: String,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub connect_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "./shardstash-store".to_string(),
            database: None,
            collection: None,
            connect_timeout_ms: 1000,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads for both fan-out stages; `None` means CPU count + 1.
    pub workers: Option<usize>,
    /// Row cap per group; setting it switches partitioning to bounded mode.
    pub memory_cap: Option<usize>,
    pub output_order: OutputOrder,
    pub write_header: bool,
    pub store: StoreConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: None,
            memory_cap: None,
            output_order: OutputOrder::Completion,
            write_header: true,
            store: StoreConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a JSON configuration file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`Error::InputNotFound`] for a missing file and [`Error::Config`]
    /// for unparsable or invalid contents.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`Error::Config`] for a zero worker count, a zero memory cap, or
    /// a zero connection timeout.
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.memory_cap == Some(0) {
            return Err(Error::Config("memory_cap must be at least 1 row".into()));
        }
        if self.store.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(crate::runner::default_workers)
    }

    #[must_use]
    pub fn grouping(&self) -> Grouping {
        match self.memory_cap {
            Some(cap) => Grouping::Bounded { cap },
            None => Grouping::Bulk,
        }
    }
}
