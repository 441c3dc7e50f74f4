//! Layered configuration: built-in defaults, an optional TOML file, then
//! `STATION_STORE_*` environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use validator::Validate;

use crate::error::{Result, StationError};
use crate::storage::ConsistencyLevel;
use crate::utils::constants::{
    CONFIG_FILE, DEFAULT_AVAILABLE_READ_REPLICAS, DEFAULT_INGEST_CONCURRENCY,
    DEFAULT_NODE_COUNT, DEFAULT_REPLICATION_FACTOR, DEFAULT_REPLICA_TIMEOUT_MS,
    DEFAULT_REQUEST_DEADLINE_MS, DEFAULT_STRONG_READ_REPLICAS, DEFAULT_WRITE_REPLICAS,
    ENV_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    #[validate(range(min = 1, max = 32))]
    pub nodes: u8,

    #[validate(range(min = 1, max = 32))]
    pub replication_factor: u8,

    #[validate(range(min = 1))]
    pub strong_read_replicas: u8,

    #[validate(range(min = 1))]
    pub available_read_replicas: u8,

    #[validate(range(min = 1))]
    pub write_replicas: u8,

    #[validate(range(min = 1))]
    pub replica_timeout_ms: u64,

    #[validate(range(min = 1))]
    pub request_deadline_ms: u64,

    #[validate(range(min = 1))]
    pub ingest_concurrency: usize,

    pub state_filter: Option<String>,
}

/// Consistency levels resolved from the replica counts in [`StoreConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLevels {
    pub strong_read: ConsistencyLevel,
    pub available_read: ConsistencyLevel,
    pub write: ConsistencyLevel,
}

impl Default for TierLevels {
    fn default() -> Self {
        Self {
            strong_read: ConsistencyLevel::Two,
            available_read: ConsistencyLevel::One,
            write: ConsistencyLevel::One,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODE_COUNT,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            strong_read_replicas: DEFAULT_STRONG_READ_REPLICAS,
            available_read_replicas: DEFAULT_AVAILABLE_READ_REPLICAS,
            write_replicas: DEFAULT_WRITE_REPLICAS,
            replica_timeout_ms: DEFAULT_REPLICA_TIMEOUT_MS,
            request_deadline_ms: DEFAULT_REQUEST_DEADLINE_MS,
            ingest_concurrency: DEFAULT_INGEST_CONCURRENCY,
            state_filter: Some("WI".to_string()),
        }
    }
}

impl StoreConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `station-store.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(CONFIG_FILE).required(false),
        };

        let config: StoreConfig = Config::builder()
            .add_source(Config::try_from(&StoreConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.check()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Validate field ranges and the replica arithmetic between them.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if self.replication_factor > self.nodes {
            return Err(StationError::Config(format!(
                "replication_factor {} exceeds node count {}",
                self.replication_factor, self.nodes
            )));
        }

        for (name, replicas) in [
            ("strong_read_replicas", self.strong_read_replicas),
            ("available_read_replicas", self.available_read_replicas),
            ("write_replicas", self.write_replicas),
        ] {
            if replicas > self.replication_factor {
                return Err(StationError::Config(format!(
                    "{} = {} exceeds replication_factor {}",
                    name, replicas, self.replication_factor
                )));
            }
        }

        if self.available_read_replicas > self.strong_read_replicas {
            return Err(StationError::Config(format!(
                "available tier ({}) must not require more replicas than the strong tier ({})",
                self.available_read_replicas, self.strong_read_replicas
            )));
        }

        if !self.reads_overlap_writes() {
            warn!(
                "R={} + W={} <= RF={}: strong reads are not guaranteed to observe the latest write",
                self.strong_read_replicas, self.write_replicas, self.replication_factor
            );
        }

        self.tier_levels().map(|_| ())
    }

    /// True when strong reads and writes share at least one replica.
    pub fn reads_overlap_writes(&self) -> bool {
        self.strong_read_replicas + self.write_replicas > self.replication_factor
    }

    pub fn tier_levels(&self) -> Result<TierLevels> {
        let level = |replicas: u8| {
            ConsistencyLevel::from_replicas(replicas).ok_or_else(|| {
                StationError::Config(format!("no consistency level waits for {} replicas", replicas))
            })
        };

        Ok(TierLevels {
            strong_read: level(self.strong_read_replicas)?,
            available_read: level(self.available_read_replicas)?,
            write: level(self.write_replicas)?,
        })
    }

    pub fn replica_timeout(&self) -> Duration {
        Duration::from_millis(self.replica_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}
