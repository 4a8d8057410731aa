//! Process configuration, loaded once at startup from a TOML file and
//! overridable by CLI flags or environment variables before the stages are
//! constructed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};

/// Selects which backend persists the oracle's allocation ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStoreKind {
    /// A coordination-service znode (external; represented here by the
    /// same durable file-backed adapter used for `file`).
    Coordination,
    /// A single row/cell in the underlying column store (external; same
    /// adapter as `file` stands in for it).
    ColumnStore,
    /// A local durable file, used directly by the demo binary and tests.
    File,
}

impl Default for TimestampStoreKind {
    fn default() -> Self {
        TimestampStoreKind::File
    }
}

/// Ring-full wait strategy for producer threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Spin the CPU until a slot frees up. Lowest latency, highest CPU use.
    BusySpin,
    /// Yield/park briefly between polls.
    Parked,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::BusySpin
    }
}

/// Full process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity `C` of the conflict map.
    pub max_items: usize,
    /// Oracle allocation batch size (`BATCH`).
    pub batch_size: u64,
    /// Max events the persistence stage drains per batch.
    pub persist_batch_size: usize,
    /// Max microseconds the persistence stage waits before flushing a
    /// partial batch.
    pub persist_batch_timeout_us: u64,
    /// Which backend persists the oracle's ceiling.
    pub timestamp_store: TimestampStoreKind,
    /// Informational only; not consulted by the core.
    pub network_interface: String,
    /// Port the demo HTTP front-end binds to.
    pub port: u16,
    /// Capacity of each ring buffer (request ring and persistence ring).
    /// Rounded up to the next power of two if not already one.
    pub ring_capacity: usize,
    /// Wait strategy producers use when a ring is full.
    pub wait_strategy: WaitStrategy,
    /// Directory holding the oracle ceiling file and the commit log, when
    /// `timestamp_store` resolves to a local file-backed adapter.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items: 1_000_000,
            batch_size: 10_000_000,
            persist_batch_size: 2_048,
            persist_batch_timeout_us: 2_000,
            timestamp_store: TimestampStoreKind::default(),
            network_interface: "0.0.0.0".to_string(),
            port: 7777,
            ring_capacity: 65_536,
            wait_strategy: WaitStrategy::default(),
            data_dir: PathBuf::from("./tso-data"),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parses configuration from an in-memory TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| OracleError::Config(e.to_string()))
    }

    /// Validates cross-field constraints not expressible in the type alone.
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(OracleError::Config(
                "max_items must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(OracleError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.ring_capacity == 0 || !self.ring_capacity.is_power_of_two() {
            return Err(OracleError::Config(
                "ring_capacity must be a nonzero power of two".to_string(),
            ));
        }
        if self.persist_batch_size == 0 {
            return Err(OracleError::Config(
                "persist_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The oracle's allocation threshold: a new batch is persisted once
    /// `cur + threshold() >= ceiling`. Fixed at one tenth of `batch_size`.
    pub fn oracle_threshold(&self) -> u64 {
        (self.batch_size / 10).max(1)
    }

    /// Path to the oracle ceiling file under `data_dir`.
    pub fn ceiling_path(&self) -> PathBuf {
        self.data_dir.join("oracle.ceiling")
    }

    /// Path to the commit log file under `data_dir`.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("commit.log")
    }

    /// A preset tuned for local development and tests: small batches so
    /// scenarios like a batch crossing are easy to trigger deterministically.
    pub fn development() -> Self {
        Self {
            batch_size: 4,
            persist_batch_size: 8,
            persist_batch_timeout_us: 500,
            ring_capacity: 4096,
            ..Self::default()
        }
    }
}
