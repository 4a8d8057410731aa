//! Human- and machine-readable status reporting: recovers the persisted
//! ceiling and watermark without starting the pipeline, and snapshots live
//! metrics while it runs. Used by the CLI `status` subcommand and the demo
//! HTTP front-end's `/status` endpoint.

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::metrics::{self, MetricsSnapshot};
use crate::oracle::store::FileTimestampStore;
use crate::persistence::log::CommitLog;
use crate::types::Timestamp;

/// A point-in-time report of durable state plus live metrics.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Oracle's persisted allocation ceiling.
    pub oracle_ceiling: u64,
    /// Highest low-watermark recovered from the commit log.
    pub low_watermark: Timestamp,
    /// Highest timestamp observed anywhere in the commit log.
    pub highest_logged_timestamp: Timestamp,
    /// Number of log records scanned to produce this report.
    pub records_replayed: u64,
    /// Live counters, as of the moment this report was built.
    pub metrics: MetricsSnapshot,
}

/// Builds a status report by reading the oracle ceiling file and replaying
/// the commit log under `cfg.data_dir`. Does not require the pipeline to be
/// running; safe to call against a cold data directory (all fields read as
/// zero/default).
pub fn status_report(cfg: &Config) -> Result<StatusReport> {
    let store = FileTimestampStore::new(cfg.ceiling_path());
    let ceiling = {
        use crate::oracle::store::TimestampStore;
        store.read_ceiling()?
    };
    let outcome = CommitLog::replay(cfg.log_path())
        .map_err(|e| crate::error::OracleError::Corruption(e.to_string()))?;

    Ok(StatusReport {
        oracle_ceiling: ceiling,
        low_watermark: outcome.low_watermark,
        highest_logged_timestamp: outcome.highest_timestamp,
        records_replayed: outcome.records_replayed,
        metrics: metrics::snapshot(),
    })
}
