//! Explicit construction and wiring of the three-stage pipeline from a
//! [`Config`]. There is no process-wide singleton: a [`Pipeline`] owns the
//! two rings and the join handles of the request-processor and
//! persistence-processor threads, and is the only long-lived mutable state
//! outside of those threads' own stacks.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::Config;
use crate::error::Result;
use crate::events::{Client, RequestEvent, RowSet};
use crate::oracle::store::{FileTimestampStore, TimestampStore};
use crate::oracle::TimestampOracle;
use crate::persistence::log::CommitLog;
use crate::persistence::{self, PersistenceConfig, PersistenceProcessor};
use crate::request_processor::RequestProcessor;
use crate::ring::Ring;
use crate::types::Timestamp;

/// A running (or not-yet-started) instance of the oracle / request-processor
/// / persistence-processor pipeline.
pub struct Pipeline {
    request_ring: Arc<Ring<RequestEvent>>,
    shutdown: Arc<AtomicBool>,
    request_thread: Option<JoinHandle<()>>,
    persistence_thread: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Constructs the rings, the oracle (recovering its ceiling), and the
    /// two stage objects from `cfg`, then spawns their consumer threads.
    pub fn start(cfg: &Config) -> Result<Self> {
        cfg.validate()
            .map_err(|e| crate::error::OracleError::Config(e.to_string()))?;

        let store: Box<dyn TimestampStore> = Box::new(FileTimestampStore::new(cfg.ceiling_path()));
        let oracle = TimestampOracle::open(store, cfg.batch_size, cfg.oracle_threshold())?;

        let replay_outcome = persistence::recover_replay_outcome(cfg.log_path())?;
        if replay_outcome.highest_timestamp.value() > oracle.ceiling() {
            // Not fatal: the oracle's persisted ceiling is authoritative for
            // monotonicity regardless, but a commit log that references a
            // timestamp higher than anything the oracle ever ceiling-bumped
            // to is worth a loud warning for an operator to investigate.
            tracing::warn!(
                highest_logged_timestamp = replay_outcome.highest_timestamp.value(),
                oracle_ceiling = oracle.ceiling(),
                "commit log references a timestamp above the oracle's recovered ceiling"
            );
        }
        let initial_lw = replay_outcome.low_watermark;
        let log = CommitLog::open(cfg.log_path())?;

        let request_ring: Arc<Ring<RequestEvent>> =
            Arc::new(Ring::with_strategy(cfg.ring_capacity, cfg.wait_strategy));
        let persist_ring = Arc::new(Ring::with_strategy(cfg.ring_capacity, cfg.wait_strategy));

        let mut request_processor = RequestProcessor::new(
            Arc::clone(&request_ring),
            Arc::clone(&persist_ring),
            oracle,
            cfg.max_items,
            initial_lw,
        );
        let mut persistence_processor = PersistenceProcessor::new(
            persist_ring,
            log,
            PersistenceConfig {
                max_batch_events: cfg.persist_batch_size,
                max_batch_wait: std::time::Duration::from_micros(cfg.persist_batch_timeout_us),
            },
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let request_shutdown = Arc::clone(&shutdown);
        let persistence_shutdown = Arc::clone(&shutdown);

        let request_thread = std::thread::Builder::new()
            .name("tso-request-processor".into())
            .spawn(move || request_processor.run(&request_shutdown))
            .map_err(crate::error::OracleError::Io)?;
        let persistence_thread = std::thread::Builder::new()
            .name("tso-persistence-processor".into())
            .spawn(move || persistence_processor.run(&persistence_shutdown))
            .map_err(crate::error::OracleError::Io)?;

        Ok(Self {
            request_ring,
            shutdown,
            request_thread: Some(request_thread),
            persistence_thread: Some(persistence_thread),
        })
    }

    /// Enqueues a timestamp request. Busy-spins if the request ring is
    /// full rather than dropping it.
    pub fn timestamp_request(&self, client: Client) {
        self.request_ring.push_spin(RequestEvent::Timestamp { client });
    }

    /// Enqueues a commit request. Busy-spins if the request ring is full
    /// rather than dropping it.
    pub fn commit_request(
        &self,
        start_ts: Timestamp,
        rows: RowSet,
        is_retry: bool,
        client: Client,
    ) {
        self.request_ring.push_spin(RequestEvent::Commit {
            start_ts,
            rows,
            is_retry,
            client,
        });
    }

    /// Signals both stage threads to stop after their current batch and
    /// waits for them to exit. Note this does not drain in-flight requests;
    /// callers that need a clean drain should stop enqueueing first.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(h) = self.request_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.persistence_thread.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(h) = self.request_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.persistence_thread.take() {
            let _ = h.join();
        }
    }
}
