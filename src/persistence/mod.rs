//! The persistence stage: batches decisions from the request processor,
//! durably logs them with a single fsync per batch, and only then releases
//! replies to clients.

pub mod log;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{fatal, OracleError};
use crate::events::{PersistEvent, Reply};
use crate::ring::Ring;
use crate::types::Timestamp;
use log::{CommitLog, LogRecord};

/// Tunables controlling how the persistence stage batches writes.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceConfig {
    /// Drain at most this many events before flushing a batch, even if
    /// more are waiting.
    pub max_batch_events: usize,
    /// Flush whatever has been drained once this much time has passed
    /// since the first event in the batch arrived.
    pub max_batch_wait: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_batch_events: 2_048,
            max_batch_wait: Duration::from_micros(2_000),
        }
    }
}

/// Single-threaded batching stage. Construct with [`PersistenceProcessor::new`]
/// and drive its consumer loop with [`PersistenceProcessor::run_once`] (or
/// spawn a thread that calls it in a loop — see `bin/tso.rs`).
pub struct PersistenceProcessor {
    ring: Arc<Ring<PersistEvent>>,
    log: CommitLog,
    config: PersistenceConfig,
}

impl PersistenceProcessor {
    /// Builds a processor that drains `ring` into `log`.
    pub fn new(ring: Arc<Ring<PersistEvent>>, log: CommitLog, config: PersistenceConfig) -> Self {
        Self { ring, log, config }
    }

    /// Blocks (busy-spinning) until at least one event is available, then
    /// drains up to `max_batch_events` or until `max_batch_wait` elapses,
    /// appends the batch, fsyncs once, and releases every reply. Returns
    /// the number of events flushed.
    ///
    /// Log write or durability-barrier failure is fatal and terminates the
    /// process, per the design's error-handling policy — there is no
    /// partial-batch recovery path.
    pub fn run_once(&mut self) -> usize {
        let first = self.ring.pop_spin();
        let started = Instant::now();
        let mut batch = vec![first];
        while batch.len() < self.config.max_batch_events {
            if let Some(ev) = self.ring.try_pop() {
                batch.push(ev);
            } else if started.elapsed() >= self.config.max_batch_wait {
                break;
            } else {
                std::hint::spin_loop();
            }
        }

        let count = batch.len();
        let mut records = Vec::with_capacity(count);
        let mut coalesced_lw: Option<Timestamp> = None;
        let mut replies: Vec<(Arc<dyn crate::events::ReplyChannel>, Reply)> = Vec::new();

        for event in batch {
            match event {
                PersistEvent::Timestamp { ts, client } => {
                    records.push(LogRecord::Timestamp { ts });
                    replies.push((client, Reply::Timestamp { ts }));
                }
                PersistEvent::Commit {
                    start_ts,
                    commit_ts,
                    client,
                } => {
                    records.push(LogRecord::Commit {
                        start_ts,
                        commit_ts,
                    });
                    replies.push((
                        client,
                        Reply::Commit {
                            start_ts,
                            commit_ts,
                        },
                    ));
                }
                PersistEvent::Abort {
                    start_ts,
                    is_retry,
                    client,
                } => {
                    records.push(LogRecord::Abort {
                        start_ts,
                        is_retry,
                    });
                    replies.push((client, Reply::Abort { start_ts, is_retry }));
                }
                PersistEvent::LowWatermark { lw } => {
                    coalesced_lw = Some(coalesced_lw.map_or(lw, |prev| prev.max(lw)));
                }
            }
        }
        if let Some(lw) = coalesced_lw {
            records.push(LogRecord::LowWatermark { lw });
        }

        let barrier_started = Instant::now();
        if let Err(e) = self.log.append_batch(&records) {
            fatal("persistence", &e);
        }
        if let Err(e) = self.log.sync() {
            fatal("persistence", &e);
        }
        let latency_us = barrier_started.elapsed().as_micros() as u64;
        crate::metrics::record_persistence_batch(count, latency_us);

        // Only after the durability barrier do replies go out.
        for (client, reply) in replies {
            client.send_reply(reply);
        }

        count
    }

    /// Runs [`PersistenceProcessor::run_once`] in a loop until `shutdown`
    /// reports true (checked between batches).
    pub fn run(&mut self, shutdown: &std::sync::atomic::AtomicBool) {
        while !shutdown.load(std::sync::atomic::Ordering::Relaxed) {
            self.run_once();
        }
    }
}

/// Replays the commit log in full, for callers that need more than just the
/// recovered low-watermark (e.g. the startup corruption sanity check that
/// cross-references [`log::ReplayOutcome::highest_timestamp`] against the
/// oracle's recovered ceiling).
pub fn recover_replay_outcome(
    log_path: impl AsRef<std::path::Path>,
) -> crate::error::Result<log::ReplayOutcome> {
    CommitLog::replay(log_path).map_err(|e| OracleError::Corruption(e.to_string()))
}

/// Replays the commit log and reports the recovered low-watermark, for use
/// as the request processor's initial watermark at startup.
pub fn recover_low_watermark(log_path: impl AsRef<std::path::Path>) -> crate::error::Result<Timestamp> {
    Ok(recover_replay_outcome(log_path)?.low_watermark)
}
