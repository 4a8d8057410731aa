//! The request processor: the single-threaded conflict-detection engine
//! that turns a stream of [`RequestEvent`]s into [`PersistEvent`]s, owning
//! the conflict map and the low-watermark.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::conflict_map::ConflictMap;
use crate::error::{fatal, Result};
use crate::events::{PersistEvent, RequestEvent};
use crate::oracle::TimestampOracle;
use crate::ring::Ring;
use crate::types::Timestamp;

/// Owns the conflict map and low-watermark, and drives the commit/abort
/// decision algorithm. Runs on exactly one thread; the oracle is a plain
/// value owned by this struct since `next()` is only ever called from here.
pub struct RequestProcessor {
    request_ring: Arc<Ring<RequestEvent>>,
    persist_ring: Arc<Ring<PersistEvent>>,
    oracle: TimestampOracle,
    conflict_map: ConflictMap,
    /// Stored as an atomic purely so read-only observers (status/metrics
    /// endpoints) can snapshot it without a lock; this struct remains its
    /// sole writer.
    low_watermark: Arc<AtomicU64>,
}

impl RequestProcessor {
    /// Builds a processor with an empty conflict map of capacity
    /// `map_capacity`, an initial low-watermark of `initial_lw` (recovered
    /// from the commit log at startup), and the given oracle.
    pub fn new(
        request_ring: Arc<Ring<RequestEvent>>,
        persist_ring: Arc<Ring<PersistEvent>>,
        oracle: TimestampOracle,
        map_capacity: usize,
        initial_lw: Timestamp,
    ) -> Self {
        Self {
            request_ring,
            persist_ring,
            oracle,
            conflict_map: ConflictMap::new(map_capacity),
            low_watermark: Arc::new(AtomicU64::new(initial_lw.value())),
        }
    }

    /// A cheap, lock-free handle to the current low-watermark, safe to read
    /// from any thread.
    pub fn low_watermark_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.low_watermark)
    }

    /// The current low-watermark.
    pub fn low_watermark(&self) -> Timestamp {
        Timestamp(self.low_watermark.load(Ordering::Acquire))
    }

    /// Forces the low-watermark to `lw`. Used by tests to set up a
    /// stale-snapshot scenario directly; the running pipeline only ever
    /// advances it through [`RequestProcessor::decide`].
    pub fn set_low_watermark(&self, lw: Timestamp) {
        self.low_watermark.store(lw.value(), Ordering::Release);
    }

    /// Blocks (busy-spinning) for the next request and processes it,
    /// returning once the corresponding persist event(s) have been pushed.
    pub fn run_once(&mut self) {
        let event = self.request_ring.pop_spin();
        crate::metrics::record_request_received();
        match event {
            RequestEvent::Timestamp { client } => self.handle_timestamp(client),
            RequestEvent::Commit {
                start_ts,
                rows,
                is_retry,
                client,
            } => self.handle_commit(start_ts, &rows, is_retry, client),
        }
    }

    /// Runs [`RequestProcessor::run_once`] in a loop until `shutdown`
    /// reports true (checked between requests).
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.run_once();
        }
    }

    fn handle_timestamp(&mut self, client: crate::events::Client) {
        // A transient oracle error on the timestamp path is not fatal: log
        // it and drop the request without a reply. The client sees no
        // response and retries, unlike the commit path where an allocation
        // failure mid-decision has nowhere safe to unwind to.
        let ts = match self.allocate() {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(error = %e, "oracle allocation failed for timestamp request, dropping");
                return;
            }
        };
        self.persist_ring.push_spin(PersistEvent::Timestamp { ts, client });
    }

    fn handle_commit(
        &mut self,
        start_ts: Timestamp,
        rows: &crate::events::RowSet,
        is_retry: bool,
        client: crate::events::Client,
    ) {
        match self.decide(start_ts, rows) {
            Decision::Abort => {
                crate::metrics::record_abort();
                self.persist_ring.push_spin(PersistEvent::Abort {
                    start_ts,
                    is_retry,
                    client,
                });
            }
            Decision::Commit(commit_ts, new_lw) => {
                crate::metrics::record_commit();
                if new_lw > self.low_watermark() {
                    self.set_low_watermark(new_lw);
                    crate::metrics::record_low_watermark_advance();
                    self.persist_ring
                        .push_spin(PersistEvent::LowWatermark { lw: new_lw });
                }
                self.persist_ring.push_spin(PersistEvent::Commit {
                    start_ts,
                    commit_ts,
                    client,
                });
            }
        }
    }

    /// Runs the decision algorithm (watermark check, conflict check,
    /// conflict-map update) without touching the persist ring, so it can be
    /// driven directly by tests and property tests without wiring a full
    /// pipeline. Exposed publicly for exactly that reason.
    ///
    /// Allocation failure while minting a commit timestamp is still fatal
    /// and terminates the process, matching [`RequestProcessor::run_once`].
    pub fn decide(&mut self, start_ts: Timestamp, rows: &crate::events::RowSet) -> Decision {
        if start_ts <= self.low_watermark() {
            return Decision::Abort;
        }
        for &row in rows.iter() {
            if let Some(existing) = self.conflict_map.get(row) {
                if existing >= start_ts {
                    return Decision::Abort;
                }
            }
        }

        let commit_ts = match self.allocate() {
            Ok(ts) => ts,
            Err(e) => fatal("request_processor", &e),
        };

        let mut new_lw = self.low_watermark();
        for &row in rows.iter() {
            if let Some(evicted) = self.conflict_map.insert(row, commit_ts) {
                crate::metrics::record_conflict_map_eviction();
                new_lw = new_lw.max(evicted);
            }
        }
        Decision::Commit(commit_ts, new_lw)
    }

    fn allocate(&mut self) -> Result<Timestamp> {
        self.oracle.next()
    }

    /// Allocates a fresh timestamp the same way a `timestamp_request` would,
    /// without requiring a ring or a reply channel. Exposed for tests and
    /// property tests that only care about the oracle's monotonicity
    /// guarantee, not the full pipeline.
    pub fn allocate_timestamp(&mut self) -> Result<Timestamp> {
        self.allocate()
    }
}

/// Outcome of [`RequestProcessor::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The transaction aborted (watermark or conflict check failed).
    Abort,
    /// The transaction committed at the given commit timestamp; the second
    /// field is the low-watermark that should be adopted as a result (it
    /// may equal the watermark already in effect, if nothing was evicted).
    Commit(Timestamp, Timestamp),
}
