//! Process-wide metrics registry: a handful of lazily-initialized atomic
//! counters plus a bounded latency-sample window for the persistence batch,
//! in the style of a storage engine's profiling module. Readable from any
//! thread; written only by the stage that owns the corresponding counter.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use serde::Serialize;

const LATENCY_SAMPLE_WINDOW: usize = 4096;

struct Counters {
    requests_received: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
    conflict_map_evictions: AtomicU64,
    low_watermark_advances: AtomicU64,
    oracle_batch_persists: AtomicU64,
    persistence_batches: AtomicU64,
    persistence_batch_events: AtomicU64,
}

impl Counters {
    const fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            conflict_map_evictions: AtomicU64::new(0),
            low_watermark_advances: AtomicU64::new(0),
            oracle_batch_persists: AtomicU64::new(0),
            persistence_batches: AtomicU64::new(0),
            persistence_batch_events: AtomicU64::new(0),
        }
    }
}

fn counters() -> &'static Counters {
    static COUNTERS: OnceLock<Counters> = OnceLock::new();
    COUNTERS.get_or_init(Counters::new)
}

fn persistence_latency_samples_us() -> &'static Mutex<VecDeque<u64>> {
    static SAMPLES: OnceLock<Mutex<VecDeque<u64>>> = OnceLock::new();
    SAMPLES.get_or_init(|| Mutex::new(VecDeque::with_capacity(LATENCY_SAMPLE_WINDOW)))
}

/// Records one inbound request (timestamp or commit) arriving at the
/// request ring.
pub fn record_request_received() {
    counters().requests_received.fetch_add(1, Ordering::Relaxed);
}

/// Records a successful commit decision.
pub fn record_commit() {
    counters().commits.fetch_add(1, Ordering::Relaxed);
}

/// Records an abort decision.
pub fn record_abort() {
    counters().aborts.fetch_add(1, Ordering::Relaxed);
}

/// Records a conflict-map eviction (a slot was overwritten before its
/// timestamp aged out naturally).
pub fn record_conflict_map_eviction() {
    counters()
        .conflict_map_evictions
        .fetch_add(1, Ordering::Relaxed);
}

/// Records the low-watermark advancing.
pub fn record_low_watermark_advance() {
    counters()
        .low_watermark_advances
        .fetch_add(1, Ordering::Relaxed);
}

/// Records the oracle persisting a new allocation ceiling.
pub fn record_oracle_batch_persist() {
    counters()
        .oracle_batch_persists
        .fetch_add(1, Ordering::Relaxed);
}

/// Records one persistence-stage batch flush: its size (event count) and
/// the wall-clock microseconds the durability barrier took.
pub fn record_persistence_batch(event_count: usize, latency_us: u64) {
    let c = counters();
    c.persistence_batches.fetch_add(1, Ordering::Relaxed);
    c.persistence_batch_events
        .fetch_add(event_count as u64, Ordering::Relaxed);

    let mut samples = persistence_latency_samples_us().lock().unwrap();
    if samples.len() == LATENCY_SAMPLE_WINDOW {
        samples.pop_front();
    }
    samples.push_back(latency_us);
}

fn percentile(mut values: Vec<u64>, pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * pct).round() as usize;
    values[idx.min(values.len() - 1)]
}

/// A point-in-time snapshot of every counter, suitable for the CLI `status`
/// command and the demo HTTP front-end's `/status` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Number of timestamp/commit requests the request ring has accepted.
    pub requests_received: u64,
    /// Number of commit decisions.
    pub commits: u64,
    /// Number of abort decisions.
    pub aborts: u64,
    /// Number of conflict-map slots overwritten before natural expiry.
    pub conflict_map_evictions: u64,
    /// Number of times the low-watermark advanced.
    pub low_watermark_advances: u64,
    /// Number of times the oracle persisted a new ceiling.
    pub oracle_batch_persists: u64,
    /// Number of persistence-stage batch flushes.
    pub persistence_batches: u64,
    /// Total events across all persistence-stage batch flushes.
    pub persistence_batch_events: u64,
    /// p50 durability-barrier latency in microseconds, over the most recent
    /// samples.
    pub persistence_latency_p50_us: u64,
    /// p95 durability-barrier latency in microseconds, over the most recent
    /// samples.
    pub persistence_latency_p95_us: u64,
}

/// Snapshots every counter without resetting any of them.
pub fn snapshot() -> MetricsSnapshot {
    let c = counters();
    let samples: Vec<u64> = persistence_latency_samples_us()
        .lock()
        .unwrap()
        .iter()
        .copied()
        .collect();
    MetricsSnapshot {
        requests_received: c.requests_received.load(Ordering::Relaxed),
        commits: c.commits.load(Ordering::Relaxed),
        aborts: c.aborts.load(Ordering::Relaxed),
        conflict_map_evictions: c.conflict_map_evictions.load(Ordering::Relaxed),
        low_watermark_advances: c.low_watermark_advances.load(Ordering::Relaxed),
        oracle_batch_persists: c.oracle_batch_persists.load(Ordering::Relaxed),
        persistence_batches: c.persistence_batches.load(Ordering::Relaxed),
        persistence_batch_events: c.persistence_batch_events.load(Ordering::Relaxed),
        persistence_latency_p50_us: percentile(samples.clone(), 0.50),
        persistence_latency_p95_us: percentile(samples, 0.95),
    }
}
