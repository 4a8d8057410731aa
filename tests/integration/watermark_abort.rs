use tso::events::RowSet;
use tso::oracle::store::InMemoryTimestampStore;
use tso::oracle::TimestampOracle;
use tso::request_processor::{Decision, RequestProcessor};
use tso::ring::Ring;
use tso::Timestamp;
use std::sync::Arc;

/// S4: forcing the low-watermark ahead of a transaction's start_ts makes
/// that transaction abort regardless of whether its rows actually conflict.
#[test]
fn stale_snapshot_aborts_via_forced_watermark() {
    let request_ring = Arc::new(Ring::new(16));
    let persist_ring = Arc::new(Ring::new(16));
    let oracle =
        TimestampOracle::open(Box::new(InMemoryTimestampStore::default()), 1_000_000, 100_000)
            .unwrap();
    let mut p = RequestProcessor::new(request_ring, persist_ring, oracle, 1024, Timestamp::ZERO);

    p.set_low_watermark(Timestamp(100));
    assert_eq!(p.low_watermark(), Timestamp(100));

    let rows: RowSet = RowSet::new();
    assert_eq!(p.decide(Timestamp(99), &rows), Decision::Abort);
    assert_eq!(p.decide(Timestamp(100), &rows), Decision::Abort);
    assert!(matches!(p.decide(Timestamp(101), &rows), Decision::Commit(_, _)));
}
