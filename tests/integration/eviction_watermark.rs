use tso::events::RowSet;
use tso::oracle::store::InMemoryTimestampStore;
use tso::oracle::TimestampOracle;
use tso::request_processor::{Decision, RequestProcessor};
use tso::ring::Ring;
use tso::{RowFingerprint, Timestamp};
use std::sync::Arc;

fn rows(vals: &[u64]) -> RowSet {
    vals.iter().map(|&v| RowFingerprint(v)).collect()
}

/// S5: with a conflict map of capacity 2, three commits where the third
/// collides with the first's slot evict the first entry and raise the
/// watermark to its commit_ts; a later transaction whose start_ts predates
/// that commit_ts must then abort via the watermark, even though it never
/// touches the evicted row directly.
#[test]
fn eviction_raises_watermark_and_forces_subsequent_abort() {
    let request_ring = Arc::new(Ring::new(16));
    let persist_ring = Arc::new(Ring::new(16));
    let oracle =
        TimestampOracle::open(Box::new(InMemoryTimestampStore::default()), 1_000_000, 100_000)
            .unwrap();
    let mut p = RequestProcessor::new(request_ring, persist_ring, oracle, 2, Timestamp::ZERO);

    // Row 0 lands in slot 0 (0 % 2 == 0).
    let t1 = match p.decide(Timestamp(1), &rows(&[0])) {
        Decision::Commit(ts, lw) => {
            assert_eq!(lw, Timestamp::ZERO);
            ts
        }
        Decision::Abort => panic!("expected commit"),
    };

    // Row 1 lands in slot 1 (1 % 2 == 1): no collision yet.
    let t2 = match p.decide(Timestamp(t1.value() + 1), &rows(&[1])) {
        Decision::Commit(ts, lw) => {
            assert_eq!(lw, Timestamp::ZERO);
            ts
        }
        Decision::Abort => panic!("expected commit"),
    };
    assert!(t2 > t1);

    // Row 2 also lands in slot 0 (2 % 2 == 0): collides with row 0's entry,
    // evicting it and raising the watermark to t1.
    let (t3, lw3) = match p.decide(Timestamp(t2.value() + 1), &rows(&[2])) {
        Decision::Commit(ts, lw) => (ts, lw),
        Decision::Abort => panic!("expected commit"),
    };
    assert_eq!(lw3, t1);
    p.set_low_watermark(lw3);
    assert!(t3 > t2);

    // A transaction whose start_ts predates t1 must now abort via the
    // watermark, even though it writes row 0 again (whose entry is gone).
    let d = p.decide(Timestamp(t1.value() - 1), &rows(&[0]));
    assert_eq!(d, Decision::Abort);
}
