use tso::events::RowSet;
use tso::oracle::store::InMemoryTimestampStore;
use tso::oracle::TimestampOracle;
use tso::request_processor::{Decision, RequestProcessor};
use tso::ring::Ring;
use tso::{RowFingerprint, Timestamp};
use std::sync::Arc;

fn processor(capacity: usize) -> RequestProcessor {
    let request_ring = Arc::new(Ring::new(16));
    let persist_ring = Arc::new(Ring::new(16));
    let oracle =
        TimestampOracle::open(Box::new(InMemoryTimestampStore::default()), 1_000_000, 100_000)
            .unwrap();
    RequestProcessor::new(request_ring, persist_ring, oracle, capacity, Timestamp::ZERO)
}

fn rows(vals: &[u64]) -> RowSet {
    vals.iter().map(|&v| RowFingerprint(v)).collect()
}

/// S2: two transactions writing disjoint rows both commit, building up the
/// conflict map with no watermark movement.
#[test]
fn non_conflicting_commits_both_succeed() {
    let mut p = processor(1024);

    let d1 = p.decide(Timestamp(1), &rows(&[0xA]));
    let commit_ts_a = match d1 {
        Decision::Commit(ts, lw) => {
            assert_eq!(lw, Timestamp::ZERO);
            ts
        }
        Decision::Abort => panic!("expected commit"),
    };

    let d2 = p.decide(Timestamp(1), &rows(&[0xB]));
    let commit_ts_b = match d2 {
        Decision::Commit(ts, lw) => {
            assert_eq!(lw, Timestamp::ZERO);
            ts
        }
        Decision::Abort => panic!("expected commit"),
    };

    assert!(commit_ts_b > commit_ts_a);
    assert_eq!(p.low_watermark(), Timestamp::ZERO);
}

/// S3: a second transaction whose write-set intersects a just-committed
/// transaction's write-set, and whose start_ts does not postdate the
/// commit, must abort.
#[test]
fn write_write_conflict_aborts_the_later_committer() {
    let mut p = processor(1024);

    let d1 = p.decide(Timestamp(1), &rows(&[0xA]));
    assert!(matches!(d1, Decision::Commit(_, _)));

    // Started before the first transaction's commit_ts landed -> conflict.
    let d2 = p.decide(Timestamp(1), &rows(&[0xA]));
    assert_eq!(d2, Decision::Abort);
}

/// A start_ts exactly equal to the recorded commit_ts is still a conflict.
#[test]
fn start_ts_equal_to_recorded_commit_ts_is_a_conflict() {
    let mut p = processor(1024);
    let commit_ts = match p.decide(Timestamp(1), &rows(&[0x1])) {
        Decision::Commit(ts, _) => ts,
        Decision::Abort => panic!("expected commit"),
    };
    let d = p.decide(commit_ts, &rows(&[0x1]));
    assert_eq!(d, Decision::Abort);
}

/// A start_ts strictly after the recorded commit_ts is safe.
#[test]
fn start_ts_after_recorded_commit_ts_is_safe() {
    let mut p = processor(1024);
    let commit_ts = match p.decide(Timestamp(1), &rows(&[0x1])) {
        Decision::Commit(ts, _) => ts,
        Decision::Abort => panic!("expected commit"),
    };
    let d = p.decide(Timestamp(commit_ts.value() + 1), &rows(&[0x1]));
    assert!(matches!(d, Decision::Commit(_, _)));
}

/// An empty write-set always commits (read-only transaction) and still
/// allocates a fresh commit timestamp.
#[test]
fn empty_write_set_commits() {
    let mut p = processor(1024);
    let d = p.decide(Timestamp(1), &rows(&[]));
    match d {
        Decision::Commit(ts, lw) => {
            assert!(ts > Timestamp(1));
            assert_eq!(lw, Timestamp::ZERO);
        }
        Decision::Abort => panic!("expected commit"),
    }
}

/// Duplicate rows within one write-set are each processed, ending with the
/// row pinned at the transaction's own commit_ts.
#[test]
fn duplicate_rows_in_one_write_set_end_at_commit_ts() {
    let mut p = processor(1024);
    let d = p.decide(Timestamp(1), &rows(&[0x9, 0x9, 0x9]));
    match d {
        Decision::Commit(ts, _) => {
            let d2 = p.decide(Timestamp(ts.value() + 1), &rows(&[0x9]));
            assert!(matches!(d2, Decision::Commit(_, _)));
        }
        Decision::Abort => panic!("expected commit"),
    }
}
