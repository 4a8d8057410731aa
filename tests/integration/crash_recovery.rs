use tso::oracle::store::FileTimestampStore;
use tso::oracle::TimestampOracle;
use tso::persistence::log::{CommitLog, LogRecord};
use tso::persistence::recover_low_watermark;
use tso::Timestamp;

/// Invariant 1: strict timestamp monotonicity is preserved across a
/// simulated crash and restart — the oracle re-reads its persisted ceiling
/// and resumes strictly above every value it handed out before the crash.
#[test]
fn oracle_monotonicity_survives_simulated_crash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ceiling");

    let last_before_crash;
    {
        let mut oracle =
            TimestampOracle::open(Box::new(FileTimestampStore::new(&path)), 8, 2).unwrap();
        for _ in 0..5 {
            oracle.next().unwrap();
        }
        last_before_crash = oracle.last();
        // Oracle is dropped here without any explicit shutdown, simulating
        // a crash mid-epoch.
    }

    let mut reopened =
        TimestampOracle::open(Box::new(FileTimestampStore::new(&path)), 8, 2).unwrap();
    let first_after_restart = reopened.next().unwrap();
    assert!(first_after_restart > last_before_crash);

    let mut prev = first_after_restart;
    for _ in 0..20 {
        let ts = reopened.next().unwrap();
        assert!(ts > prev);
        prev = ts;
    }
}

/// Invariant 3/5: the low-watermark recovered from the commit log after a
/// restart is the highest value durably logged before the crash, and never
/// regresses to something lower.
#[test]
fn low_watermark_recovers_to_highest_durable_value() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("commit.log");

    {
        let mut log = CommitLog::open(&log_path).unwrap();
        log.append_batch(&[
            LogRecord::LowWatermark { lw: Timestamp(10) },
            LogRecord::LowWatermark { lw: Timestamp(25) },
        ])
        .unwrap();
        log.sync().unwrap();
        // A batch that never crosses the durability barrier (simulated by
        // just not calling sync here) still gets written to the OS buffer
        // in this in-process test, so we instead model "never durable" by
        // simply not appending it at all — the crash happens before this
        // decision was even batched.
    }

    let recovered = recover_low_watermark(&log_path).unwrap();
    assert_eq!(recovered, Timestamp(25));

    // Recovering again (idempotent replay) must not regress.
    let recovered_again = recover_low_watermark(&log_path).unwrap();
    assert_eq!(recovered_again, recovered);
}
