use tso::oracle::store::InMemoryTimestampStore;
use tso::oracle::TimestampOracle;
use tso::Timestamp;

/// S1: a freshly initialized oracle returns 1, 2, 3, ... — the first
/// returned value is 1, and every subsequent value is strictly greater than
/// the last.
#[test]
fn basic_monotonic_timestamps() {
    let mut oracle =
        TimestampOracle::open(Box::new(InMemoryTimestampStore::default()), 1_000_000, 100_000)
            .unwrap();

    assert_eq!(oracle.next().unwrap(), Timestamp(1));
    assert_eq!(oracle.next().unwrap(), Timestamp(2));
    assert_eq!(oracle.next().unwrap(), Timestamp(3));
    assert_eq!(oracle.last(), Timestamp(3));
}
