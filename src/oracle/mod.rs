//! The timestamp oracle: a strictly monotonic 64-bit counter whose values
//! survive process restarts by persisting an allocation ceiling in large
//! batches rather than fsyncing on every call.

pub mod store;

use crate::error::Result;
use crate::types::Timestamp;
use store::TimestampStore;

/// Hands out strictly increasing timestamps, persisting a new allocation
/// ceiling ahead of exhaustion so `next()` only blocks on I/O once every
/// `batch_size` calls.
///
/// `next()` is only ever called from the request processor's single
/// consumer thread, so the oracle itself needs no internal locking beyond
/// what its backing [`TimestampStore`] requires.
pub struct TimestampOracle {
    store: Box<dyn TimestampStore>,
    cur: u64,
    ceiling: u64,
    batch_size: u64,
    threshold: u64,
}

impl TimestampOracle {
    /// Opens the oracle against `store`, reading the persisted ceiling as
    /// the recovery point. `cur` starts at the ceiling, so recovery skips
    /// at most one unused batch rather than ever reusing a value.
    pub fn open(store: Box<dyn TimestampStore>, batch_size: u64, threshold: u64) -> Result<Self> {
        let ceiling = store.read_ceiling()?;
        Ok(Self {
            store,
            cur: ceiling,
            ceiling,
            batch_size: batch_size.max(1),
            threshold: threshold.max(1),
        })
    }

    /// Returns a timestamp strictly greater than every timestamp this
    /// oracle (across all restarts, via the persisted ceiling) has ever
    /// returned.
    ///
    /// Persistence failure while crossing a batch boundary is a fatal
    /// condition; callers on the request-processor thread should treat a
    /// returned error as grounds to call [`crate::error::fatal`].
    pub fn next(&mut self) -> Result<Timestamp> {
        if self.cur.saturating_add(self.threshold) >= self.ceiling {
            let new_ceiling = self.cur.saturating_add(self.batch_size);
            self.store.cas_write_ceiling(self.ceiling, new_ceiling)?;
            self.ceiling = new_ceiling;
            crate::metrics::record_oracle_batch_persist();
        }
        self.cur += 1;
        Ok(Timestamp(self.cur))
    }

    /// Returns the most recently issued timestamp, or `Timestamp::ZERO` if
    /// `next()` has never been called on this oracle instance.
    pub fn last(&self) -> Timestamp {
        Timestamp(self.cur)
    }

    /// The current persisted ceiling; exposed for status reporting only.
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}
