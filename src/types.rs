//! Core scalar types shared across the oracle, conflict-detection, and
//! persistence stages.

use std::fmt;

use serde::Serialize;

/// A 64-bit logical timestamp. Strictly increasing across the process
/// lifetime and across restarts (see [`crate::oracle`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The zero timestamp, used as the initial low-watermark and as the
    /// sentinel "no timestamp issued yet" value.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Returns the raw integer value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(v: u64) -> Self {
        Timestamp(v)
    }
}

impl From<Timestamp> for u64 {
    fn from(t: Timestamp) -> Self {
        t.0
    }
}

/// An opaque fingerprint identifying a row a transaction reads or writes.
/// Produced by the client from (table, row-key, column-family, qualifier) or
/// an equivalent cell identifier; the core never interprets its bits beyond
/// using them as a conflict-map key. Collisions are possible and must be
/// treated as conservative false conflicts, never a silent commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowFingerprint(pub u64);

impl fmt::Display for RowFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<u64> for RowFingerprint {
    fn from(v: u64) -> Self {
        RowFingerprint(v)
    }
}
