//! The tagged event types carried across the request ring and the
//! persistence ring, and the reply-delivery seam clients implement.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::types::{RowFingerprint, Timestamp};

/// Number of row fingerprints a commit event can hold inline before
/// spilling to the heap. Chosen so the common small-write-set case never
/// allocates on the hot path.
pub const INLINE_ROWS: usize = 40;

/// Write-set of a commit request: a small inline buffer backed by a
/// spillover container, so most transactions touch the heap zero times.
pub type RowSet = SmallVec<[RowFingerprint; INLINE_ROWS]>;

/// Reply delivered back to a network client once a request has been
/// decided (and, for commits, made durable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to a `timestamp_request`.
    Timestamp {
        /// The newly allocated timestamp.
        ts: Timestamp,
    },
    /// Answer to a `commit_request` that committed.
    Commit {
        /// The start timestamp the request was issued for.
        start_ts: Timestamp,
        /// The commit timestamp allocated for the transaction.
        commit_ts: Timestamp,
    },
    /// Answer to a `commit_request` that aborted.
    Abort {
        /// The start timestamp the request was issued for.
        start_ts: Timestamp,
        /// Whether the caller had already marked this as a retry.
        is_retry: bool,
    },
}

/// The seam through which the core delivers replies back to whatever
/// network front-end accepted the original request. A client handle may be
/// implemented over a TCP connection, an async response channel, or (in
/// tests) an in-memory collector.
pub trait ReplyChannel: Send + Sync {
    /// Delivers `reply` to this client. Implementations for a closed or
    /// disconnected client should treat this as a no-op rather than erroring
    /// — the persistence stage silently drops replies to dead clients.
    fn send_reply(&self, reply: Reply);
}

/// A type-erased, cheaply cloneable handle to a client's reply channel.
pub type Client = Arc<dyn ReplyChannel>;

/// An event produced by the network front-end and consumed by the request
/// processor.
pub enum RequestEvent {
    /// Request for a fresh start timestamp.
    Timestamp {
        /// Client to reply to.
        client: Client,
    },
    /// Request to validate and commit a transaction.
    Commit {
        /// The transaction's start timestamp.
        start_ts: Timestamp,
        /// The rows the transaction wrote, in client-supplied order.
        /// Duplicates are permitted and are processed once per occurrence.
        rows: RowSet,
        /// Set when the client has already retried this commit once before
        /// (e.g. because it never observed a reply for the original
        /// attempt).
        is_retry: bool,
        /// Client to reply to.
        client: Client,
    },
}

/// An event produced by the request processor and consumed by the
/// persistence stage.
pub enum PersistEvent {
    /// A freshly allocated start timestamp, pending durability before its
    /// reply is released.
    Timestamp {
        /// The allocated timestamp.
        ts: Timestamp,
        /// Client to reply to once durable.
        client: Client,
    },
    /// A transaction that passed conflict detection.
    Commit {
        /// The transaction's start timestamp.
        start_ts: Timestamp,
        /// The newly allocated commit timestamp.
        commit_ts: Timestamp,
        /// Client to reply to once durable.
        client: Client,
    },
    /// A transaction that failed conflict detection or the watermark check.
    Abort {
        /// The transaction's start timestamp.
        start_ts: Timestamp,
        /// Echoes the request's retry flag back to the client.
        is_retry: bool,
        /// Client to reply to once durable.
        client: Client,
    },
    /// The low-watermark advanced as a side effect of a commit. Carries no
    /// client; the persistence stage coalesces repeated occurrences within
    /// a batch down to the highest value seen.
    LowWatermark {
        /// The new low-watermark.
        lw: Timestamp,
    },
}
