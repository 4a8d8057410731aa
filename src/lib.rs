//! # tso - Timestamp Oracle and Conflict-Detection Server
//!
//! `tso` is the core of a snapshot-isolation transaction manager for a
//! wide-column store: a strictly monotonic timestamp oracle, a
//! single-threaded conflict-detection engine, and a durable, batching
//! persistence stage, wired together as a three-stage pipeline over
//! bounded multi-producer/single-consumer ring buffers.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tso::config::Config;
//! use tso::events::{Reply, ReplyChannel};
//! use tso::pipeline::Pipeline;
//!
//! struct PrintClient;
//! impl ReplyChannel for PrintClient {
//!     fn send_reply(&self, reply: Reply) {
//!         println!("{reply:?}");
//!     }
//! }
//!
//! let cfg = Config::default();
//! let pipeline = Pipeline::start(&cfg)?;
//! pipeline.timestamp_request(Arc::new(PrintClient));
//! # Ok::<(), tso::error::OracleError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`oracle`]: the durable, batch-allocating timestamp counter.
//! - [`conflict_map`]: the bounded, direct-mapped write-set cache.
//! - [`request_processor`]: the single-threaded commit/abort decision engine.
//! - [`persistence`]: the batching, fsync-barrier-gated durability stage.
//! - [`ring`]: the bounded MPSC ring buffer connecting the stages.
//! - [`pipeline`]: explicit construct-from-config wiring of the above.
//!
//! Everything outside the core — the wire protocol, cluster coordination,
//! the client-side transaction manager, and the column-store integration —
//! is out of scope; [`net`] is a thin illustrative HTTP front-end, not a
//! stand-in for any of those.

#![forbid(unsafe_code)]

pub mod admin;
pub mod cli;
pub mod config;
pub mod conflict_map;
pub mod error;
pub mod events;
pub mod metrics;
#[cfg(feature = "net")]
pub mod net;
pub mod oracle;
pub mod persistence;
pub mod pipeline;
pub mod request_processor;
pub mod ring;
pub mod types;

pub use crate::config::Config;
pub use crate::error::{OracleError, Result};
pub use crate::events::{Client, Reply, ReplyChannel};
pub use crate::pipeline::Pipeline;
pub use crate::types::{RowFingerprint, Timestamp};
