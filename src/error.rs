use std::io;

use thiserror::Error;

/// Errors surfaced by the oracle, conflict-detection, and persistence stages.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Underlying file or network I/O failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A durable record was malformed or failed its checksum on replay.
    #[error("corrupt record: {0}")]
    Corruption(String),
    /// Caller supplied a value the core refuses to operate on.
    #[error("invalid input: {0}")]
    Invalid(String),
    /// Configuration could not be parsed or violates a documented constraint.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// An unrecoverable condition that must stop the process (see policy table).
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OracleError>;

/// Logs `err` at `error` level tagged with `component`, then terminates the
/// process. Used for conditions with no safe degraded mode: oracle
/// allocation failure, commit log write/barrier failure, and queue overflow
/// past deadline.
pub fn fatal(component: &str, err: &OracleError) -> ! {
    tracing::error!(component, %err, "fatal error, stopping process");
    std::process::exit(1)
}
