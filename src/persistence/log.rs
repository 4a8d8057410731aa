//! The durable commit log: an append-only byte stream of length-prefixed,
//! checksummed, kind-tagged records, written by the persistence stage and
//! scanned forward once at startup to recover the low-watermark.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{OracleError, Result};
use crate::types::Timestamp;

const KIND_TIMESTAMP: u8 = 1;
const KIND_COMMIT: u8 = 2;
const KIND_ABORT: u8 = 3;
const KIND_LOW_WATERMARK: u8 = 4;

/// One durable record, as recovered by [`CommitLog::replay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A start timestamp was handed out.
    Timestamp {
        /// The allocated timestamp.
        ts: Timestamp,
    },
    /// A transaction committed.
    Commit {
        /// The transaction's start timestamp.
        start_ts: Timestamp,
        /// The allocated commit timestamp.
        commit_ts: Timestamp,
    },
    /// A transaction aborted.
    Abort {
        /// The transaction's start timestamp.
        start_ts: Timestamp,
        /// Whether the client had already retried once.
        is_retry: bool,
    },
    /// The low-watermark advanced.
    LowWatermark {
        /// The new low-watermark.
        lw: Timestamp,
    },
}

impl LogRecord {
    fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            LogRecord::Timestamp { ts } => {
                out.push(KIND_TIMESTAMP);
                out.extend_from_slice(&ts.0.to_be_bytes());
            }
            LogRecord::Commit {
                start_ts,
                commit_ts,
            } => {
                out.push(KIND_COMMIT);
                out.extend_from_slice(&start_ts.0.to_be_bytes());
                out.extend_from_slice(&commit_ts.0.to_be_bytes());
            }
            LogRecord::Abort {
                start_ts,
                is_retry,
            } => {
                out.push(KIND_ABORT);
                out.extend_from_slice(&start_ts.0.to_be_bytes());
                out.push(is_retry as u8);
            }
            LogRecord::LowWatermark { lw } => {
                out.push(KIND_LOW_WATERMARK);
                out.extend_from_slice(&lw.0.to_be_bytes());
            }
        }
    }

    fn decode(body: &[u8]) -> Result<Self> {
        let kind = *body
            .first()
            .ok_or_else(|| OracleError::Corruption("empty log record".into()))?;
        let rest = &body[1..];
        let read_u64 = |b: &[u8]| -> Result<u64> {
            let arr: [u8; 8] = b
                .try_into()
                .map_err(|_| OracleError::Corruption("truncated timestamp field".into()))?;
            Ok(u64::from_be_bytes(arr))
        };
        match kind {
            KIND_TIMESTAMP => Ok(LogRecord::Timestamp {
                ts: Timestamp(read_u64(rest)?),
            }),
            KIND_COMMIT => {
                if rest.len() != 16 {
                    return Err(OracleError::Corruption("malformed commit record".into()));
                }
                Ok(LogRecord::Commit {
                    start_ts: Timestamp(read_u64(&rest[0..8])?),
                    commit_ts: Timestamp(read_u64(&rest[8..16])?),
                })
            }
            KIND_ABORT => {
                if rest.len() != 9 {
                    return Err(OracleError::Corruption("malformed abort record".into()));
                }
                Ok(LogRecord::Abort {
                    start_ts: Timestamp(read_u64(&rest[0..8])?),
                    is_retry: rest[8] != 0,
                })
            }
            KIND_LOW_WATERMARK => Ok(LogRecord::LowWatermark {
                lw: Timestamp(read_u64(rest)?),
            }),
            other => Err(OracleError::Corruption(format!(
                "unknown log record kind {other}"
            ))),
        }
    }
}

/// The result of replaying a commit log at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOutcome {
    /// Highest low-watermark observed in the log, or `Timestamp::ZERO` if
    /// none was ever written.
    pub low_watermark: Timestamp,
    /// Highest start/commit timestamp observed in the log, for a sanity
    /// cross-check against the oracle's recovered ceiling.
    pub highest_timestamp: Timestamp,
    /// Number of records successfully replayed.
    pub records_replayed: u64,
}

/// Append-only, checksummed commit log.
pub struct CommitLog {
    path: PathBuf,
    file: File,
}

impl CommitLog {
    /// Opens (creating if needed) the log file at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Appends `records` to the log as a single write, without issuing a
    /// durability barrier. Callers batch several records and call
    /// [`CommitLog::sync`] once per batch.
    pub fn append_batch(&mut self, records: &[LogRecord]) -> Result<()> {
        let mut buf = Vec::new();
        for record in records {
            let mut body = Vec::new();
            record.encode(&mut body);
            let crc = crc32fast::hash(&body);
            buf.extend_from_slice(&(body.len() as u32 + 4).to_be_bytes());
            buf.extend_from_slice(&body);
            buf.extend_from_slice(&crc.to_be_bytes());
        }
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Issues the durability barrier. Must be called after
    /// [`CommitLog::append_batch`] and before any reply derived from the
    /// just-appended records is released.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Scans the log from the start, validating checksums and folding
    /// every record into a [`ReplayOutcome`]. A truncated final record
    /// (a torn write from a crash mid-append) is tolerated and ignored;
    /// anything else that fails to decode is a corruption error.
    pub fn replay(path: impl AsRef<Path>) -> Result<ReplayOutcome> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ReplayOutcome::default()),
            Err(e) => return Err(OracleError::Io(e)),
        };
        let mut reader = BufReader::new(file);
        let mut outcome = ReplayOutcome::default();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(OracleError::Io(e)),
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            if len < 4 {
                // A well-formed record always carries at least a crc.
                break;
            }
            let mut body = vec![0u8; len];
            if reader.read_exact(&mut body).is_err() {
                // Torn write at the tail: stop, the batch that produced it
                // never crossed the durability barrier.
                break;
            }
            let (record_bytes, crc_bytes) = body.split_at(len - 4);
            let expected_crc = u32::from_be_bytes(crc_bytes.try_into().unwrap());
            if crc32fast::hash(record_bytes) != expected_crc {
                break;
            }
            let record = match LogRecord::decode(record_bytes) {
                Ok(r) => r,
                Err(_) => break,
            };
            match record {
                LogRecord::Timestamp { ts } => {
                    outcome.highest_timestamp = outcome.highest_timestamp.max(ts);
                }
                LogRecord::Commit {
                    start_ts,
                    commit_ts,
                } => {
                    outcome.highest_timestamp =
                        outcome.highest_timestamp.max(start_ts).max(commit_ts);
                }
                LogRecord::Abort { start_ts, .. } => {
                    outcome.highest_timestamp = outcome.highest_timestamp.max(start_ts);
                }
                LogRecord::LowWatermark { lw } => {
                    outcome.low_watermark = outcome.low_watermark.max(lw);
                }
            }
            outcome.records_replayed += 1;
        }
        Ok(outcome)
    }

    /// Path backing this log, for diagnostics.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
