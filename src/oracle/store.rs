//! Pluggable backends for the oracle's durable allocation ceiling. The
//! design names two external backends (a coordination-service znode, or a
//! row in the underlying column store); both are represented here by the
//! same trait, with [`FileTimestampStore`] standing in as the durable
//! implementation used by the demo binary and every test that exercises
//! crash recovery.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{OracleError, Result};

/// Durable storage for the oracle's allocation ceiling. `cas_write_ceiling`
/// must only succeed if `expected` still matches the last value returned by
/// `read_ceiling` or a prior successful `cas_write_ceiling` — this mirrors a
/// coordination service's conditional-set-by-version semantics, or a
/// column-store row's compare-and-swap cell write.
pub trait TimestampStore: Send + Sync {
    /// Reads the current ceiling, or `0` if none has ever been written.
    fn read_ceiling(&self) -> Result<u64>;
    /// Conditionally advances the ceiling to `new`, failing if the stored
    /// value no longer matches `expected`.
    fn cas_write_ceiling(&self, expected: u64, new: u64) -> Result<()>;
}

/// An in-memory store with no durability, used by fast unit tests that do
/// not exercise crash recovery.
#[derive(Default)]
pub struct InMemoryTimestampStore {
    ceiling: Mutex<u64>,
}

impl TimestampStore for InMemoryTimestampStore {
    fn read_ceiling(&self) -> Result<u64> {
        Ok(*self.ceiling.lock().unwrap())
    }

    fn cas_write_ceiling(&self, expected: u64, new: u64) -> Result<()> {
        let mut guard = self.ceiling.lock().unwrap();
        if *guard != expected {
            return Err(OracleError::Invalid(format!(
                "ceiling cas mismatch: expected {expected}, found {}",
                *guard
            )));
        }
        *guard = new;
        Ok(())
    }
}

/// A durable, single-file ceiling store: the ceiling is written as a
/// big-endian `u64` to a temp file in the same directory, fsynced, then
/// atomically renamed over the real path. This is the write pattern a
/// coordination-service znode write or a column-store cell write both
/// reduce to from the oracle's point of view, and it is what
/// `TimestampStoreKind::File` uses directly.
pub struct FileTimestampStore {
    path: PathBuf,
    /// Serializes read-modify-write so concurrent `cas_write_ceiling`
    /// callers observe a consistent version, even though in this design the
    /// oracle is only ever driven from one thread.
    guard: Mutex<()>,
}

impl FileTimestampStore {
    /// Opens (or prepares to create) a ceiling store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }
}

impl TimestampStore for FileTimestampStore {
    fn read_ceiling(&self) -> Result<u64> {
        let _lock = self.guard.lock().unwrap();
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(buf))
            }
            Ok(bytes) => Err(OracleError::Corruption(format!(
                "ceiling file has unexpected length {}",
                bytes.len()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(OracleError::Io(e)),
        }
    }

    fn cas_write_ceiling(&self, expected: u64, new: u64) -> Result<()> {
        let _lock = self.guard.lock().unwrap();
        let current = match std::fs::read(&self.path) {
            Ok(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                u64::from_be_bytes(buf)
            }
            Ok(_) => return Err(OracleError::Corruption("ceiling file malformed".into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(OracleError::Io(e)),
        };
        if current != expected {
            return Err(OracleError::Invalid(format!(
                "ceiling cas mismatch: expected {expected}, found {current}"
            )));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_sibling(&self.path);
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(&new.to_be_bytes())?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            // Best effort: fsync the directory entry so the rename survives
            // a crash on filesystems that require it explicitly.
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
