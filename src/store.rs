//! On-disk persistence of ledger state.
//!
//! Only plant records and their histories are stored. Owner index and
//! current snapshots are derived again on restore, so a stored file cannot
//! describe a state that breaks the ownership invariant.

use crate::core::types::HealthSnapshot;
use crate::ledger::registry::PlantRecord;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current format version.
pub const STORE_VERSION: u32 = 1;

/// How long a mutation waits for another process to release the state file.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported store version {0}")]
    Version(u32),
    #[error("Corrupt ledger state: {0}")]
    Corrupt(String),
    #[error("Ledger state {0:?} is locked by another process")]
    Locked(PathBuf),
}

/// A plant and its full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlant {
    pub plant: PlantRecord,
    #[serde(default)]
    pub history: Vec<HealthSnapshot>,
}

/// Serializable ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    /// Registry plant counter
    pub total_plants: u64,
    /// Sequence number of the last emitted event
    #[serde(default)]
    pub last_sequence: u64,
    pub plants: Vec<StoredPlant>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            total_plants: 0,
            last_sequence: 0,
            plants: Vec::new(),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a snapshot to `path`, replacing any previous file.
///
/// The data goes to a uniquely named sibling temp file first and is renamed
/// into place, so concurrent writers never share a temp file and readers
/// only ever see a complete snapshot.
pub fn save(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;

    let json = serde_json::to_string_pretty(snapshot)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".ledger-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_error(dir))?;
    tmp.write_all(json.as_bytes()).map_err(io_error(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_error(tmp.path()))?;
    tmp.persist(path).map_err(|e| io_error(path)(e.error))?;

    tracing::debug!(path = ?path, plants = snapshot.plants.len(), "ledger state saved");
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Lock file guarding `path` (`ledger.json` -> `ledger.json.lock`).
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Run `f` while holding an exclusive advisory lock on the state file.
///
/// Every load-mutate-save cycle on a shared state file must run inside this
/// lock, otherwise a concurrent writer can overwrite accepted mutations.
/// Gives up with [`StoreError::Locked`] after `timeout`.
pub fn with_exclusive_lock<T, E>(
    path: &Path,
    timeout: Duration,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    let lock_path = lock_path(path);
    let dir = parent_dir(&lock_path);
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(io_error(&lock_path))?;
    let mut lock = fd_lock::RwLock::new(file);

    let started = Instant::now();
    loop {
        match lock.try_write() {
            Ok(_guard) => return f(),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if started.elapsed() >= timeout {
                    return Err(StoreError::Locked(path.to_path_buf()).into());
                }
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(io_error(&lock_path)(e).into()),
        }
    }
}

/// Read a snapshot from `path`.
pub fn load(path: &Path) -> Result<LedgerSnapshot, StoreError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    let snapshot: LedgerSnapshot = serde_json::from_str(&content)?;
    if snapshot.version != STORE_VERSION {
        return Err(StoreError::Version(snapshot.version));
    }
    Ok(snapshot)
}

/// Read a snapshot, or return `None` if the file does not exist yet.
pub fn load_if_exists(path: &Path) -> Result<Option<LedgerSnapshot>, StoreError> {
    if path.exists() {
        load(path).map(Some)
    } else {
        Ok(None)
    }
}
