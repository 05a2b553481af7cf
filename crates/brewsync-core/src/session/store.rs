//! Durable storage for session state across process runs.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{SessionError, SessionResult, SessionState};

pub trait StatePersistence: Send + Sync {
    fn load(&self) -> SessionResult<Option<SessionState>>;
    fn save(&self, state: &SessionState) -> SessionResult<()>;
    fn clear(&self) -> SessionResult<()>;
}

/// One JSON file per account under a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    account: String,
}

impl FileStateStore {
    pub fn for_account(dir: impl AsRef<Path>, account: &str) -> Self {
        Self {
            path: dir.as_ref().join(state_file_name(account)),
            account: account.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn state_file_name(account: &str) -> String {
    let stem: String = account
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "default.json".to_string()
    } else {
        format!("{stem}.json")
    }
}

fn storage_error(path: &Path, error: impl std::fmt::Display) -> SessionError {
    SessionError::Storage(format!("{}: {error}", path.display()))
}

impl StatePersistence for FileStateStore {
    fn load(&self) -> SessionResult<Option<SessionState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(storage_error(&self.path, error)),
        };

        let state: SessionState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(
                    "Ignoring unreadable session state {}: {}",
                    self.path.display(),
                    error
                );
                return Ok(None);
            }
        };

        if state.account != self.account {
            tracing::debug!(
                "Session state {} belongs to another account",
                self.path.display()
            );
            return Ok(None);
        }

        tracing::info!("Read session state from {}", self.path.display());
        Ok(Some(state))
    }

    fn save(&self, state: &SessionState) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| storage_error(parent, error))?;
        }

        let raw = serde_json::to_string_pretty(state)
            .map_err(|error| storage_error(&self.path, error))?;
        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, raw.as_bytes()).map_err(|error| storage_error(&temp_path, error))?;
        fs::rename(&temp_path, &self.path).map_err(|error| storage_error(&self.path, error))?;

        tracing::info!("Saved session state to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed session state {}", self.path.display());
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_error(&self.path, error)),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    slot: Arc<Mutex<Option<SessionState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SessionState) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(state))),
        }
    }

    pub fn snapshot(&self) -> Option<SessionState> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StatePersistence for MemoryStateStore {
    fn load(&self) -> SessionResult<Option<SessionState>> {
        let guard = self
            .slot
            .lock()
            .map_err(|error| SessionError::Storage(error.to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &SessionState) -> SessionResult<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|error| SessionError::Storage(error.to_string()))?;
        *guard = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|error| SessionError::Storage(error.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::test_support::sample_state;

    #[test]
    fn file_store_round_trips_state() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::for_account(dir.path(), "brewer@example.com");
        assert!(store.load().unwrap().is_none());

        let state = sample_state("brewer@example.com");
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
        assert_eq!(store.path().file_name().unwrap(), "brewer@example.com.json");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileStateStore::for_account(dir.path().join("nested"), "brewer");
        store.save(&sample_state("brewer")).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_store_rechecks_account() {
        let dir = tempdir().unwrap();
        // Both accounts map to the same file name.
        let first = FileStateStore::for_account(dir.path(), "a/b");
        let second = FileStateStore::for_account(dir.path(), "a_b");
        assert_eq!(first.path(), second.path());

        first.save(&sample_state("a/b")).unwrap();
        assert!(second.load().unwrap().is_none());
        assert!(first.load().unwrap().is_some());
    }

    #[test]
    fn corrupt_state_is_ignored() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::for_account(dir.path(), "brewer");
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStateStore::new();
        let clone = store.clone();
        store.save(&sample_state("brewer")).unwrap();
        assert_eq!(clone.snapshot().map(|state| state.account), Some("brewer".to_string()));
        clone.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
