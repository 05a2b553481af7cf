//! Modification-time polling of the local database file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Poll interval of the daemon loop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settle time after a change before pushing, so the brewing application
/// can finish writing.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Reports whether a file changed since the previous poll.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FileWatcher {
    /// Start watching; the current modification time is the baseline.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let last_modified = Some(modified(&path)?);
        Ok(Self {
            path,
            last_modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` once per change of the modification time. A file that
    /// disappears is not a change; its reappearance is.
    pub fn poll_changed(&mut self) -> io::Result<bool> {
        let current = match modified(&self.path) {
            Ok(current) => current,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                self.last_modified = None;
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        if self.last_modified == Some(current) {
            return Ok(false);
        }
        tracing::debug!("{} modified", self.path.display());
        self.last_modified = Some(current);
        Ok(true)
    }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}
