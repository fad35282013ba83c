//! Single-instance advisory lock
//!
//! The fingerprint log and stats file may be visible to several worker
//! processes; a pid-stamped lock file guarantees only one monitoring loop
//! runs system-wide. The lock is released on drop.

use crate::AdwatchError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Held for the lifetime of the monitoring loop
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Acquires the lock, failing if another instance holds it
    ///
    /// # Errors
    ///
    /// * `AdwatchError::LockHeld` - The lock file already exists; its
    ///   content (pid of the holder) is included in the message
    pub fn acquire(path: &Path) -> crate::Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                tracing::debug!("Acquired instance lock at {}", path.display());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown pid".to_string());
                Err(AdwatchError::LockHeld(format!(
                    "{} (pid {})",
                    path.display(),
                    holder
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                "Could not remove instance lock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
