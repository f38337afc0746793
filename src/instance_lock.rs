//! Single-instance guard.
//!
//! Two bots polling with the same token steal each other's updates, so the
//! process holds an exclusive advisory lock on a PID file for its lifetime.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another instance is already running (pid {})", .pid.map_or("unknown".to_string(), |p| p.to_string()))]
    AlreadyRunning { pid: Option<u32> },
    #[error("cannot use PID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held lock on the PID file; released and removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, InstanceLockError> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source| InstanceLockError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        if file.try_lock_exclusive().is_err() {
            let mut content = String::new();
            let pid = file
                .read_to_string(&mut content)
                .ok()
                .and_then(|_| content.trim().parse().ok());
            return Err(InstanceLockError::AlreadyRunning { pid });
        }

        file.set_len(0).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        write!(file, "{}", std::process::id()).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        info!(pid = std::process::id(), path = %path.display(), "Acquired instance lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(error = %e, path = %self.path.display(), "Failed to remove PID file");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to release instance lock");
        }
    }
}
