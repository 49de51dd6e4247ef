//! Advisory lock on the target file.
//!
//! Design:
//! - The lock is taken on the target's own descriptor (no sidecar lock file).
//! - Acquisition is non-blocking: contention is reported, never waited out.
//! - The guard owns a duplicate of the target descriptor so the write handle can be
//!   closed before the lock is dropped (commit order: sync, close, then unlock).
//!
//! Notes:
//! - Unix: flock(LOCK_EX | LOCK_NB) through fs2. Locks belong to the open file
//!   description, so two opens of the same path contend even inside one process.
//! - Windows: LockFileEx through fs2.

use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use crate::errors::AtomicWriteError;

/// RAII guard for the exclusive advisory lock. Released exactly once:
/// by `release()` or, failing that, on drop.
pub(crate) struct TargetLock {
    file: Option<File>,
    path: PathBuf,
}

impl TargetLock {
    /// Try to lock `target` (already opened as `file`) without blocking.
    pub(crate) fn try_acquire(file: &File, path: &Path) -> Result<Self, AtomicWriteError> {
        let dup = file
            .try_clone()
            .map_err(|e| AtomicWriteError::io("duplicate target handle", path, e))?;

        match dup.try_lock_exclusive() {
            Ok(()) => {
                trace!(path = %path.display(), "target lock acquired");
                Ok(TargetLock {
                    file: Some(dup),
                    path: path.to_path_buf(),
                })
            }
            Err(e) if is_contended(&e) => {
                trace!(path = %path.display(), "target lock held elsewhere");
                Err(AtomicWriteError::LockContention {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => Err(AtomicWriteError::io("lock target", path, e)),
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Unlock and close the duplicate descriptor. Idempotent; failures are logged.
    pub(crate) fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                // Closing the descriptor below drops the lock anyway.
                warn!(path = %self.path.display(), error = %e, "unable to release lock on file");
            } else {
                trace!(path = %self.path.display(), "target lock released");
            }
        }
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
