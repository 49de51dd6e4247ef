//! Atomic replace writer.
//!
//! `AtomicFileWriter` replaces the contents of a file in place while holding an
//! exclusive advisory lock on it, optionally keeping a byte-for-byte backup of the
//! previous contents next to it (`<target>.bak`).
//!
//! Lifecycle:
//!   new()  -> Open  -- create_backup() --> BackedUp
//!   write failure         -> Failed   (lock released, backup retained)
//!   abort()               -> Aborted  (buffered bytes flushed, lock released,
//!                                      backup deleted)
//!   close()               -> Closed   (synced, permissions restored, backup deleted
//!                                      unless kept, lock released)
//!
//! Notes:
//! - The target is opened without truncation and truncated just before the first
//!   byte reaches it, so `create_backup()` still sees the old contents.
//! - Buffered bytes reach the target on `abort()` as well as `close()`; only a
//!   failure or a drop without close/abort discards them.
//! - There is no automatic rollback. After a failure the backup is the recovery
//!   point; see `crate::restore::restore_from_backup`.
//! - One thread per instance. The type holds no internal synchronization.

mod backup;
pub(crate) mod helpers;
mod io_copy;
mod lock;
mod perms;
mod state;
mod util;

pub use backup::{BACKUP_SUFFIX, backup_path_for};
pub use helpers::io_error_with_help;
pub use perms::{FALLBACK_MODE, PermissionSnapshot};
pub use state::WriterState;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::errors::AtomicWriteError;
use lock::TargetLock;

const WRITE_BUF_SIZE: usize = 64 * 1024;

/// Byte sink that replaces a file's contents without leaving it half-written
/// behind another writer's back. See the module docs for the lifecycle.
pub struct AtomicFileWriter {
    target: PathBuf,
    backup: PathBuf,
    keep_backup: bool,
    out: Option<BufWriter<File>>,
    lock: TargetLock,
    state: WriterState,
    /// Target existed before we opened it.
    existed: bool,
    /// The target has been truncated and may hold new bytes.
    started: bool,
    permissions: Option<PermissionSnapshot>,
    bytes_written: u64,
    #[cfg(any(test, feature = "test-helpers"))]
    injected_failure: Option<io::ErrorKind>,
}

impl AtomicFileWriter {
    /// Open `path` for replacement; the backup is deleted after a successful close.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AtomicWriteError> {
        Self::with_keep_backup(path, false)
    }

    /// Open `path` for replacement, keeping the backup after a successful close
    /// when `keep_backup` is true.
    ///
    /// Fails with `LockContention` if another writer holds the lock on `path`.
    pub fn with_keep_backup(path: impl AsRef<Path>, keep_backup: bool) -> Result<Self, AtomicWriteError> {
        let target = path.as_ref().to_path_buf();
        let existed = target.exists();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&target)
            .map_err(|e| AtomicWriteError::io("open target", &target, e))?;

        let lock = TargetLock::try_acquire(&file, &target)?;

        // Silent best-effort capture; create_backup() re-reads with a fallback.
        let permissions = if existed {
            match PermissionSnapshot::capture(&target) {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!(path = %target.display(), error = %e, "could not read target permissions at open");
                    None
                }
            }
        } else {
            None
        };

        debug!(path = %target.display(), existed, keep_backup, "writer open");
        Ok(AtomicFileWriter {
            backup: backup_path_for(&target),
            target,
            keep_backup,
            out: Some(BufWriter::with_capacity(WRITE_BUF_SIZE, file)),
            lock,
            state: WriterState::Open,
            existed,
            started: false,
            permissions,
            bytes_written: 0,
            #[cfg(any(test, feature = "test-helpers"))]
            injected_failure: None,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Where the backup of the target lives (or would live). No I/O.
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn keeps_backup(&self) -> bool {
        self.keep_backup
    }

    /// Bytes accepted by `write` so far (buffered or not).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether this writer still holds the advisory lock.
    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Override the permission bits applied to the target on commit.
    pub fn set_permissions_on_commit(&mut self, snapshot: PermissionSnapshot) {
        self.permissions = Some(snapshot);
    }

    /// Copy the current target contents (and permission bits) to the backup path.
    ///
    /// Only valid right after construction, before any byte has been written. A
    /// no-op when the target did not exist. A failed copy is fatal: the writer
    /// moves to `Failed` and will not write without the requested backup.
    pub fn create_backup(&mut self) -> Result<(), AtomicWriteError> {
        if self.state != WriterState::Open {
            return Err(self.invalid("create backup"));
        }
        if self.started {
            return Err(self.invalid("create backup after writing began"));
        }
        if !self.existed {
            debug!(path = %self.target.display(), "target did not exist; nothing to back up");
            return Ok(());
        }

        let perms = match PermissionSnapshot::capture(&self.target) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    path = %self.target.display(),
                    error = %e,
                    fallback = format!("{:o}", FALLBACK_MODE),
                    "error getting file permissions; using fallback"
                );
                PermissionSnapshot::fallback()
            }
        };

        if let Err(e) = backup::write_backup(&self.target, &self.backup, &perms) {
            warn!(path = %self.target.display(), error = %e, "backup failed; refusing to write");
            self.fail();
            return Err(e);
        }

        self.permissions = Some(perms);
        self.state = WriterState::BackedUp;
        debug!(path = %self.target.display(), backup = %self.backup.display(), "writer backed up");
        Ok(())
    }

    /// Append `buf` to the target. On I/O failure the lock is released, the
    /// backup is left untouched and the writer moves to `Failed`.
    pub fn append(&mut self, buf: &[u8]) -> Result<(), AtomicWriteError> {
        if !self.state.accepts_writes() {
            return Err(self.invalid("write"));
        }
        if buf.is_empty() {
            return Ok(());
        }
        match self.write_through(buf) {
            Ok(()) => {
                self.bytes_written += buf.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.fail_with("write", e)),
        }
    }

    pub fn write_byte(&mut self, b: u8) -> Result<(), AtomicWriteError> {
        self.append(&[b])
    }

    /// Push buffered bytes to the OS (no durability barrier; `close` does that).
    pub fn flush_buffer(&mut self) -> Result<(), AtomicWriteError> {
        if !self.state.accepts_writes() {
            return Err(self.invalid("flush"));
        }
        let result = self.injected().and_then(|()| self.handle()?.flush());
        result.map_err(|e| self.fail_with("flush", e))
    }

    /// Give up on the replacement: flush what was written so far, close the target
    /// as-is, delete the backup and release the lock.
    pub fn abort(&mut self) -> Result<(), AtomicWriteError> {
        if !self.state.accepts_writes() {
            return Err(self.invalid("abort"));
        }
        if let Some(mut out) = self.out.take()
            && let Err(e) = out.flush()
        {
            debug!(path = %self.target.display(), error = %e, "unable to flush target while aborting");
            // A failed flush leaves the bytes in the buffer; don't retry on drop.
            let _ = out.into_parts();
        }
        if let Err(e) = backup::remove_backup(&self.backup) {
            debug!(path = %self.target.display(), error = %e, "unable to remove backup while aborting");
        }
        self.lock.release();
        self.state = WriterState::Aborted;
        debug!(path = %self.target.display(), bytes = self.bytes_written, "writer aborted");
        Ok(())
    }

    /// Commit: flush and fsync, close, restore permissions, drop the backup unless
    /// kept, release the lock. The lock is released on every path out of here.
    pub fn close(&mut self) -> Result<(), AtomicWriteError> {
        if !self.state.accepts_writes() {
            return Err(self.invalid("close"));
        }
        let result = self.commit();
        self.lock.release();
        result
    }

    fn commit(&mut self) -> Result<(), AtomicWriteError> {
        if let Err(e) = self.durable_flush() {
            return Err(self.fail_with("flush and sync", e));
        }
        // Buffer is empty here, so dropping the BufWriter only closes the file.
        drop(self.out.take());

        if let Some(perms) = &self.permissions
            && let Err(e) = perms.apply(&self.target)
        {
            warn!(
                path = %self.target.display(),
                error = %e,
                kind = "permission_restore",
                "error writing file permissions"
            );
        }

        if !self.keep_backup
            && let Err(e) = backup::remove_backup(&self.backup)
        {
            warn!(path = %self.backup.display(), error = %e, "unable to remove backup after commit");
        }

        self.state = WriterState::Closed;
        debug!(path = %self.target.display(), bytes = self.bytes_written, "writer closed");
        Ok(())
    }

    fn write_through(&mut self, buf: &[u8]) -> io::Result<()> {
        self.injected()?;
        self.start_writing()?;
        self.handle()?.write_all(buf)
    }

    fn durable_flush(&mut self) -> io::Result<()> {
        self.injected()?;
        self.start_writing()?;
        let out = self.handle()?;
        out.flush()?;
        out.get_ref().sync_all()
    }

    /// Truncate the target the first time new bytes (or an empty commit) reach it.
    fn start_writing(&mut self) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        let file = self.handle()?.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        self.started = true;
        trace!(path = %self.target.display(), "target truncated");
        Ok(())
    }

    fn handle(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.out
            .as_mut()
            .ok_or_else(|| io::Error::other("target handle already closed"))
    }

    /// Close the target without writing out what is still buffered.
    fn discard_handle(&mut self) {
        if let Some(out) = self.out.take() {
            let (file, unflushed) = out.into_parts();
            if let Ok(pending) = &unflushed
                && !pending.is_empty()
            {
                trace!(path = %self.target.display(), bytes = pending.len(), "discarded buffered bytes");
            }
            drop(file);
        }
    }

    fn fail(&mut self) {
        self.discard_handle();
        self.lock.release();
        self.state = WriterState::Failed;
    }

    fn fail_with(&mut self, op: &'static str, e: io::Error) -> AtomicWriteError {
        warn!(
            path = %self.target.display(),
            backup = %self.backup.display(),
            error = %e,
            "{op} failed; lock released"
        );
        self.fail();
        AtomicWriteError::io(op, &self.target, e)
    }

    fn invalid(&self, op: &'static str) -> AtomicWriteError {
        AtomicWriteError::InvalidState {
            op,
            state: self.state,
        }
    }

    /// Make the next write, flush or close fail with `kind`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn fail_next_io(&mut self, kind: io::ErrorKind) {
        self.injected_failure = Some(kind);
    }

    #[cfg(any(test, feature = "test-helpers"))]
    fn injected(&mut self) -> io::Result<()> {
        match self.injected_failure.take() {
            Some(kind) => Err(io::Error::new(kind, "injected failure")),
            None => Ok(()),
        }
    }

    #[cfg(not(any(test, feature = "test-helpers")))]
    #[inline]
    fn injected(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        Ok(())
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            warn!(
                path = %self.target.display(),
                "writer dropped without close or abort; unflushed bytes discarded, backup kept"
            );
            self.discard_handle();
        }
        // TargetLock releases itself on drop.
    }
}

impl std::fmt::Debug for AtomicFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFileWriter")
            .field("target", &self.target)
            .field("backup", &self.backup)
            .field("state", &self.state)
            .field("keep_backup", &self.keep_backup)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn fresh_target_round_trip() {
        let td = tempdir().unwrap();
        let p = td.path().join("new.txt");
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.create_backup().unwrap();
        assert_eq!(w.state(), WriterState::Open, "nothing to back up for a new file");
        w.write_all(b"fresh").unwrap();
        w.close().unwrap();
        assert_eq!(w.state(), WriterState::Closed);
        assert!(!w.is_locked());
        assert_eq!(fs::read(&p).unwrap(), b"fresh");
        assert!(!w.backup_path().exists());
    }

    #[test]
    fn existing_content_survives_until_first_write() {
        let td = tempdir().unwrap();
        let p = td.path().join("keep.txt");
        fs::write(&p, b"old contents").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        assert_eq!(fs::read(&p).unwrap(), b"old contents");
        w.append(b"new").unwrap();
        w.close().unwrap();
        assert_eq!(fs::read(&p).unwrap(), b"new");
    }

    #[test]
    fn close_without_writes_empties_target() {
        let td = tempdir().unwrap();
        let p = td.path().join("empty.txt");
        fs::write(&p, b"something").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.close().unwrap();
        assert_eq!(fs::read(&p).unwrap(), b"");
    }

    #[test]
    fn backup_after_write_is_invalid_state() {
        let td = tempdir().unwrap();
        let p = td.path().join("late.txt");
        fs::write(&p, b"orig").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.append(b"x").unwrap();
        let err = w.create_backup().unwrap_err();
        assert!(err.is_invalid_state());
        // Misuse does not disturb the writer.
        assert_eq!(w.state(), WriterState::Open);
        w.close().unwrap();
    }

    #[test]
    fn second_backup_is_invalid_state() {
        let td = tempdir().unwrap();
        let p = td.path().join("twice.txt");
        fs::write(&p, b"orig").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.create_backup().unwrap();
        assert!(w.create_backup().unwrap_err().is_invalid_state());
        w.abort().unwrap();
    }

    #[test]
    fn injected_write_failure_moves_to_failed_and_keeps_backup() {
        let td = tempdir().unwrap();
        let p = td.path().join("fail.txt");
        fs::write(&p, b"precious").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.create_backup().unwrap();
        w.append(b"partial").unwrap();
        w.fail_next_io(io::ErrorKind::StorageFull);
        let err = w.append(b"more").unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::StorageFull));
        assert_eq!(w.state(), WriterState::Failed);
        assert!(!w.is_locked());
        assert_eq!(fs::read(w.backup_path()).unwrap(), b"precious");

        assert!(w.append(b"again").unwrap_err().is_invalid_state());
        assert!(w.close().unwrap_err().is_invalid_state());
        assert!(w.abort().unwrap_err().is_invalid_state());
        assert!(w.backup_path().exists(), "failed writer must not drop the backup");
    }

    #[test]
    fn injected_sync_failure_during_close() {
        let td = tempdir().unwrap();
        let p = td.path().join("sync.txt");
        fs::write(&p, b"orig").unwrap();
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.create_backup().unwrap();
        w.append(b"new").unwrap();
        w.fail_next_io(io::ErrorKind::Other);
        let err = w.close().unwrap_err();
        assert!(!err.is_invalid_state());
        assert_eq!(w.state(), WriterState::Failed);
        assert!(!w.is_locked());
        assert_eq!(fs::read(w.backup_path()).unwrap(), b"orig");
    }

    #[test]
    fn io_write_trait_reports_invalid_state_after_close() {
        let td = tempdir().unwrap();
        let p = td.path().join("trait.txt");
        let mut w = AtomicFileWriter::new(&p).unwrap();
        w.close().unwrap();
        let err = w.write(b"late").unwrap_err();
        let inner = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<AtomicWriteError>())
            .expect("typed error");
        assert!(inner.is_invalid_state());
    }

    #[test]
    fn drop_without_close_releases_lock_and_keeps_backup() {
        let td = tempdir().unwrap();
        let p = td.path().join("dropped.txt");
        fs::write(&p, b"orig").unwrap();
        {
            let mut w = AtomicFileWriter::new(&p).unwrap();
            w.create_backup().unwrap();
        }
        assert_eq!(fs::read(backup_path_for(&p)).unwrap(), b"orig");
        let mut again = AtomicFileWriter::new(&p).unwrap();
        again.abort().unwrap();
    }
}
