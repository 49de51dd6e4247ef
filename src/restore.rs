//! Convenience entry points built on `AtomicFileWriter`:
//! one-shot replacement and caller-driven recovery from the backup.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::info;

use crate::errors::AtomicWriteError;
use crate::writer::{AtomicFileWriter, PermissionSnapshot, backup_path_for};

const RESTORE_CHUNK: usize = 64 * 1024;

/// Options for `write_atomically`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Snapshot the existing target before writing.
    pub backup: bool,
    /// Keep the snapshot after a successful write.
    pub keep_backup: bool,
}

/// Replace the contents of `target` with `bytes` in one call.
pub fn write_atomically(
    target: impl AsRef<Path>,
    bytes: &[u8],
    opts: WriteOptions,
) -> Result<(), AtomicWriteError> {
    let mut writer = AtomicFileWriter::with_keep_backup(target, opts.keep_backup)?;
    if opts.backup {
        writer.create_backup()?;
    }
    writer.append(bytes)?;
    writer.close()
}

/// Copy `<target>.bak` back over `target`, under the target's lock.
///
/// The backup is kept afterwards and its permission bits are applied to the
/// target. Returns the number of bytes restored.
pub fn restore_from_backup(target: impl AsRef<Path>) -> Result<u64, AtomicWriteError> {
    let target = target.as_ref();
    let backup = backup_path_for(target);

    // Open the backup before locking: when it is missing or unreadable the target
    // is neither created nor touched.
    let mut src = File::open(&backup).map_err(|e| AtomicWriteError::io("open backup", &backup, e))?;

    let mut writer = AtomicFileWriter::with_keep_backup(target, true)?;
    if let Ok(perms) = PermissionSnapshot::capture(&backup) {
        writer.set_permissions_on_commit(perms);
    }

    let mut buf = vec![0u8; RESTORE_CHUNK];
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AtomicWriteError::io("read backup", &backup, e)),
        };
        writer.append(&buf[..n])?;
    }
    writer.close()?;

    let restored = writer.bytes_written();
    info!(target = %target.display(), backup = %backup.display(), bytes = restored, "restored from backup");
    Ok(restored)
}
