//! Backup file handling.
//! - The backup lives next to the target: `<target file name>.bak`.
//! - It is staged in a unique hidden temp file (fsynced), then renamed over any
//!   stale backup, and the directory is fsynced (Unix). A crash mid-copy leaves
//!   the previous backup intact.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::io_copy::copy_to_new_file;
use super::perms::PermissionSnapshot;
use super::util::{fsync_dir, parent_dir, unique_temp_path};
use crate::errors::AtomicWriteError;

pub const BACKUP_SUFFIX: &str = ".bak";

/// Deterministic backup path for `target`: the suffix is appended to the full
/// file name (`refs.bib` -> `refs.bib.bak`). No I/O.
pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy `target` byte-for-byte to `backup`, replacing any stale backup, and give
/// the copy the permission bits in `perms`. Returns the number of bytes copied.
pub(super) fn write_backup(
    target: &Path,
    backup: &Path,
    perms: &PermissionSnapshot,
) -> Result<u64, AtomicWriteError> {
    let tmp = unique_temp_path(backup);

    let bytes = match copy_to_new_file(target, &tmp) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(AtomicWriteError::io("copy target to backup", backup, e));
        }
    };

    if let Err(e) = perms.apply(&tmp) {
        warn!(path = %backup.display(), error = %e, "failed to mirror permissions onto backup");
    }

    if let Err(e) = replace_file(&tmp, backup) {
        let _ = fs::remove_file(&tmp);
        return Err(AtomicWriteError::io("rename staged backup", backup, e));
    }

    // Best-effort: a failed directory fsync does not undo a completed rename.
    if let Err(e) = fsync_dir(parent_dir(backup)) {
        debug!(path = %backup.display(), error = %e, "directory fsync after backup rename failed");
    }

    trace!(target = %target.display(), backup = %backup.display(), bytes, "backup written");
    Ok(bytes)
}

/// Rename `src` over `dst`. Windows' rename does not overwrite, so clear `dst` first there.
fn replace_file(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if let Err(e) = fs::remove_file(dst)
            && e.kind() != io::ErrorKind::NotFound
        {
            return Err(e);
        }
    }
    fs::rename(src, dst)
}

/// Delete `backup` if it exists. Returns whether a file was removed.
pub(super) fn remove_backup(backup: &Path) -> io::Result<bool> {
    match fs::remove_file(backup) {
        Ok(()) => {
            trace!(path = %backup.display(), "backup removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
