//! Permission snapshot of the target file.
//! - Unix: the mode bits (`mode & 0o7777`), re-applied after commit.
//! - Elsewhere: capture and restore are no-ops.

use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

/// rw-rw-r--, used when the target's real mode cannot be read.
pub const FALLBACK_MODE: u32 = 0o664;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSnapshot {
    #[cfg(unix)]
    mode: u32,
}

impl PermissionSnapshot {
    /// Read the current permission bits of `path`.
    pub fn capture(path: &Path) -> io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(path)?.permissions().mode() & 0o7777;
            trace!(path = %path.display(), mode = format!("{:o}", mode), "captured permissions");
            Ok(PermissionSnapshot { mode })
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            Ok(PermissionSnapshot {})
        }
    }

    pub fn fallback() -> Self {
        #[cfg(unix)]
        {
            PermissionSnapshot { mode: FALLBACK_MODE }
        }
        #[cfg(not(unix))]
        {
            PermissionSnapshot {}
        }
    }

    /// Mode bits, if this platform has them.
    pub fn mode(&self) -> Option<u32> {
        #[cfg(unix)]
        {
            Some(self.mode)
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    /// Apply the snapshot to `path`.
    pub fn apply(&self, path: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.mode))?;
            trace!(path = %path.display(), mode = format!("{:o}", self.mode), "applied permissions");
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            Ok(())
        }
    }
}
