//! Non-Unix implementations of platform helpers.
//! No POSIX modes here; files get the platform's default ACLs.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open log file for appending (no symlink defense available via std here).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
