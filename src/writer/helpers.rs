//! I/O error enrichment.
//!
//! Turns a bare io::Error into "<op> '<path>': <error> — <hint> [os code: N]".
//! Used by `AtomicWriteError::io` and, through `io_error_with_help`, by the
//! binary where it works with anyhow.

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Platform-specific hint by raw OS code.
#[cfg(unix)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
        libc::EBUSY => "resource busy; another process may be writing this file",
        libc::EWOULDBLOCK => "file is locked by another writer",
        libc::ENOENT => "path not found; verify the parent directory exists",
        libc::ENOSPC => "insufficient space on device",
        libc::EDQUOT => "disk quota exceeded",
        libc::EROFS => "read-only filesystem; cannot write here",
        libc::EIO => "low-level I/O error; the device may be failing",
        libc::EISDIR => "target is a directory",
        libc::ENAMETOOLONG => "filename or path too long",
        libc::EMFILE => "process file descriptor limit reached",
        libc::ENOLCK => "no locks available; the filesystem may not support advisory locking",
        _ => return None,
    };
    Some(hint)
}

#[cfg(windows)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        5 => "access denied; check permissions",               // ERROR_ACCESS_DENIED
        32 => "sharing violation; file is in use",             // ERROR_SHARING_VIOLATION
        33 => "file is locked by another writer",              // ERROR_LOCK_VIOLATION
        2 | 3 => "path not found; verify it exists",           // FILE/PATH NOT FOUND
        112 => "insufficient disk space",                      // ERROR_DISK_FULL
        19 => "write protected / read-only media",             // ERROR_WRITE_PROTECT
        206 => "filename or path too long",                    // ERROR_FILENAME_EXCED_RANGE
        _ => return None,
    };
    Some(hint)
}

#[cfg(not(any(unix, windows)))]
fn os_hint(_code: i32) -> Option<&'static str> {
    None
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::WouldBlock => Some("file is locked by another writer"),
        io::ErrorKind::WriteZero => Some("device accepted no more bytes"),
        _ => None,
    }
}

pub(crate) fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    match e.raw_os_error() {
        Some(code) => {
            if let Some(hint) = os_hint(code) {
                msg.push_str(" — ");
                msg.push_str(hint);
            }
            msg.push_str(&format!(" [os code: {code}]"));
        }
        None => {
            if let Some(hint) = kind_hint(e.kind()) {
                msg.push_str(" — ");
                msg.push_str(hint);
            }
        }
    }
    msg
}

/// Adapter for anyhow::Result code: `.map_err(io_error_with_help("read input", p))?`.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}
