//! Typed error definitions for atomic_replace.
//! Keeps lock contention, OS failures and API misuse apart so callers (and tests)
//! can react to each one differently.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::writer::WriterState;
use crate::writer::helpers::build_message;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    /// Another writer (this process or another one) holds the advisory lock.
    #[error(
        "Could not obtain write access to {}. Maybe another instance is currently writing to the same file?",
        path.display()
    )]
    LockContention {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Open, copy, write, flush or sync failed at the OS level.
    #[error("{message}")]
    Io {
        op: &'static str,
        path: PathBuf,
        message: String,
        #[source]
        source: io::Error,
    },

    /// Operation not permitted in the writer's current state.
    #[error("cannot {op}: writer is {state}")]
    InvalidState {
        op: &'static str,
        state: WriterState,
    },
}

impl AtomicWriteError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        let message = build_message(op, &path, &source);
        AtomicWriteError::Io {
            op,
            path,
            message,
            source,
        }
    }

    pub fn is_lock_contention(&self) -> bool {
        matches!(self, AtomicWriteError::LockContention { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, AtomicWriteError::InvalidState { .. })
    }

    /// Kind of the underlying OS error, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            AtomicWriteError::LockContention { source, .. } | AtomicWriteError::Io { source, .. } => {
                Some(source.kind())
            }
            AtomicWriteError::InvalidState { .. } => None,
        }
    }
}

impl From<AtomicWriteError> for io::Error {
    fn from(e: AtomicWriteError) -> Self {
        let kind = match &e {
            AtomicWriteError::LockContention { .. } => io::ErrorKind::WouldBlock,
            AtomicWriteError::Io { source, .. } => source.kind(),
            AtomicWriteError::InvalidState { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}
