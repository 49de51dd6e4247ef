//! Core library for `atomic_replace`.
//!
//! Replaces the contents of a file in place without ever leaving it half-written
//! behind a concurrent writer's back:
//! - an exclusive advisory lock on the target guards against other writers,
//! - an optional byte-for-byte backup (`<target>.bak`) is the recovery point,
//! - the new contents are fsynced before the original permissions are restored.
//!
//! ```no_run
//! use std::io::Write;
//! use atomic_replace::AtomicFileWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut w = AtomicFileWriter::new("library.bib")?;
//! w.create_backup()?;
//! w.write_all(b"@article{...}")?;
//! w.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod output;
pub mod platform;
pub mod restore;
pub mod writer;

pub use config::{Config, LogLevel, default_config_path, default_log_path, path_has_symlink_ancestor};
pub use errors::AtomicWriteError;
pub use restore::{WriteOptions, restore_from_backup, write_atomically};
pub use writer::{AtomicFileWriter, BACKUP_SUFFIX, PermissionSnapshot, WriterState, backup_path_for};
