//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug and wins over it.
//! - Flags only ever switch settings on; config file values apply otherwise.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};

/// Replace a file's contents safely: locked, fsynced, permissions kept, with an
/// optional rolling backup at <TARGET>.bak.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Replace a file's contents without ever leaving it half-written")]
pub struct Args {
    /// File whose contents are replaced (created if missing).
    #[arg(
        value_name = "TARGET",
        value_hint = ValueHint::FilePath,
        required_unless_present = "print_config"
    )]
    pub target: Option<PathBuf>,

    /// Read the new contents from this file instead of stdin.
    #[arg(long, short = 'i', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Copy the current contents to <TARGET>.bak before writing.
    #[arg(long, short = 'b')]
    pub backup: bool,

    /// Keep <TARGET>.bak after a successful write (implies --backup).
    #[arg(long, short = 'k')]
    pub keep_backup: bool,

    /// Restore <TARGET> from <TARGET>.bak and exit.
    #[arg(long, conflicts_with_all = ["input", "backup", "keep_backup"])]
    pub restore: bool,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long)]
    pub json: bool,

    /// Print where the config file is looked up, then exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if self.backup {
            cfg.backup = true;
        }
        if self.keep_backup {
            cfg.backup = true;
            cfg.keep_backup = true;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(lf) = &self.log_file {
            cfg.log_file = Some(lf.clone());
        }
        if self.json {
            cfg.json = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
