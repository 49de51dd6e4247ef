//! Application orchestrator.
//! Loads/merges config, initializes logging, then either restores the target from
//! its backup or streams the input into it through `AtomicFileWriter`.

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use atomic_replace::cli::Args;
use atomic_replace::config::{CONFIG_ENV_VAR, load_config};
use atomic_replace::output as out;
use atomic_replace::writer::io_error_with_help;
use atomic_replace::{
    AtomicFileWriter, AtomicWriteError, Config, LogLevel, backup_path_for, default_config_path,
    restore_from_backup,
};

use crate::logging::init_tracing;

/// EX_TEMPFAIL: the target is locked by another writer; retrying later may work.
const EXIT_LOCKED: u8 = 75;

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    let mut cfg = load_config()?;
    args.apply_overrides(&mut cfg);
    let _guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), cfg.json)?;
    debug!(?cfg, "effective config");

    let Some(target) = args.target.as_deref() else {
        bail!("no TARGET given");
    };

    if args.restore {
        let result = restore_from_backup(target)
            .map(|n| format!("Restored {} bytes into {}", n, target.display()))
            .map_err(anyhow::Error::from);
        return Ok(report(result, target, &cfg));
    }

    let result = match &args.input {
        Some(path) => {
            let file = File::open(path).map_err(io_error_with_help("open input", path))?;
            replace_from(target, file, &cfg)
        }
        None => replace_from(target, io::stdin().lock(), &cfg),
    }
    .map(|n| format!("Wrote {} bytes to {}", n, target.display()));

    Ok(report(result, target, &cfg))
}

/// Stream `input` into `target`. Returns the number of bytes written.
fn replace_from<R: Read>(target: &Path, mut input: R, cfg: &Config) -> Result<u64> {
    let mut writer = AtomicFileWriter::with_keep_backup(target, cfg.keep_backup)?;
    if cfg.backup {
        writer.create_backup()?;
    }

    // On error the writer is dropped: lock released, backup kept for --restore.
    if let Err(e) = io::copy(&mut input, &mut writer) {
        if !writer.backup_path().exists() {
            warn!(target = %target.display(), "input failed without a backup; target may be partially written");
            out::print_warn(&format!(
                "{} may be partially written and no backup exists (use --backup to keep one).",
                target.display()
            ));
        }
        return Err(e).with_context(|| format!("copy input into '{}'", target.display()));
    }
    writer.close()?;

    info!(target = %target.display(), bytes = writer.bytes_written(), backup = cfg.backup, "replaced");
    Ok(writer.bytes_written())
}

fn report(result: Result<String>, target: &Path, cfg: &Config) -> ExitCode {
    match result {
        Ok(msg) => {
            if cfg.log_level != LogLevel::Quiet {
                out::print_success(&msg);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(AtomicWriteError::LockContention { .. }) = e.downcast_ref::<AtomicWriteError>() {
                error!(target = %target.display(), "target locked by another writer");
                out::print_error(&format!(
                    "{} is in use by another instance: {e}",
                    target.display()
                ));
                return ExitCode::from(EXIT_LOCKED);
            }

            error!(target = %target.display(), error = %format!("{e:#}"), "write failed");
            out::print_error(&format!("{e:#}"));
            let backup = backup_path_for(target);
            if backup.exists() {
                out::print_info(&format!(
                    "The previous contents are preserved at {}. Restore with: atomic_replace --restore {}",
                    backup.display(),
                    target.display()
                ));
            }
            ExitCode::FAILURE
        }
    }
}

fn print_config_location() {
    if let Some(p) = std::env::var_os(CONFIG_ENV_VAR) {
        out::print_info(&format!(
            "Using {CONFIG_ENV_VAR} (explicit):\n  {}",
            Path::new(&p).display()
        ));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default atomic_replace config path:\n  {}", p.display()));
            if !p.exists() {
                out::print_info("No config file exists there yet; built-in defaults apply.");
            }
        }
        None => out::print_error("Could not determine a default config path."),
    }
}
