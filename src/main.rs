use anyhow::Result;
use std::process::ExitCode;

mod app;
mod logging;

fn main() -> Result<ExitCode> {
    let args = atomic_replace::cli::parse();
    app::run(args)
}
