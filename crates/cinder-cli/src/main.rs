//! Cinder CLI binary.
//!
//! # Usage
//!
//! ```bash
//! export CINDER_KEK_ID=kek-2024
//! export CINDER_KEK_HEX=$(cinder keygen | jq -r .kek_hex)
//!
//! cinder create --as 1 --members 2 --title "launch"
//! cinder post --as 1 --conversation <id> --text "hello"
//! cinder arm --as 2 --conversation <id> --minutes 1
//! cinder list --as 2 --conversation <id>
//! ```

use std::process::ExitCode;

use cinder_cli::{Cli, run};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // stdout carries command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(command = cli.command.name(), error = %err, "Command failed");
            ExitCode::from(err.exit_code())
        },
    }
}
