//! atcom: send one AT command to a modem and print the response.
//!
//! Exit codes: 0 success, 1 serial read/write failure, 2 timeout,
//! 3 port unavailable, 4 configuration or usage error.

mod args;

use anyhow::{Context, Result};
use atcom_core::config::{resolve, FileConfig};
use atcom_core::format::render;
use atcom_core::protocol::{find_modem, AtError, SerialChannel};
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

/// Budget for each port probed by `--auto`
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit code for errors that carry no [`AtError`]
const CONFIG_EXIT_CODE: u8 = 4;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(CONFIG_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(args.verbose);

    match run(&args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[ERR]  {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Log to stderr so stdout only carries the modem response
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<String> {
    let file = FileConfig::load(&args.config_path())?;
    let config = resolve(&args.overrides(), &file, |baud_rate| {
        find_modem(baud_rate, PROBE_TIMEOUT)
    })?;

    info!(
        port = %config.channel.port,
        baud = config.channel.baud_rate,
        timeout_s = config.timeout.as_secs(),
        "opening serial port"
    );
    let mut channel = SerialChannel::open(&config.channel)?;

    let raw = config
        .engine()
        .transact(&mut channel, &config.request(&args.at_command))
        .with_context(|| format!("{} on {}", args.at_command, config.channel.port))?;

    Ok(render(&raw, config.verbose))
}

/// Exit code of the first [`AtError`] in the chain
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AtError>())
        .map(AtError::exit_code)
        .unwrap_or(CONFIG_EXIT_CODE)
}
