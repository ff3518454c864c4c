//! Command line arguments

use atcom_core::config::{CliOverrides, DEFAULT_CONFIG_PATH};
use atcom_core::protocol::PollMode;
use clap::Parser;
use std::path::PathBuf;

/// Send an AT command to a modem over a serial port and print the response.
///
/// Settings not given here are read from the config file, then defaulted.
#[derive(Parser, Debug)]
#[command(name = "atcom", version, about, long_about = None)]
pub struct Args {
    /// Full path of serial port.
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baudrate of serial communication [default: 115200].
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub baudrate: Option<u32>,

    /// Command timeout in seconds [default: 3].
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Full path of config file [default: ./configs.yml].
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show the command echo and debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable RTS-CTS hardware flow control.
    #[arg(long = "rts-cts")]
    pub rts_cts: bool,

    /// Enable DSR-DTR handshaking.
    #[arg(long = "dsr-dtr")]
    pub dsr_dtr: bool,

    /// Search serial ports for a modem when no port is configured.
    #[arg(long = "auto")]
    pub auto_find_port: bool,

    /// Reply collection: "until-quiet" merges bursts, "single-pass" returns after the first poll.
    #[arg(long, value_name = "MODE")]
    pub poll_mode: Option<PollMode>,

    /// Report a timeout instead of returning a reply cut off by the deadline.
    #[arg(long)]
    pub discard_partial: bool,

    /// AT command to send, e.g. AT+CSQ.
    pub at_command: String,
}

impl Args {
    /// Config file to read
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Values that take precedence over the config file
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port.clone(),
            baudrate: self.baudrate,
            timeout: self.timeout,
            rts_cts: self.rts_cts,
            dsr_dtr: self.dsr_dtr,
            verbose: self.verbose,
            poll_mode: self.poll_mode,
            discard_partial: self.discard_partial,
            auto_find_port: self.auto_find_port,
        }
    }
}
