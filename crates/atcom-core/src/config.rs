//! Configuration resolution
//!
//! Merges command line values, the YAML config file and built-in defaults
//! into one [`ResolvedConfig`]. For every field the first source that has a
//! value wins: command line, then config file, then default.
//!
//! Timeouts are whole seconds on the command line and in the file; they are
//! converted to a [`Duration`] here and nowhere else.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::protocol::{
    AtError, ChannelConfig, PollMode, TransactionEngine, TransactionRequest, DEFAULT_BAUD_RATE,
    DEFAULT_TIMEOUT_SECS,
};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "./configs.yml";

/// Errors while loading or resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File exists but could not be read
    #[error("Couldn't read config file {}: {source}", path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// File is not valid YAML for [`FileConfig`]
    #[error("Couldn't parse config file {}: {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// No port from the command line, the file or auto-discovery
    #[error("Property port not specified, it is required")]
    MissingPort,

    /// A value is out of range
    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl From<ConfigError> for AtError {
    fn from(e: ConfigError) -> Self {
        AtError::InvalidConfig(e.to_string())
    }
}

/// Contents of the YAML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Serial port path
    pub port: Option<String>,
    /// Baud rate
    pub baudrate: Option<u32>,
    /// Transaction timeout in seconds
    pub timeout: Option<u64>,
    /// RTS/CTS flow control
    pub rts_cts: Option<bool>,
    /// DSR/DTR handshaking
    pub dsr_dtr: Option<bool>,
    /// Verbose rendering
    pub verbose: Option<bool>,
    /// Reply collection mode
    pub poll_mode: Option<PollMode>,
    /// Return data received before the deadline instead of timing out
    pub keep_partial: Option<bool>,
}

impl FileConfig {
    /// Parse YAML text; an empty document yields an empty config
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file at `path`, or an empty config when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                info!(path = %path.display(), "Found configs file, loading properties");
                Self::parse(&content, path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Configs file not found, reading properties from args");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Values given on the command line
///
/// Flags only count as set when present; an absent flag never overrides the
/// config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--port`
    pub port: Option<String>,
    /// `--baudrate`
    pub baudrate: Option<u32>,
    /// `--timeout`, in seconds
    pub timeout: Option<u64>,
    /// `--rts-cts`
    pub rts_cts: bool,
    /// `--dsr-dtr`
    pub dsr_dtr: bool,
    /// `--verbose`
    pub verbose: bool,
    /// `--poll-mode`
    pub poll_mode: Option<PollMode>,
    /// `--discard-partial`
    pub discard_partial: bool,
    /// `--auto`: search for a modem when no port is set
    pub auto_find_port: bool,
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Port and line settings
    pub channel: ChannelConfig,
    /// Transaction budget
    pub timeout: Duration,
    /// Show echo and markers when rendering
    pub verbose: bool,
    /// Polling mode for the engine
    pub poll_mode: PollMode,
    /// Return data received before the deadline instead of timing out
    pub keep_partial: bool,
}

impl ResolvedConfig {
    /// Transaction engine configured from these settings
    pub fn engine(&self) -> TransactionEngine {
        TransactionEngine::new()
            .with_mode(self.poll_mode)
            .with_keep_partial(self.keep_partial)
    }

    /// Request for `command` with the resolved timeout
    pub fn request(&self, command: &str) -> TransactionRequest {
        TransactionRequest::new(command).with_timeout(self.timeout)
    }
}

/// Merge command line values over the config file over defaults
///
/// `find_port` is only called when no port was given and auto-discovery was
/// requested. It receives the resolved baud rate.
pub fn resolve<F>(
    cli: &CliOverrides,
    file: &FileConfig,
    find_port: F,
) -> Result<ResolvedConfig, AtError>
where
    F: FnOnce(u32) -> Option<String>,
{
    let baud_rate = cli.baudrate.or(file.baudrate).unwrap_or(DEFAULT_BAUD_RATE);
    if baud_rate == 0 {
        return Err(ConfigError::InvalidValue {
            field: "baudrate",
            reason: "must be positive".into(),
        }
        .into());
    }

    let timeout_secs = cli.timeout.or(file.timeout).unwrap_or_else(|| {
        info!(default = DEFAULT_TIMEOUT_SECS, "Timeout property not found, using default");
        DEFAULT_TIMEOUT_SECS
    });
    if timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "timeout",
            reason: "must be at least one second".into(),
        }
        .into());
    }

    let port = match cli.port.clone().or_else(|| file.port.clone()) {
        Some(port) if port.trim().is_empty() => {
            return Err(ConfigError::InvalidValue {
                field: "port",
                reason: "must not be empty".into(),
            }
            .into());
        }
        Some(port) => {
            if cli.auto_find_port {
                info!(port = %port, "Using specified port, skipping port search");
            }
            port
        }
        None if cli.auto_find_port => find_port(baud_rate).ok_or(AtError::NoModemFound)?,
        None => return Err(ConfigError::MissingPort.into()),
    };

    let flag = |set: bool, from_file: Option<bool>| set || from_file.unwrap_or(false);

    Ok(ResolvedConfig {
        channel: ChannelConfig::new(port, baud_rate)
            .with_rts_cts(flag(cli.rts_cts, file.rts_cts))
            .with_dsr_dtr(flag(cli.dsr_dtr, file.dsr_dtr)),
        timeout: Duration::from_secs(timeout_secs),
        verbose: flag(cli.verbose, file.verbose),
        poll_mode: cli.poll_mode.or(file.poll_mode).unwrap_or_default(),
        keep_partial: !cli.discard_partial && file.keep_partial.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn no_search(_: u32) -> Option<String> {
        panic!("port search must not run")
    }

    #[test]
    fn test_defaults_fill_missing_values() {
        let cli = CliOverrides {
            port: Some("/dev/ttyUSB2".into()),
            ..Default::default()
        };
        let resolved = resolve(&cli, &FileConfig::default(), no_search).unwrap();

        assert_eq!(resolved.channel, ChannelConfig::new("/dev/ttyUSB2", 115200));
        assert_eq!(resolved.timeout, Duration::from_secs(3));
        assert!(!resolved.verbose);
        assert_eq!(resolved.poll_mode, PollMode::UntilQuiet);
        assert!(resolved.keep_partial);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            port: Some("/dev/ttyUSB3".into()),
            baudrate: Some(9600),
            timeout: Some(10),
            rts_cts: Some(true),
            ..Default::default()
        };
        let cli = CliOverrides {
            port: Some("/dev/ttyACM0".into()),
            timeout: Some(1),
            ..Default::default()
        };
        let resolved = resolve(&cli, &file, no_search).unwrap();

        assert_eq!(resolved.channel.port, "/dev/ttyACM0");
        assert_eq!(resolved.channel.baud_rate, 9600);
        assert_eq!(resolved.timeout, Duration::from_secs(1));
        // absent CLI flag leaves the file value alone
        assert!(resolved.channel.rts_cts);
        assert!(!resolved.channel.dsr_dtr);
    }

    #[test]
    fn test_keep_partial_resolution() {
        let base = CliOverrides {
            port: Some("/dev/ttyUSB2".into()),
            ..Default::default()
        };
        let file = FileConfig {
            keep_partial: Some(false),
            poll_mode: Some(PollMode::SinglePass),
            ..Default::default()
        };
        let resolved = resolve(&base, &file, no_search).unwrap();
        assert!(!resolved.keep_partial);
        assert_eq!(resolved.engine().mode(), PollMode::SinglePass);

        let cli = CliOverrides {
            discard_partial: true,
            ..base
        };
        assert!(!resolve(&cli, &FileConfig::default(), no_search).unwrap().keep_partial);
    }

    #[test]
    fn test_missing_port() {
        let err = resolve(&CliOverrides::default(), &FileConfig::default(), no_search).unwrap_err();
        assert_eq!(
            err,
            AtError::InvalidConfig("Property port not specified, it is required".into())
        );
    }

    #[test]
    fn test_auto_port_search() {
        let cli = CliOverrides {
            auto_find_port: true,
            baudrate: Some(57600),
            ..Default::default()
        };
        let resolved = resolve(&cli, &FileConfig::default(), |baud| {
            assert_eq!(baud, 57600);
            Some("/dev/ttyUSB2".into())
        })
        .unwrap();
        assert_eq!(resolved.channel.port, "/dev/ttyUSB2");

        let err = resolve(&cli, &FileConfig::default(), |_| None).unwrap_err();
        assert_eq!(err, AtError::NoModemFound);
    }

    #[test]
    fn test_auto_skipped_when_port_in_file() {
        let cli = CliOverrides {
            auto_find_port: true,
            ..Default::default()
        };
        let file = FileConfig {
            port: Some("/dev/ttyUSB3".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&cli, &file, no_search).unwrap().channel.port, "/dev/ttyUSB3");
    }

    #[test]
    fn test_rejects_zero_values() {
        let cli = CliOverrides {
            port: Some("/dev/ttyUSB2".into()),
            timeout: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&cli, &FileConfig::default(), no_search),
            Err(AtError::InvalidConfig(_))
        ));

        let cli = CliOverrides {
            port: Some("/dev/ttyUSB2".into()),
            baudrate: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&cli, &FileConfig::default(), no_search),
            Err(AtError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = "port: /dev/ttyUSB2\nbaudrate: 9600\ntimeout: 5\ndsr_dtr: true\npoll_mode: single-pass\n";
        let file = FileConfig::parse(yaml, Path::new("configs.yml")).unwrap();
        assert_eq!(
            file,
            FileConfig {
                port: Some("/dev/ttyUSB2".into()),
                baudrate: Some(9600),
                timeout: Some(5),
                dsr_dtr: Some(true),
                poll_mode: Some(PollMode::SinglePass),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_empty_and_invalid_yaml() {
        let path = Path::new("configs.yml");
        assert_eq!(FileConfig::parse("  \n", path).unwrap(), FileConfig::default());
        assert!(matches!(
            FileConfig::parse("baudrate: fast\n", path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&dir.path().join("configs.yml")).unwrap();
        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn test_load_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "port: /dev/ttyACM1").unwrap();
        writeln!(tmp, "rts_cts: true").unwrap();

        let file = FileConfig::load(tmp.path()).unwrap();
        assert_eq!(file.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(file.rts_cts, Some(true));
    }
}
