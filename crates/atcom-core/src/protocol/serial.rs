//! Serial port handling
//!
//! Provides low-level serial port access for modem communication.

use serialport::{FlowControl, SerialPort};
use std::collections::BTreeSet;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;
use tracing::debug;

use super::{AtError, DEFAULT_BAUD_RATE};

/// Read timeout applied to the OS handle.
///
/// Reads are only issued for bytes already counted as available, so this
/// just bounds a read that races with the driver.
const PORT_READ_TIMEOUT_MS: u64 = 10;

/// Line settings for one serial channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Port name (e.g., "/dev/ttyUSB2" or "COM3")
    pub port: String,
    /// Baud rate, always > 0
    pub baud_rate: u32,
    /// Enable RTS/CTS hardware flow control
    pub rts_cts: bool,
    /// Enable DSR/DTR handshaking
    pub dsr_dtr: bool,
}

impl ChannelConfig {
    /// Config with no flow control
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            rts_cts: false,
            dsr_dtr: false,
        }
    }

    /// Enable or disable RTS/CTS flow control
    pub fn with_rts_cts(mut self, enabled: bool) -> Self {
        self.rts_cts = enabled;
        self
    }

    /// Enable or disable DSR/DTR handshaking
    pub fn with_dsr_dtr(mut self, enabled: bool) -> Self {
        self.dsr_dtr = enabled;
        self
    }

    /// Check the port is named and the baud rate is usable
    pub fn validate(&self) -> Result<(), AtError> {
        if self.port.trim().is_empty() {
            return Err(AtError::InvalidConfig("port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(AtError::InvalidConfig("baud rate must be positive".into()));
        }
        Ok(())
    }

    fn flow_control(&self) -> FlowControl {
        if self.rts_cts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_BAUD_RATE)
    }
}

/// Sort key so that ttyACM* ports come first, then ttyUSB*, then the rest.
/// Numeric suffixes sort numerically within each group.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List candidate serial port names, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<String> {
    let reported = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name);

    // udev may not report every modem interface
    #[cfg(target_os = "linux")]
    let fallback: Vec<String> = fs::read_dir("/dev")
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                .filter(|fname| fname.starts_with("ttyACM") || fname.starts_with("ttyUSB"))
                .map(|fname| format!("/dev/{}", fname))
                .collect()
        })
        .unwrap_or_default();
    #[cfg(not(target_os = "linux"))]
    let fallback: Vec<String> = Vec::new();

    merge_port_names(reported, fallback)
}

/// Union of both name sources, deduplicated and sorted by [`port_sort_key`]
fn merge_port_names<A, B>(reported: A, fallback: B) -> Vec<String>
where
    A: IntoIterator<Item = String>,
    B: IntoIterator<Item = String>,
{
    let names: BTreeSet<String> = reported.into_iter().chain(fallback).collect();
    let mut v: Vec<String> = names.into_iter().collect();
    v.sort_by_key(|name| port_sort_key(name));
    v
}

/// Open and configure the OS serial handle described by `config`
pub(crate) fn open_port(config: &ChannelConfig) -> Result<Box<dyn SerialPort>, AtError> {
    let unavailable = |e: serialport::Error| AtError::PortUnavailable {
        port: config.port.clone(),
        reason: e.to_string(),
    };

    let mut port = serialport::new(&config.port, config.baud_rate)
        .timeout(Duration::from_millis(PORT_READ_TIMEOUT_MS))
        .open()
        .map_err(unavailable)?;
    configure_port(port.as_mut(), config).map_err(unavailable)?;
    Ok(port)
}

/// Fix framing to 8-N-1 and apply the requested flow control
fn configure_port(port: &mut dyn SerialPort, config: &ChannelConfig) -> serialport::Result<()> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(config.flow_control())?;

    // serialport has no DSR/DTR pacing mode; assert DTR so the modem sees us ready
    if config.dsr_dtr {
        port.write_data_terminal_ready(true)?;
        match port.read_data_set_ready() {
            Ok(dsr) => debug!(port = %config.port, dsr, "DTR asserted"),
            Err(e) => debug!(port = %config.port, error = %e, "DTR asserted, DSR unreadable"),
        }
    }

    debug!(
        port = %config.port,
        baud = config.baud_rate,
        rts_cts = config.rts_cts,
        dsr_dtr = config.dsr_dtr,
        "configured 8N1"
    );
    Ok(())
}
