//! AT transaction errors

use thiserror::Error;

/// Errors that can occur while talking to a modem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtError {
    /// The device could not be opened (missing, permission denied, locked)
    #[error("Couldn't open serial port {port}: {reason}")]
    PortUnavailable {
        /// Port that was requested
        port: String,
        /// OS error text
        reason: String,
    },

    /// Another channel in this process holds the port
    #[error("Serial port {0} is already open")]
    AlreadyOpen(String),

    /// I/O error while clearing input or writing the command
    #[error("Error while writing to serial port: {0}")]
    WriteFailed(String),

    /// I/O error while reading, or the reply was not valid UTF-8
    #[error("Error while reading from serial port: {0}")]
    ReadFailed(String),

    /// No response before the deadline
    #[error("timeout! no response within {timeout_ms}ms")]
    Timeout {
        /// Budget that expired
        timeout_ms: u64,
    },

    /// Settings missing or out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Auto-discovery found no responsive modem
    #[error("Couldn't find any available port automatically")]
    NoModemFound,
}

impl AtError {
    /// Process exit code for this error category
    ///
    /// I/O failures, timeouts, port failures and configuration problems each
    /// get their own code so scripts can tell a silent modem from a broken link.
    pub fn exit_code(&self) -> u8 {
        match self {
            AtError::WriteFailed(_) | AtError::ReadFailed(_) => 1,
            AtError::Timeout { .. } => 2,
            AtError::PortUnavailable { .. } | AtError::AlreadyOpen(_) => 3,
            AtError::InvalidConfig(_) | AtError::NoModemFound => 4,
        }
    }
}
