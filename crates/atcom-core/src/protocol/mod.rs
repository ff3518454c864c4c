//! AT Command Protocol
//!
//! Implements single-shot AT command transactions over a serial link.
//!
//! A transaction writes one command terminated by a carriage return, then
//! polls the port until the modem's reply settles or the timeout expires.

mod channel;
mod discovery;
mod error;
pub mod serial;
pub mod stream;
mod transaction;

pub use channel::SerialChannel;
pub use discovery::find_modem;
pub use error::AtError;
pub use serial::{list_ports, ChannelConfig};
pub use stream::{CommunicationChannel, PortStream};
pub use transaction::{
    PollMode, PollState, RawResponse, TransactionEngine, TransactionRequest, TransactionResult,
};

/// Default baud rate for modem communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default transaction timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Delay between polls of the receive buffer in milliseconds
pub const POLL_INTERVAL_MS: u64 = 100;

/// Terminator appended to every command frame
pub const COMMAND_TERMINATOR: u8 = b'\r';
