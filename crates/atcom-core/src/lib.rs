//! # atcom Core Library
//!
//! Core functionality for the atcom modem command tool.

#![warn(missing_docs)]

//!
//! This library provides:
//! - A serial channel with fixed 8-N-1 framing and optional hardware flow control
//! - A single-shot AT transaction engine (write, poll, accumulate, timeout)
//! - Response parsing and echo-aware rendering
//! - Serial port discovery for locating a responsive modem
//! - Resolution of command line, config file and default settings
//!
//! ## Example
//!
//! ```rust,ignore
//! use atcom_core::protocol::{ChannelConfig, SerialChannel, TransactionEngine, TransactionRequest};
//! use atcom_core::format::render;
//!
//! let mut channel = SerialChannel::open(&ChannelConfig::new("/dev/ttyUSB2", 115200))?;
//! let raw = TransactionEngine::new().transact(&mut channel, &TransactionRequest::new("AT+CSQ"))?;
//! print!("{}", render(&raw, false));
//! ```

pub mod config;
pub mod format;
pub mod protocol;
