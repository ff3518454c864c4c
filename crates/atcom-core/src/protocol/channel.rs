//! Exclusive serial channel to a modem
//!
//! Owns the OS handle for one port and exposes the byte-level primitives the
//! transaction engine needs: framed command write, available-byte count and
//! a non-blocking read of what has arrived.

use std::io::{self, Read, Write};
use std::sync::Mutex;
use tracing::debug;

use super::{
    serial::open_port, stream::PortStream, AtError, ChannelConfig, CommunicationChannel,
    COMMAND_TERMINATOR,
};

/// Names of ports currently held by a `SerialChannel` in this process
static OPEN_PORTS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Registration of a port name, released on drop
#[derive(Debug)]
struct PortLease {
    name: String,
}

impl PortLease {
    fn acquire(name: &str) -> Result<Self, AtError> {
        let mut open = OPEN_PORTS.lock().unwrap_or_else(|p| p.into_inner());
        if open.iter().any(|n| n == name) {
            return Err(AtError::AlreadyOpen(name.to_string()));
        }
        open.push(name.to_string());
        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        let mut open = OPEN_PORTS.lock().unwrap_or_else(|p| p.into_inner());
        open.retain(|n| n != &self.name);
    }
}

/// An open serial link with exclusive ownership of its port
///
/// Dropping the channel closes the OS handle and frees the port name for
/// another `open` in this process.
pub struct SerialChannel {
    // Declared before the lease so the handle closes first
    stream: Box<dyn CommunicationChannel>,
    lease: PortLease,
}

impl SerialChannel {
    /// Open `config.port` with 8-N-1 framing and the configured flow control
    pub fn open(config: &ChannelConfig) -> Result<Self, AtError> {
        config.validate()?;
        let lease = PortLease::acquire(&config.port)?;
        let port = open_port(config)?;
        debug!(port = %config.port, "serial channel open");
        Ok(Self {
            stream: Box::new(PortStream::new(port)),
            lease,
        })
    }

    /// Build a channel over an arbitrary stream, registered under `name`
    pub fn from_stream<S>(name: &str, stream: S) -> Result<Self, AtError>
    where
        S: CommunicationChannel + 'static,
    {
        let lease = PortLease::acquire(name)?;
        Ok(Self {
            stream: Box::new(stream),
            lease,
        })
    }

    /// Name of the port this channel owns
    pub fn port_name(&self) -> &str {
        &self.lease.name
    }

    /// Discard pending input, then write `text` followed by one carriage return
    pub fn write_command(&mut self, text: &str) -> Result<(), AtError> {
        let write_failed = |e: io::Error| AtError::WriteFailed(e.to_string());

        self.stream.clear_input_buffer().map_err(write_failed)?;

        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(COMMAND_TERMINATOR);

        self.stream.write_all(&frame).map_err(write_failed)?;
        self.stream.flush().map_err(write_failed)?;

        debug!(port = %self.lease.name, bytes = frame.len(), command = text, "command written");
        Ok(())
    }

    /// Number of bytes buffered for read, without blocking
    pub fn bytes_available(&mut self) -> Result<usize, AtError> {
        self.stream
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| AtError::ReadFailed(e.to_string()))
    }

    /// Read the bytes currently available and decode them as UTF-8
    ///
    /// Never waits for more data than was counted as available.
    pub fn read_available(&mut self) -> Result<String, AtError> {
        let available = self.bytes_available()?;
        let mut buffer = vec![0u8; available];
        let mut filled = 0;

        while filled < available {
            match self.stream.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(AtError::ReadFailed(e.to_string())),
            }
        }
        buffer.truncate(filled);

        debug!(port = %self.lease.name, bytes = filled, "read available");
        String::from_utf8(buffer).map_err(|e| AtError::ReadFailed(e.to_string()))
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("port", &self.lease.name)
            .finish_non_exhaustive()
    }
}
