//! Scripted modem used by the integration tests

#![allow(dead_code)]

use atcom_core::protocol::CommunicationChannel;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Observable state of a [`ScriptedModem`]
#[derive(Default)]
pub struct ModemState {
    /// Every byte the channel wrote
    pub written: Vec<u8>,
    /// Number of input buffer clears
    pub clears: usize,
    /// Set if the receive side was polled before any write
    pub polled_before_write: bool,
    pending: VecDeque<u8>,
    script: Vec<(Duration, Vec<u8>)>,
    released: usize,
    written_at: Option<Instant>,
    echo: bool,
    never_idle: bool,
    fail_write: bool,
    fail_read: bool,
}

impl ModemState {
    /// Move bursts whose delay has passed since the first write into the receive queue
    fn release(&mut self) {
        let Some(written_at) = self.written_at else {
            self.polled_before_write = true;
            return;
        };
        while self.released < self.script.len() && written_at.elapsed() >= self.script[self.released].0 {
            let burst = self.script[self.released].1.clone();
            self.pending.extend(burst);
            self.released += 1;
        }
        if self.never_idle && self.pending.is_empty() {
            self.pending.push_back(b'.');
        }
    }
}

/// In-memory modem that replies with timed bursts after the command is written
#[derive(Clone, Default)]
pub struct ScriptedModem {
    state: Arc<Mutex<ModemState>>,
}

impl ScriptedModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `bytes` once `delay` has passed since the command was written
    pub fn reply_after(self, delay: Duration, bytes: &[u8]) -> Self {
        self.state.lock().unwrap().script.push((delay, bytes.to_vec()));
        self
    }

    /// Echo written bytes straight back
    pub fn echoing(self) -> Self {
        self.state.lock().unwrap().echo = true;
        self
    }

    /// Always report at least one byte waiting once the command is written
    pub fn never_idle(self) -> Self {
        self.state.lock().unwrap().never_idle = true;
        self
    }

    pub fn failing_writes(self) -> Self {
        self.state.lock().unwrap().fail_write = true;
        self
    }

    pub fn failing_reads(self) -> Self {
        self.state.lock().unwrap().fail_read = true;
        self
    }

    /// Leave bytes in the receive queue as if left over from an earlier command
    pub fn with_stale_input(self, bytes: &[u8]) -> Self {
        self.state.lock().unwrap().pending.extend(bytes.iter().copied());
        self
    }

    /// Shared handle for inspecting the modem after the channel took ownership
    pub fn state(&self) -> Arc<Mutex<ModemState>> {
        Arc::clone(&self.state)
    }
}

impl Read for ScriptedModem {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_read {
            return Err(io::Error::other("device disconnected"));
        }
        state.release();
        let n = buf.len().min(state.pending.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedModem {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        state.written.extend_from_slice(buf);
        if state.written_at.is_none() {
            state.written_at = Some(Instant::now());
        }
        if state.echo {
            state.pending.extend(buf.iter().copied());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for ScriptedModem {
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        state.clears += 1;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let mut state = self.state.lock().unwrap();
        if state.fail_read {
            return Err(io::Error::other("device disconnected"));
        }
        state.release();
        Ok(state.pending.len() as u32)
    }
}
