//! Single-shot AT transactions
//!
//! A transaction writes one command, then polls the channel on a fixed
//! interval. Polling runs as a small state machine:
//!
//! ```text
//! Waiting ──data──▶ Accumulating ──quiet poll──▶ Done
//!    │                   │
//!    └──── deadline ─────┴──────────────────────▶ TimedOut
//! ```
//!
//! In [`PollMode::SinglePass`] the first poll inside the deadline goes straight
//! to `Done` with whatever was drained, which is the legacy atcom behaviour.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{AtError, SerialChannel, DEFAULT_TIMEOUT_SECS, POLL_INTERVAL_MS};

/// How many read bursts are merged before a transaction returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollMode {
    /// Keep reading until a poll finds no new bytes after data has arrived
    #[default]
    UntilQuiet,
    /// Return after the first poll, with whatever was available then
    SinglePass,
}

impl FromStr for PollMode {
    type Err = AtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "until-quiet" => Ok(PollMode::UntilQuiet),
            "single-pass" => Ok(PollMode::SinglePass),
            other => Err(AtError::InvalidConfig(format!(
                "unknown poll mode '{other}' (expected until-quiet or single-pass)"
            ))),
        }
    }
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollMode::UntilQuiet => f.write_str("until-quiet"),
            PollMode::SinglePass => f.write_str("single-pass"),
        }
    }
}

/// Polling state of an in-flight transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Command written, nothing received yet
    Waiting,
    /// At least one burst received, more may follow
    Accumulating,
    /// Deadline reached
    TimedOut,
    /// Reply complete
    Done,
}

/// One command to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Command text, without terminator
    pub command: String,
    /// Budget for the whole reply, measured from the end of the write
    pub timeout: Duration,
}

impl TransactionRequest {
    /// Request with the default timeout
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Text accumulated from the modem for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    /// Decoded reply, in arrival order
    pub text: String,
}

/// Outcome of [`TransactionEngine::transact`]
pub type TransactionResult = Result<RawResponse, AtError>;

/// Drives write-then-poll transactions over a [`SerialChannel`]
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    poll_interval: Duration,
    mode: PollMode,
    keep_partial: bool,
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            mode: PollMode::UntilQuiet,
            keep_partial: true,
        }
    }
}

impl TransactionEngine {
    /// Engine with a 100ms poll interval, until-quiet polling and partial replies kept
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the polling mode
    pub fn with_mode(mut self, mode: PollMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether data received before the deadline is returned instead of `Timeout`
    pub fn with_keep_partial(mut self, keep: bool) -> Self {
        self.keep_partial = keep;
        self
    }

    /// Current poll interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Current polling mode
    pub fn mode(&self) -> PollMode {
        self.mode
    }

    /// Send `request.command` and collect the reply
    ///
    /// The write always happens before any read. Write and read failures are
    /// returned at once; the transaction is never retried.
    pub fn transact(
        &self,
        channel: &mut SerialChannel,
        request: &TransactionRequest,
    ) -> TransactionResult {
        channel.write_command(&request.command)?;

        let start = Instant::now();
        let mut buffer = String::new();
        let mut state = PollState::Waiting;

        loop {
            thread::sleep(self.poll_interval);
            let elapsed = start.elapsed();

            let next = if elapsed >= request.timeout {
                PollState::TimedOut
            } else {
                self.poll(channel, &mut buffer, state)?
            };
            if next != state {
                debug!(from = ?state, to = ?next, elapsed_ms = elapsed.as_millis() as u64, "poll state");
            }
            state = next;

            match state {
                PollState::Done => {
                    debug!(bytes = buffer.len(), "transaction complete");
                    return Ok(RawResponse { text: buffer });
                }
                PollState::TimedOut => return self.finish_at_deadline(buffer, request),
                PollState::Waiting | PollState::Accumulating => {}
            }
        }
    }

    /// Take one read of what is available and decide the next state
    ///
    /// Exactly one read per poll, so a line that never goes idle still
    /// reaches the deadline check on the next iteration.
    fn poll(
        &self,
        channel: &mut SerialChannel,
        buffer: &mut String,
        state: PollState,
    ) -> Result<PollState, AtError> {
        let mut received = false;
        if channel.bytes_available()? > 0 {
            let chunk = channel.read_available()?;
            received = !chunk.is_empty();
            buffer.push_str(&chunk);
        }

        Ok(match (self.mode, state, received) {
            (PollMode::SinglePass, _, _) => PollState::Done,
            (PollMode::UntilQuiet, _, true) => PollState::Accumulating,
            (PollMode::UntilQuiet, PollState::Accumulating, false) => PollState::Done,
            (PollMode::UntilQuiet, current, false) => current,
        })
    }

    fn finish_at_deadline(&self, buffer: String, request: &TransactionRequest) -> TransactionResult {
        let timeout_ms = request.timeout.as_millis() as u64;
        if self.keep_partial && !buffer.is_empty() {
            warn!(timeout_ms, bytes = buffer.len(), "deadline reached, returning partial reply");
            return Ok(RawResponse { text: buffer });
        }
        debug!(timeout_ms, discarded = buffer.len(), "transaction timed out");
        Err(AtError::Timeout { timeout_ms })
    }
}
