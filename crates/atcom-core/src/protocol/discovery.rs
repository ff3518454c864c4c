//! Modem auto-discovery
//!
//! Probes candidate ports with a bare `AT` and picks the first one that
//! answers `OK`.

use std::time::Duration;
use tracing::{debug, info};

use super::{
    list_ports, AtError, ChannelConfig, SerialChannel, TransactionEngine, TransactionRequest,
};

const PROBE_COMMAND: &str = "AT";

/// Find the first port with a responsive modem
///
/// Every candidate from [`list_ports`] gets exactly one probe. Ports that
/// cannot be opened, stay silent or answer without `OK` are skipped.
pub fn find_modem(baud_rate: u32, probe_timeout: Duration) -> Option<String> {
    let candidates = list_ports();
    info!(count = candidates.len(), "searching for modem");

    let engine = TransactionEngine::new();
    let found = first_responsive(candidates, |port| {
        let config = ChannelConfig::new(port, baud_rate);
        let mut channel = SerialChannel::open(&config)?;
        let request = TransactionRequest::new(PROBE_COMMAND).with_timeout(probe_timeout);
        engine.transact(&mut channel, &request).map(|raw| raw.text)
    });

    if let Some(port) = &found {
        info!(port = %port, "found a modem");
    }
    found
}

/// Walk `candidates` in order and return the first whose probe replies `OK`
fn first_responsive<I, F>(candidates: I, mut probe: F) -> Option<String>
where
    I: IntoIterator<Item = String>,
    F: FnMut(&str) -> Result<String, AtError>,
{
    candidates.into_iter().find(|port| match probe(port) {
        Ok(reply) if is_ok_reply(&reply) => true,
        Ok(reply) => {
            debug!(port = %port, reply = %reply.trim(), "no OK in probe reply");
            false
        }
        Err(e) => {
            debug!(port = %port, error = %e, "probe failed");
            false
        }
    })
}

fn is_ok_reply(reply: &str) -> bool {
    reply.lines().any(|line| line.trim() == "OK")
}
