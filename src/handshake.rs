//! Post-connect greeting exchange
//!
//! ```text
//! peer   -> client : WELCOME_RPi      (within 5 s)
//! client -> peer   : PING
//! peer   -> client : HANDSHAKE_OK     (within 3 s)
//! ```
//!
//! This is a liveness probe with no security property. Every step is
//! best-effort: a failure is logged, the exchange stops, and the connection
//! stays up.

use crate::transport::Transport;
use rpi_remote_shared::{defaults, handshake};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeouts and read size for the exchange
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub greeting_timeout: Duration,
    pub confirm_timeout: Duration,
    pub max_read: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            greeting_timeout: Duration::from_millis(defaults::GREETING_TIMEOUT_MS),
            confirm_timeout: Duration::from_millis(defaults::CONFIRM_TIMEOUT_MS),
            max_read: defaults::MAX_MESSAGE_LEN,
        }
    }
}

/// How far the exchange got. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Peer greeted and confirmed the probe
    Confirmed,
    /// Peer skipped or garbled a step
    Unconfirmed,
    /// Peer greeted but never confirmed
    TimedOut,
}

impl fmt::Display for HandshakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeOutcome::Confirmed => write!(f, "confirmed"),
            HandshakeOutcome::Unconfirmed => write!(f, "unconfirmed"),
            HandshakeOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Run the exchange on a freshly connected transport
pub async fn perform(transport: &mut Transport, config: &HandshakeConfig) -> HandshakeOutcome {
    let greeting = read_text(transport, config.greeting_timeout, config.max_read).await;

    match greeting.as_deref() {
        Some(handshake::GREETING) => {
            info!("[Handshake] Received greeting {:?}", handshake::GREETING);
        }
        Some(other) => {
            warn!("[Handshake] Unexpected greeting {:?}, sending bare probe", other);
            send_probe(transport).await;
            return HandshakeOutcome::Unconfirmed;
        }
        None => {
            warn!("[Handshake] No greeting, sending bare probe");
            send_probe(transport).await;
            return HandshakeOutcome::Unconfirmed;
        }
    }

    if !send_probe(transport).await {
        return HandshakeOutcome::Unconfirmed;
    }

    match read_text(transport, config.confirm_timeout, config.max_read).await {
        Some(confirmation) if confirmation == handshake::CONFIRMATION => {
            info!("[Handshake] Peer confirmed");
            HandshakeOutcome::Confirmed
        }
        Some(confirmation) => {
            warn!(
                "[Handshake] Confirmation mismatch {:?}, keeping connection",
                confirmation
            );
            HandshakeOutcome::Unconfirmed
        }
        None => {
            warn!(
                "[Handshake] No confirmation within {:?}",
                config.confirm_timeout
            );
            HandshakeOutcome::TimedOut
        }
    }
}

async fn send_probe(transport: &mut Transport) -> bool {
    match transport.send(handshake::PROBE.as_bytes()).await {
        Ok(()) => {
            debug!("[Handshake] Sent {}", handshake::PROBE);
            true
        }
        Err(e) => {
            warn!("[Handshake] Probe write failed: {}", e);
            false
        }
    }
}

/// One bounded read, trimmed. `None` on timeout, EOF or read error.
async fn read_text(transport: &mut Transport, wait: Duration, max: usize) -> Option<String> {
    match transport.receive(max, wait).await {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).trim().to_string()),
        Err(e) => {
            debug!("[Handshake] Read failed: {}", e);
            None
        }
    }
}
