//! Error taxonomy for the remote-control link

use crate::transport::TransportKind;
use std::fmt;
use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while opening or using a single transport
#[derive(Error, Debug)]
pub enum LinkError {
    /// No Bluetooth hardware, adapter disabled, or BlueZ unreachable
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),

    #[error("No paired device named {0:?}")]
    PeerNotPaired(String),

    /// Transport-level connect failure, cause preserved for diagnostics
    #[error("{kind} connection failed: {source}")]
    ConnectionFailed {
        kind: TransportKind,
        #[source]
        source: BoxError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Operator-facing reason a `connect()` came back empty-handed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoPairedPeer,
    AdapterUnavailable,
    PermissionDenied,
    TransportRefused,
}

impl FailureReason {
    /// Pick the reason from the Bluetooth error; anything that is not a
    /// Bluetooth precondition failure counts as the transports refusing us.
    pub fn from_bluetooth(err: &LinkError) -> Self {
        match err {
            LinkError::PeerNotPaired(_) => FailureReason::NoPairedPeer,
            LinkError::AdapterUnavailable(_) => FailureReason::AdapterUnavailable,
            LinkError::PermissionDenied(_) => FailureReason::PermissionDenied,
            LinkError::ConnectionFailed { .. } | LinkError::Io(_) => FailureReason::TransportRefused,
        }
    }

    /// Stable short code for status displays
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::NoPairedPeer => "no-paired-peer",
            FailureReason::AdapterUnavailable => "adapter-unavailable",
            FailureReason::PermissionDenied => "permission-denied",
            FailureReason::TransportRefused => "transport-refused",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::NoPairedPeer => "no paired peer",
            FailureReason::AdapterUnavailable => "Bluetooth adapter disabled or unsupported",
            FailureReason::PermissionDenied => "Bluetooth permission denied",
            FailureReason::TransportRefused => "transport refused",
        };
        f.write_str(text)
    }
}

/// Both transports failed during `connect()`
#[derive(Error, Debug)]
#[error("Connection failed ({reason}): Bluetooth: {bluetooth}; WiFi: {wifi}")]
pub struct ConnectFailure {
    pub reason: FailureReason,
    pub bluetooth: String,
    pub wifi: String,
}

impl ConnectFailure {
    pub fn new(bluetooth: &LinkError, wifi: &LinkError) -> Self {
        Self {
            reason: FailureReason::from_bluetooth(bluetooth),
            bluetooth: bluetooth.to_string(),
            wifi: wifi.to_string(),
        }
    }
}

/// A command could not be delivered on any transport, even after one reconnect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Command {command:?} was not sent: {cause}")]
pub struct SendFailed {
    pub command: String,
    pub cause: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_from_bluetooth_error() {
        let not_paired = LinkError::PeerNotPaired("RaspberryPi-BT".into());
        assert_eq!(FailureReason::from_bluetooth(&not_paired), FailureReason::NoPairedPeer);

        let refused = LinkError::ConnectionFailed {
            kind: TransportKind::Bluetooth,
            source: "all 3 connection strategies failed".into(),
        };
        assert_eq!(FailureReason::from_bluetooth(&refused), FailureReason::TransportRefused);
    }

    #[test]
    fn test_connect_failure_message() {
        let failure = ConnectFailure::new(
            &LinkError::AdapterUnavailable("no default adapter".into()),
            &LinkError::ConnectionFailed {
                kind: TransportKind::WiFi,
                source: "connection refused".into(),
            },
        );

        assert_eq!(failure.reason, FailureReason::AdapterUnavailable);
        assert_eq!(failure.reason.code(), "adapter-unavailable");
        assert_eq!(
            failure.to_string(),
            "Connection failed (Bluetooth adapter disabled or unsupported): \
             Bluetooth: Bluetooth adapter unavailable: no default adapter; \
             WiFi: WiFi connection failed: connection refused"
        );
    }
}
