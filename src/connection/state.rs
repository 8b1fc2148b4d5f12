//! Connection state as seen from outside the manager

use crate::transport::TransportKind;
use std::fmt;

/// The manager's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    BluetoothConnected,
    WiFiConnected,
}

impl LinkState {
    pub fn connected(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Bluetooth => LinkState::BluetoothConnected,
            TransportKind::WiFi => LinkState::WiFiConnected,
        }
    }

    /// Active transport, if any
    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            LinkState::Disconnected => None,
            LinkState::BluetoothConnected => Some(TransportKind::Bluetooth),
            LinkState::WiFiConnected => Some(TransportKind::WiFi),
        }
    }

    pub fn signals(&self) -> ConnectionState {
        ConnectionState {
            bluetooth_connected: *self == LinkState::BluetoothConnected,
            wifi_connected: *self == LinkState::WiFiConnected,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::BluetoothConnected => write!(f, "connected via Bluetooth"),
            LinkState::WiFiConnected => write!(f, "connected via WiFi"),
        }
    }
}

/// The two signals the presentation layer observes.
/// At most one is true; both may briefly read false during a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub bluetooth_connected: bool,
    pub wifi_connected: bool,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.bluetooth_connected || self.wifi_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_are_exclusive() {
        for state in [
            LinkState::Disconnected,
            LinkState::BluetoothConnected,
            LinkState::WiFiConnected,
        ] {
            let signals = state.signals();
            assert!(!(signals.bluetooth_connected && signals.wifi_connected));
            assert_eq!(signals.is_connected(), state.transport().is_some());
        }
    }

    #[test]
    fn test_connected_state_per_kind() {
        assert_eq!(
            LinkState::connected(TransportKind::WiFi).signals(),
            ConnectionState {
                bluetooth_connected: false,
                wifi_connected: true,
            }
        );
        assert_eq!(LinkState::default(), LinkState::Disconnected);
    }
}
