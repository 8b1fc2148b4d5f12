//! Raspberry Pi Remote Shared Protocol
//!
//! This crate provides the command vocabulary, handshake literals and reply
//! grammar spoken between the remote-control client and the Pi peer.

pub mod command;
pub mod reply;

pub use command::{Command, ProtocolError};
pub use reply::Reply;

/// Literals exchanged during the post-connect greeting
pub mod handshake {
    /// Sent by the peer as soon as a client connects
    pub const GREETING: &str = "WELCOME_RPi";

    /// Sent by the client in answer to the greeting (and as a bare probe)
    pub const PROBE: &str = "PING";

    /// Sent by the peer once it accepted the probe
    pub const CONFIRMATION: &str = "HANDSHAKE_OK";

    /// Probe words the peer accepts as a handshake answer
    pub const ACCEPTED_PROBES: [&str; 3] = ["PING", "HELLO", "CONNECT"];
}

/// Static link parameters an operator normally leaves alone
pub mod defaults {
    /// Bluetooth name the Pi advertises
    pub const PEER_NAME: &str = "RaspberryPi-BT";

    /// TCP port the Pi listens on for the WiFi link
    pub const WIFI_PORT: u16 = 8888;

    /// Serial Port Profile service class UUID
    pub const SERVICE_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

    /// RFCOMM channel used when binding to a channel number directly
    pub const RFCOMM_CHANNEL: u8 = 1;

    /// Largest single read on either side of the link
    pub const MAX_MESSAGE_LEN: usize = 1024;

    /// Wait for the peer greeting after connecting
    pub const GREETING_TIMEOUT_MS: u64 = 5000;

    /// Wait for the handshake confirmation after the probe
    pub const CONFIRM_TIMEOUT_MS: u64 = 3000;
}
