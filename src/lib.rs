//! Raspberry Pi remote-control client
//!
//! Keeps a command channel to a Pi open over Bluetooth RFCOMM, falling back
//! to TCP over WiFi, and delivers text commands over whichever link is up.

pub mod connection;
pub mod error;
pub mod handshake;
pub mod peer;
pub mod transport;

#[cfg(test)]
mod testing;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, EventReceiver,
    LinkState,
};
pub use error::{ConnectFailure, FailureReason, LinkError, SendFailed};
pub use handshake::{HandshakeConfig, HandshakeOutcome};
pub use peer::PeerIdentity;
pub use transport::{BluetoothConfig, TransportKind};
pub use rpi_remote_shared::{Command, Reply};
