//! Connection management for the Pi peer
//!
//! This module handles:
//! - Bluetooth-first connection with WiFi fallback
//! - Per-command transport selection with a single reconnect
//! - Observable connection state and status events

mod manager;
mod state;

pub use manager::{ConnectionConfig, ConnectionEvent, ConnectionManager, EventReceiver};
pub use state::{ConnectionState, LinkState};
