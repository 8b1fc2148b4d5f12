//! Static identity of the Pi peer

use bluer::Uuid;
use rpi_remote_shared::defaults;

/// Serial Port Profile service class, `00001101-0000-1000-8000-00805F9B34FB`
pub const SERIAL_PORT_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5F9B_34FB);

/// Where to find the peer. Supplied once at manager construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Name the peer was paired under
    pub bluetooth_name: String,
    /// WiFi host name or IP
    pub host: String,
    /// WiFi TCP port
    pub port: u16,
    /// Service looked up on the peer for profile connections
    pub service_uuid: Uuid,
}

impl PeerIdentity {
    /// `host:port` for the WiFi connector
    pub fn wifi_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for PeerIdentity {
    fn default() -> Self {
        Self {
            bluetooth_name: defaults::PEER_NAME.into(),
            host: "raspberrypi.local".into(),
            port: defaults::WIFI_PORT,
            service_uuid: SERIAL_PORT_UUID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_identity() {
        let peer = PeerIdentity::default();
        assert_eq!(peer.bluetooth_name, "RaspberryPi-BT");
        assert_eq!(peer.wifi_address(), "raspberrypi.local:8888");
    }

    #[test]
    fn test_uuid_matches_shared_default() {
        let parsed = Uuid::parse_str(defaults::SERVICE_UUID).unwrap();
        assert_eq!(SERIAL_PORT_UUID, parsed);
    }
}
