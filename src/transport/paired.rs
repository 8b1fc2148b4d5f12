//! Adapter access and bonded-device lookup for the Pi peer

use crate::error::LinkError;
use bluer::{Adapter, Address, ErrorKind, Session};
use tracing::{debug, info};

/// A device already bonded with the local adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    /// Bluetooth MAC address
    pub address: Address,
    /// Remote name, if the adapter knows it
    pub name: Option<String>,
}

/// Open a BlueZ session and the default adapter.
///
/// A missing or powered-off adapter is reported, not fixed: the adapter is
/// never powered on from here.
pub async fn open_adapter() -> Result<(Session, Adapter), LinkError> {
    let session = Session::new().await.map_err(classify)?;
    let adapter = session.default_adapter().await.map_err(classify)?;

    if !adapter.is_powered().await.map_err(classify)? {
        return Err(LinkError::AdapterUnavailable(format!(
            "adapter {} is powered off",
            adapter.name()
        )));
    }

    Ok((session, adapter))
}

/// List the devices bonded with the adapter
pub async fn bonded_devices(adapter: &Adapter) -> Result<Vec<PairedDevice>, LinkError> {
    let mut devices = Vec::new();

    for address in adapter.device_addresses().await.map_err(classify)? {
        let Ok(device) = adapter.device(address) else {
            continue;
        };
        if !matches!(device.is_paired().await, Ok(true)) {
            continue;
        }

        let name = device.name().await.ok().flatten();
        debug!("[BT] Paired device: {:?} ({})", name, address);
        devices.push(PairedDevice { address, name });
    }

    Ok(devices)
}

/// Pick the first device whose name matches exactly
pub fn select_peer<'a>(devices: &'a [PairedDevice], name: &str) -> Option<&'a PairedDevice> {
    let peer = devices
        .iter()
        .find(|device| device.name.as_deref() == Some(name));

    if let Some(peer) = peer {
        info!("[BT] Found paired peer {} ({})", name, peer.address);
    }
    peer
}

/// Map a BlueZ error onto the link taxonomy
fn classify(err: bluer::Error) -> LinkError {
    if is_permission_error(&err.kind, &err.message) {
        LinkError::PermissionDenied(err.to_string())
    } else {
        LinkError::AdapterUnavailable(err.to_string())
    }
}

// D-Bus policy refusals arrive as internal errors carrying AccessDenied.
fn is_permission_error(kind: &ErrorKind, message: &str) -> bool {
    matches!(kind, ErrorKind::NotAuthorized | ErrorKind::NotPermitted)
        || message.contains("AccessDenied")
}
