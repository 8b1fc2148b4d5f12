//! Bluetooth transport layer using RFCOMM
//!
//! Peer firmware differs in which connection methods it accepts, so the
//! connector walks an ordered list of strategies and keeps the first stream
//! that comes up connected:
//! 1. authenticated profile connection bound to the service UUID
//! 2. raw socket bound to a fixed RFCOMM channel
//! 3. unauthenticated profile connection bound to the service UUID

use crate::error::LinkError;
use crate::peer::PeerIdentity;
use crate::transport::link::{Transport, TransportKind};
use crate::transport::paired::{self, PairedDevice};
use crate::transport::rfcomm::{self, RfcommTransportStream, DEFAULT_RFCOMM_CHANNEL};
use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::rfcomm::{Profile, ReqError, Role};
use bluer::{Adapter, Session, Uuid};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bluetooth connector configuration
#[derive(Debug, Clone)]
pub struct BluetoothConfig {
    /// RFCOMM channel for the channel-binding strategy
    pub channel: u8,
    /// Upper bound for a single strategy attempt
    pub attempt_timeout: Duration,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_RFCOMM_CHANNEL,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// One method of opening an RFCOMM stream to a paired peer
#[async_trait]
pub trait ConnectStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Try to open a stream to the peer
    async fn try_connect(&self, peer: &PairedDevice) -> Result<Box<dyn TransportStream>>;
}

/// Connects by registering a client profile for the service UUID and asking
/// BlueZ to connect it.
pub struct ProfileStrategy {
    session: Session,
    adapter: Adapter,
    uuid: Uuid,
    secure: bool,
}

impl ProfileStrategy {
    /// Authenticated channel bound to the service UUID
    pub fn secure(session: Session, adapter: Adapter, uuid: Uuid) -> Self {
        Self {
            session,
            adapter,
            uuid,
            secure: true,
        }
    }

    /// Channel bound to the service UUID without authentication
    pub fn insecure(session: Session, adapter: Adapter, uuid: Uuid) -> Self {
        Self {
            session,
            adapter,
            uuid,
            secure: false,
        }
    }
}

#[async_trait]
impl ConnectStrategy for ProfileStrategy {
    fn name(&self) -> &'static str {
        if self.secure {
            "secure service"
        } else {
            "insecure service"
        }
    }

    async fn try_connect(&self, peer: &PairedDevice) -> Result<Box<dyn TransportStream>> {
        let profile = Profile {
            uuid: self.uuid,
            role: Some(Role::Client),
            require_authentication: Some(self.secure),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };

        let mut handle = Box::pin(self.session.register_profile(profile).await?);
        let device = self.adapter.device(peer.address)?;

        let connect = device.connect_profile(&self.uuid);
        tokio::pin!(connect);
        let mut requested = false;

        loop {
            tokio::select! {
                res = &mut connect, if !requested => {
                    requested = true;
                    res.map_err(|e| anyhow!("profile connect failed: {}", e))?;
                }
                req = handle.next() => {
                    let req = req.ok_or_else(|| anyhow!("profile unregistered"))?;
                    if req.device() != peer.address {
                        req.reject(ReqError::Rejected);
                        continue;
                    }
                    let stream = req.accept()?;
                    return Ok(Box::new(RfcommTransportStream::with_profile(
                        stream,
                        peer.address,
                        handle,
                    )));
                }
            }
        }
    }
}

/// Connects a raw RFCOMM socket straight to a channel number, for peers
/// whose service record cannot be resolved.
pub struct ChannelStrategy {
    channel: u8,
}

impl ChannelStrategy {
    pub fn new(channel: u8) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ConnectStrategy for ChannelStrategy {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn try_connect(&self, peer: &PairedDevice) -> Result<Box<dyn TransportStream>> {
        let stream = rfcomm::connect_channel(peer.address, self.channel).await?;
        debug!(
            "[BT] Channel {} socket open to {}",
            self.channel,
            stream.peer_address()
        );
        Ok(Box::new(stream))
    }
}

/// The strategies in the order they are tried
pub fn default_strategies(
    session: Session,
    adapter: Adapter,
    uuid: Uuid,
    config: &BluetoothConfig,
) -> Vec<Box<dyn ConnectStrategy>> {
    vec![
        Box::new(ProfileStrategy::secure(session.clone(), adapter.clone(), uuid)),
        Box::new(ChannelStrategy::new(config.channel)),
        Box::new(ProfileStrategy::insecure(session, adapter, uuid)),
    ]
}

/// Try each strategy in order and return the first connected stream.
///
/// A strategy that errors, times out or yields a disconnected stream is
/// discarded and the next one is tried.
pub async fn try_strategies(
    strategies: &[Box<dyn ConnectStrategy>],
    peer: &PairedDevice,
    attempt_timeout: Duration,
) -> Result<(&'static str, Box<dyn TransportStream>), LinkError> {
    for strategy in strategies {
        info!("[BT] Trying {} connection to {}", strategy.name(), peer.address);

        match timeout(attempt_timeout, strategy.try_connect(peer)).await {
            Ok(Ok(stream)) if stream.is_connected() => {
                info!("[BT] {} connection succeeded", strategy.name());
                return Ok((strategy.name(), stream));
            }
            Ok(Ok(mut stream)) => {
                warn!("[BT] {} connection did not report connected", strategy.name());
                let _ = TransportStream::shutdown(stream.as_mut()).await;
            }
            Ok(Err(e)) => {
                warn!("[BT] {} connection failed: {}", strategy.name(), e);
            }
            Err(_) => {
                warn!(
                    "[BT] {} connection timed out after {:?}",
                    strategy.name(),
                    attempt_timeout
                );
            }
        }
    }

    Err(LinkError::ConnectionFailed {
        kind: TransportKind::Bluetooth,
        source: format!("all {} connection strategies failed", strategies.len()).into(),
    })
}

/// Bluetooth connector for the paired Pi
pub struct BluetoothConnector {
    peer: PeerIdentity,
    config: BluetoothConfig,
}

impl BluetoothConnector {
    pub fn new(peer: PeerIdentity, config: BluetoothConfig) -> Self {
        Self { peer, config }
    }
}

#[async_trait]
impl TransportConnector for BluetoothConnector {
    async fn connect(&self) -> Result<Transport, LinkError> {
        info!("[BT] Looking for paired device {:?}", self.peer.bluetooth_name);

        let (session, adapter) = paired::open_adapter().await?;
        let devices = paired::bonded_devices(&adapter).await?;
        let peer = paired::select_peer(&devices, &self.peer.bluetooth_name)
            .ok_or_else(|| LinkError::PeerNotPaired(self.peer.bluetooth_name.clone()))?;

        let strategies = default_strategies(session, adapter, self.peer.service_uuid, &self.config);
        let (strategy, stream) =
            try_strategies(&strategies, peer, self.config.attempt_timeout).await?;

        info!(
            "[BT] Connected to {} ({}) via {} strategy",
            self.peer.bluetooth_name, peer.address, strategy
        );
        Ok(Transport::from_boxed(TransportKind::Bluetooth, stream))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Bluetooth
    }
}
