//! RFCOMM stream implementation for Bluetooth connections

use crate::transport::traits::TransportStream;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::rfcomm::{ProfileHandle, SocketAddr as RfcommAddr, Stream as RfcommStream};
use bluer::Address;
use rpi_remote_shared::defaults;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

/// RFCOMM channel the Pi's serial service usually sits on
pub const DEFAULT_RFCOMM_CHANNEL: u8 = defaults::RFCOMM_CHANNEL;

/// RFCOMM stream wrapper implementing TransportStream
pub struct RfcommTransportStream {
    inner: RfcommStream,
    peer_addr: Address,
    /// Keeps a registered client profile alive for as long as its connection
    _profile: Option<Pin<Box<ProfileHandle>>>,
}

impl RfcommTransportStream {
    /// Create a new RFCOMM transport stream
    pub fn new(stream: RfcommStream, peer_addr: Address) -> Self {
        Self {
            inner: stream,
            peer_addr,
            _profile: None,
        }
    }

    /// Create a stream obtained through a registered profile
    pub fn with_profile(
        stream: RfcommStream,
        peer_addr: Address,
        profile: Pin<Box<ProfileHandle>>,
    ) -> Self {
        Self {
            inner: stream,
            peer_addr,
            _profile: Some(profile),
        }
    }

    /// Get the peer Bluetooth address
    pub fn peer_address(&self) -> Address {
        self.peer_addr
    }
}

impl AsyncRead for RfcommTransportStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RfcommTransportStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl TransportStream for RfcommTransportStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.peer_addr().is_ok()
    }
}

/// Open a raw RFCOMM socket to a fixed channel, bypassing service discovery
pub async fn connect_channel(address: Address, channel: u8) -> Result<RfcommTransportStream> {
    let socket_addr = RfcommAddr::new(address, channel);
    debug!("[BT] Connecting to {} channel {}", address, channel);

    let stream = RfcommStream::connect(socket_addr)
        .await
        .map_err(|e| anyhow!("RFCOMM connect failed: {}", e))?;

    Ok(RfcommTransportStream::new(stream, address))
}
