//! TCP transport implementation for the WiFi link

use crate::error::LinkError;
use crate::transport::link::{Transport, TransportKind};
use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

/// TCP stream wrapper implementing TransportStream
pub struct TcpTransportStream {
    inner: TcpStream,
}

impl TcpTransportStream {
    pub fn new(stream: TcpStream) -> Self {
        Self { inner: stream }
    }
}

impl AsyncRead for TcpTransportStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransportStream {
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
impl TransportStream for TcpTransportStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.peer_addr().is_ok()
    }
}

/// TCP connector for the Pi's WiFi address
pub struct WifiConnector {
    address: String,
    connect_timeout: Duration,
}

impl WifiConnector {
    /// Create a connector for `host:port`
    pub fn new(address: String, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl TransportConnector for WifiConnector {
    async fn connect(&self) -> Result<Transport, LinkError> {
        info!("[WiFi] Connecting to {}", self.address);

        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(LinkError::ConnectionFailed {
                    kind: TransportKind::WiFi,
                    source: Box::new(e),
                })
            }
            Err(_) => {
                return Err(LinkError::ConnectionFailed {
                    kind: TransportKind::WiFi,
                    source: Box::new(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no answer within {:?}", self.connect_timeout),
                    )),
                })
            }
        };

        // Commands are tiny; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("[WiFi] Could not disable Nagle: {}", e);
        }

        info!("[WiFi] Connected to {}", self.address);
        Ok(Transport::new(TransportKind::WiFi, TcpTransportStream::new(stream)))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WiFi
    }
}
