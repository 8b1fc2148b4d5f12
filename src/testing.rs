//! In-memory transports and scripted connectors for unit tests

use crate::error::LinkError;
use crate::handshake::HandshakeConfig;
use crate::transport::{Transport, TransportConnector, TransportKind, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};

/// One end of an in-memory pipe posing as a socket
pub struct MemoryStream {
    inner: DuplexStream,
    connected: bool,
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
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
impl TransportStream for MemoryStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// A stream whose far end is already gone
pub fn duplex_stream(connected: bool) -> MemoryStream {
    let (inner, _peer) = tokio::io::duplex(4096);
    MemoryStream { inner, connected }
}

/// A connected transport plus the peer's end of the pipe
pub fn duplex_transport(kind: TransportKind) -> (Transport, DuplexStream) {
    let (inner, peer) = tokio::io::duplex(4096);
    let stream = MemoryStream {
        inner,
        connected: true,
    };
    (Transport::new(kind, stream), peer)
}

/// Accepts `writes_before_failure` writes, then fails every write with
/// `BrokenPipe`. Reads never complete.
pub struct FlakyStream {
    writes_left: usize,
}

impl FlakyStream {
    pub fn new(writes_before_failure: usize) -> Self {
        Self {
            writes_left: writes_before_failure,
        }
    }
}

impl AsyncRead for FlakyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for FlakyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.writes_left == 0 {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        self.writes_left -= 1;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl TransportStream for FlakyStream {
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Connector that replays a fixed list of results and counts calls.
/// Once the script runs out every call is refused.
pub struct ScriptedConnector {
    kind: TransportKind,
    script: Mutex<VecDeque<Result<Transport, LinkError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(kind: TransportKind, script: Vec<Result<Transport, LinkError>>) -> Self {
        Self {
            kind,
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter, readable after the connector moved into a manager
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Transport, LinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(refused(self.kind)))
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

pub fn refused(kind: TransportKind) -> LinkError {
    LinkError::ConnectionFailed {
        kind,
        source: Box::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
    }
}

/// Handshake timeouts short enough for tests that expect them to expire
pub fn fast_handshake() -> HandshakeConfig {
    HandshakeConfig {
        greeting_timeout: Duration::from_millis(50),
        confirm_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

/// Read whatever arrives within a second, as text
pub async fn read_available(peer: &mut DuplexStream) -> String {
    let mut buf = [0u8; 1024];
    match tokio::time::timeout(Duration::from_secs(1), peer.read(&mut buf)).await {
        Ok(Ok(n)) => String::from_utf8_lossy(&buf[..n]).into_owned(),
        _ => String::new(),
    }
}

/// Keep reading until `expected` shows up at the end of the received bytes
pub async fn read_until(peer: &mut DuplexStream, expected: &str) -> String {
    let mut received = String::new();
    while !received.ends_with(expected) {
        let chunk = read_available(peer).await;
        if chunk.is_empty() {
            break;
        }
        received.push_str(&chunk);
    }
    received
}
