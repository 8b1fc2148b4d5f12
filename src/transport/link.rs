//! A live byte-stream link to the peer
//!
//! Wraps whichever [`TransportStream`] a connector produced and adds the
//! operations the manager needs: raw writes, timeout-bounded reads, idempotent
//! close and a best-effort liveness check.

use crate::transport::traits::TransportStream;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Which physical link a transport runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Bluetooth,
    WiFi,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Bluetooth => "Bluetooth",
            TransportKind::WiFi => "WiFi",
        }
    }

    /// The transport tried when this one is unusable
    pub fn other(&self) -> TransportKind {
        match self {
            TransportKind::Bluetooth => TransportKind::WiFi,
            TransportKind::WiFi => TransportKind::Bluetooth,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A connected transport owned by the connection manager
pub struct Transport {
    kind: TransportKind,
    /// `None` once closed
    stream: Option<Box<dyn TransportStream>>,
    /// Set after a failed write, a failed read or end-of-stream
    dead: bool,
}

impl Transport {
    pub fn new<S: TransportStream>(kind: TransportKind, stream: S) -> Self {
        Self::from_boxed(kind, Box::new(stream))
    }

    pub fn from_boxed(kind: TransportKind, stream: Box<dyn TransportStream>) -> Self {
        Self {
            kind,
            stream: Some(stream),
            dead: false,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Write all bytes and flush. No framing is added.
    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(closed)?;

        let result = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        }
        .await;

        if result.is_err() {
            self.dead = true;
        }
        result
    }

    /// Read at most `max` bytes, waiting no longer than `wait`.
    ///
    /// Returns an empty buffer on timeout. End-of-stream is reported as
    /// `UnexpectedEof` and marks the transport dead.
    pub async fn receive(&mut self, max: usize, wait: Duration) -> io::Result<Bytes> {
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        let mut buf = vec![0u8; max.max(1)];

        match timeout(wait, stream.read(&mut buf)).await {
            Err(_) => Ok(Bytes::new()),
            Ok(Ok(0)) => {
                self.dead = true;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                ))
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            Ok(Err(e)) => {
                self.dead = true;
                Err(e)
            }
        }
    }

    /// Throw away input that is already buffered, without waiting for more.
    /// Returns the number of bytes dropped.
    pub async fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        loop {
            match self.receive(PENDING_CHUNK, Duration::ZERO).await {
                Ok(bytes) if bytes.is_empty() => break,
                Ok(bytes) => dropped += bytes.len(),
                Err(_) => break,
            }
        }
        if dropped > 0 {
            debug!("[{}] Discarded {} stale bytes", self.kind, dropped);
        }
        dropped
    }

    /// Close the transport. Safe to call more than once; shutdown errors are ignored.
    pub async fn close(&mut self) {
        self.dead = true;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = TransportStream::shutdown(stream.as_mut()).await {
                debug!("[{}] Shutdown error ignored: {}", self.kind, e);
            }
        }
    }

    /// Best-effort liveness: not closed, no I/O failure seen, socket still connected
    pub fn is_alive(&self) -> bool {
        !self.dead && self.stream.as_ref().is_some_and(|s| s.is_connected())
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .field("open", &self.stream.is_some())
            .field("dead", &self.dead)
            .finish()
    }
}

const PENDING_CHUNK: usize = 1024;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport is closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{duplex_transport, FlakyStream};

    #[tokio::test]
    async fn test_send_writes_raw_bytes() {
        let (mut transport, mut peer) = duplex_transport(TransportKind::WiFi);
        transport.send(b"OLED_CLEAR").await.unwrap();

        let mut buf = [0u8; 32];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"OLED_CLEAR");
        assert!(transport.is_alive());
    }

    #[tokio::test]
    async fn test_receive_times_out_empty() {
        let (mut transport, _peer) = duplex_transport(TransportKind::Bluetooth);
        let bytes = transport
            .receive(1024, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(bytes.is_empty());
        assert!(transport.is_alive());
    }

    #[tokio::test]
    async fn test_receive_respects_max() {
        let (mut transport, mut peer) = duplex_transport(TransportKind::Bluetooth);
        peer.write_all(b"HANDSHAKE_OK").await.unwrap();

        let bytes = transport
            .receive(9, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"HANDSHAKE");
    }

    #[tokio::test]
    async fn test_discard_pending_drops_buffered_input() {
        let (mut transport, mut peer) = duplex_transport(TransportKind::Bluetooth);
        peer.write_all(b"HANDSHAKE_OK").await.unwrap();
        peer.write_all(b"OK:PONG").await.unwrap();

        assert_eq!(transport.discard_pending().await, 19);
        assert_eq!(transport.discard_pending().await, 0);
        assert!(transport.is_alive());

        peer.write_all(b"OK:OLED_CLEARED").await.unwrap();
        let bytes = transport
            .receive(1024, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"OK:OLED_CLEARED");
    }

    #[tokio::test]
    async fn test_eof_marks_dead() {
        let (mut transport, peer) = duplex_transport(TransportKind::Bluetooth);
        drop(peer);

        let result = transport.receive(1024, Duration::from_millis(200)).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        assert!(!transport.is_alive());
    }

    #[tokio::test]
    async fn test_failed_write_marks_dead() {
        let mut transport = Transport::new(TransportKind::Bluetooth, FlakyStream::new(0));
        assert!(transport.is_alive());

        assert!(transport.send(b"PING").await.is_err());
        assert!(!transport.is_alive());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut transport, _peer) = duplex_transport(TransportKind::WiFi);
        transport.close().await;
        transport.close().await;

        assert!(!transport.is_alive());
        let err = transport.send(b"PING").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TransportKind::Bluetooth.to_string(), "Bluetooth");
        assert_eq!(TransportKind::WiFi.other(), TransportKind::Bluetooth);
    }
}
