//! Transport trait abstraction for pluggable link backends

use crate::error::LinkError;
use crate::transport::link::{Transport, TransportKind};
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A transport stream that can read and write bytes
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn shutdown(&mut self) -> Result<()>;

    /// Socket-level connectedness. Says nothing about whether the peer answers.
    fn is_connected(&self) -> bool;
}

/// Factory for creating transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Attempt to connect, returning a live transport on success
    async fn connect(&self) -> Result<Transport, LinkError>;

    /// Which slot the produced transport occupies
    fn kind(&self) -> TransportKind;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}
