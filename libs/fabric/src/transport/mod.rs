use std::net::SocketAddr;

use crate::error::Result;

pub mod framing;
pub mod memory;
pub mod tcp;

pub use self::framing::{FrameTimeouts, FramedSink, FramedSource, MAX_FRAME_LEN};
pub use self::memory::MemoryTransport;
pub use self::tcp::{TcpConnector, TcpTransport, TcpTransportBuilder, TcpTransportListener};

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;

    /// Split into independently owned write and read halves
    fn into_split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>);
}

/// Write half of a transport
#[async_trait::async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Read half of a transport
#[async_trait::async_trait]
pub trait FrameSource: Send {
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Listener producing transports for accepted connections
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport;

    async fn accept(&self) -> Result<Self::Transport>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to remote addresses
///
/// The connection layer holds one of these to establish links lazily.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn Transport>>;
}
