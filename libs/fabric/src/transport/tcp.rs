use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};
use crate::transport::framing::{read_frame, write_frame, FrameTimeouts, FramedSink, FramedSource};
use crate::transport::{Connector, FrameSink, FrameSource, Transport, TransportListener};

/// Framed transport over a TCP stream
///
/// Nagle is disabled on dialed streams; call frames are small and latency
/// bound.
pub struct TcpTransport {
    stream: TcpStream,
    timeouts: FrameTimeouts,
}

impl TcpTransport {
    /// Dial `addr` with no deadlines
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::builder().address(addr).connect().await
    }

    pub fn builder() -> TcpTransportBuilder {
        TcpTransportBuilder::default()
    }

    /// Wrap an accepted stream
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            timeouts: FrameTimeouts::default(),
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, bytes, self.timeouts.send).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.stream, self.timeouts.receive).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn into_split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        let (reader, writer) = self.stream.into_split();
        (
            Box::new(FramedSink::new(writer, self.timeouts.send)),
            Box::new(FramedSource::new(reader, self.timeouts.receive)),
        )
    }
}

/// Accepts inbound TCP transports
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
        })
    }

    /// Accept the next connection along with the remote address
    pub async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, remote) = self.listener.accept().await?;
        Ok((TcpTransport::from_stream(stream), remote))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpTransportListener {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        let (transport, _) = TcpTransportListener::accept(self).await?;
        Ok(transport)
    }

    // The socket is released on drop
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Dial settings shared by the builder and the connector
#[derive(Debug, Clone, Copy, Default)]
struct DialSettings {
    connect_timeout: Option<Duration>,
    timeouts: FrameTimeouts,
}

impl DialSettings {
    async fn dial(&self, addr: SocketAddr) -> Result<TcpTransport> {
        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| Error::ConnectTimeout { addr, timeout })??,
            None => TcpStream::connect(addr).await?,
        };
        stream.set_nodelay(true)?;

        Ok(TcpTransport {
            stream,
            timeouts: self.timeouts,
        })
    }
}

/// Builder for a single dialed TCP transport
#[derive(Debug, Clone, Default)]
pub struct TcpTransportBuilder {
    address: Option<SocketAddr>,
    settings: DialSettings,
}

impl TcpTransportBuilder {
    pub fn address(mut self, addr: SocketAddr) -> Self {
        self.address = Some(addr);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = Some(timeout);
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeouts.send = Some(timeout);
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeouts.receive = Some(timeout);
        self
    }

    pub async fn connect(self) -> Result<TcpTransport> {
        let addr = self
            .address
            .ok_or_else(|| Error::Custom("Address not set".to_string()))?;
        self.settings.dial(addr).await
    }
}

/// Dials plain TCP for the connection layer
///
/// Dialed transports carry no per-frame deadlines unless configured; the
/// dispatch layer enforces its own call timeouts.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    settings: DialSettings,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self::new().connect_timeout(timeout)
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = Some(timeout);
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeouts.send = Some(timeout);
        self
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.settings.dial(addr).await?))
    }
}
