use std::net::SocketAddr;

use serde::{de::DeserializeOwned, Serialize};

use crate::codec::Codec;
use crate::error::Result;
use crate::transport::{FrameSink, FrameSource, TcpTransport, Transport};

/// High-level channel for bidirectional communication
///
/// Combines a transport and codec for persistent connections
pub struct Channel<C> {
    transport: Box<dyn Transport>,
    codec: C,
}

impl<C: Codec + Clone> Channel<C> {
    /// Create a channel from an existing transport
    pub fn from_transport(transport: impl Transport + 'static, codec: C) -> Self {
        Self::from_boxed(Box::new(transport), codec)
    }

    /// Create a channel from a transport handed out by a `Connector`
    pub fn from_boxed(transport: Box<dyn Transport>, codec: C) -> Self {
        Self { transport, codec }
    }

    /// Open a TCP channel
    pub async fn tcp(addr: SocketAddr, codec: C) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Send a message over the channel
    pub async fn send<T: Serialize + Sync>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.transport.send(&bytes).await
    }

    /// Receive a message from the channel
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.transport.receive().await?;
        self.codec.decode(&bytes)
    }

    /// Split into a sender and a receiver that can be driven concurrently
    pub fn into_split(self) -> (ChannelSender<C>, ChannelReceiver<C>) {
        let (sink, source) = self.transport.into_split();
        (
            ChannelSender {
                sink,
                codec: self.codec.clone(),
            },
            ChannelReceiver {
                source,
                codec: self.codec,
            },
        )
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

/// Sending half of a split `Channel`
pub struct ChannelSender<C> {
    sink: Box<dyn FrameSink>,
    codec: C,
}

impl<C: Codec> ChannelSender<C> {
    pub async fn send<T: Serialize + Sync>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.sink.send(&bytes).await
    }

    pub async fn close(mut self) -> Result<()> {
        self.sink.close().await
    }
}

/// Receiving half of a split `Channel`
pub struct ChannelReceiver<C> {
    source: Box<dyn FrameSource>,
    codec: C,
}

impl<C: Codec> ChannelReceiver<C> {
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.source.receive().await?;
        self.codec.decode(&bytes)
    }
}
