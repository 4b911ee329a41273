use tokio::io::{AsyncWriteExt, DuplexStream};

use crate::error::Result;
use crate::transport::framing::{read_frame, write_frame, FramedSink, FramedSource};
use crate::transport::{FrameSink, FrameSource, Transport};

const DUPLEX_BUFFER: usize = 64 * 1024;

/// In-process transport over a tokio duplex stream
///
/// Uses the same length-prefix framing as the socket transports.
pub struct MemoryTransport {
    stream: DuplexStream,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(DUPLEX_BUFFER);
        (Self { stream: a }, Self { stream: b })
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, bytes, None).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.stream, None).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn into_split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        let (reader, writer) = tokio::io::split(self.stream);
        (
            Box::new(FramedSink::new(writer, None)),
            Box::new(FramedSource::new(reader, None)),
        )
    }
}
