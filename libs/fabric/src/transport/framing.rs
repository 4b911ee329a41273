use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::{FrameSink, FrameSource};

/// Largest frame accepted from the wire (100MB)
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Per-operation deadlines for framed I/O; `None` waits forever
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimeouts {
    pub send: Option<Duration>,
    pub receive: Option<Duration>,
}

fn closed_on_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

/// Write one length-prefixed frame
///
/// Frames carry a 4-byte big-endian length prefix.
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8], timeout: Option<Duration>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let send_op = async {
        let len = bytes.len() as u32;
        writer.write_u32(len).await?;
        writer.write_all(bytes).await?;
        writer.flush().await?;

        Ok::<(), Error>(())
    };

    if let Some(timeout) = timeout {
        tokio::time::timeout(timeout, send_op)
            .await
            .map_err(|_| Error::Timeout { op: "Send", timeout })?
    } else {
        send_op.await
    }
}

/// Read one length-prefixed frame
pub async fn read_frame<R>(reader: &mut R, timeout: Option<Duration>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let receive_op = async {
        let len = reader.read_u32().await.map_err(closed_on_eof)? as usize;

        if len > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(closed_on_eof)?;

        Ok::<Vec<u8>, Error>(buf)
    };

    if let Some(timeout) = timeout {
        tokio::time::timeout(timeout, receive_op)
            .await
            .map_err(|_| Error::Timeout {
                op: "Receive",
                timeout,
            })?
    } else {
        receive_op.await
    }
}

/// Write half of a split transport
pub struct FramedSink<W> {
    writer: W,
    timeout: Option<Duration>,
}

impl<W> FramedSink<W> {
    pub fn new(writer: W, timeout: Option<Duration>) -> Self {
        Self { writer, timeout }
    }
}

#[async_trait::async_trait]
impl<W> FrameSink for FramedSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        write_frame(&mut self.writer, bytes, self.timeout).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Read half of a split transport
pub struct FramedSource<R> {
    reader: R,
    timeout: Option<Duration>,
}

impl<R> FramedSource<R> {
    pub fn new(reader: R, timeout: Option<Duration>) -> Self {
        Self { reader, timeout }
    }
}

#[async_trait::async_trait]
impl<R> FrameSource for FramedSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.reader, self.timeout).await
    }
}
