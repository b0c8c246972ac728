use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::ResponseSink;
use crate::error::SinkError;

/// Sink over any async writer: a socket, a file, stdout
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for WriterSink<W> {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.writer.write_all(&chunk).await?;
        Ok(())
    }

    async fn write_eof(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}
