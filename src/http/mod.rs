mod binder;
mod response;
mod writer;

pub use binder::stream_archive;
pub use response::{ChannelSink, ZipResponse};
pub use writer::WriterSink;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;

/// Trait for the body of a response whose status and headers are already fixed
#[async_trait]
pub trait ResponseSink: Send {
    /// Write one chunk, waiting until the consumer accepts it
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Signal that the body is complete
    async fn write_eof(&mut self) -> Result<(), SinkError>;

    /// Tear the body down after a failure so the consumer can tell the
    /// archive is incomplete. Sinks without such a primitive just stop.
    async fn abort(&mut self) {}
}
