use crate::error::{Error, Result};
use crate::fs::MemberSource;
use crate::zip::ArchiveAssembler;

use super::ResponseSink;

/// Drive an assembler to completion, writing each chunk to `sink` as soon
/// as it is produced.
///
/// Chunks are forwarded one at a time in order; the next chunk is not
/// produced until the sink has accepted the previous one, so a slow
/// consumer slows the filesystem walk down with it.
///
/// On success the sink receives its end-of-body signal and the number of
/// bytes written is returned. If the archive cannot be completed the sink
/// is aborted instead and the error is returned. If the sink itself fails
/// the pipeline simply stops; the consumer is gone.
#[tracing::instrument(name = "zip.stream", skip_all, fields(bytes, members))]
pub async fn stream_archive<S, K>(mut assembler: ArchiveAssembler<S>, sink: &mut K) -> Result<u64>
where
    S: MemberSource,
    K: ResponseSink + ?Sized,
{
    loop {
        match assembler.next_chunk().await {
            Ok(Some(chunk)) => sink.write(chunk).await.map_err(Error::SinkWrite)?,
            Ok(None) => break,
            Err(err) => {
                let span = tracing::Span::current();
                span.record("bytes", assembler.bytes_emitted());
                span.record("members", assembler.members_written());
                sink.abort().await;
                return Err(err);
            }
        }
    }

    sink.write_eof().await.map_err(Error::SinkWrite)?;

    let bytes = assembler.bytes_emitted();
    let members = assembler.members_written();
    tracing::Span::current().record("bytes", bytes);
    tracing::info!(members, bytes, "archive sent");
    Ok(bytes)
}
