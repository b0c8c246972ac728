use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use hyper::ext::ReasonPhrase;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use super::{ResponseSink, stream_archive};
use crate::error::SinkError;
use crate::fs::{DEFAULT_CHUNK_SIZE, DirectoryMembers};
use crate::zip::ArchiveAssembler;

/// Sink feeding a bounded channel whose receiving end is a response body.
///
/// With a capacity of one, each `write` completes only once the previous
/// chunk has been taken by the transport. A dropped receiver (the client
/// went away) turns into [`SinkError::Disconnected`] on the next write.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink and the body that streams what is written to it.
    pub fn body() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(1);
        (Self::new(tx), Body::from_stream(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Disconnected)?;
        tx.send(Ok(chunk))
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn write_eof(&mut self) -> Result<(), SinkError> {
        // Dropping the sender ends the body stream.
        self.tx.take();
        Ok(())
    }

    async fn abort(&mut self) {
        // An error item makes hyper drop the connection instead of
        // sending the terminating chunk.
        if let Some(tx) = self.tx.take() {
            let err = io::Error::other("archive generation aborted");
            if tx.send(Err(err)).await.is_err() {
                tracing::debug!("response body already dropped");
            }
        }
    }
}

/// A response whose body is a ZIP archive of a directory, generated while
/// it is being sent.
///
/// ```no_run
/// use axum::{Router, routing::get};
/// use zipresponse::ZipResponse;
///
/// let app: Router = Router::new().route(
///     "/zip",
///     get(|| async { ZipResponse::new("path/to/directory") }),
/// );
/// ```
///
/// The body has no `Content-Length`; the transport frames it with chunked
/// encoding. A missing or empty directory produces a valid empty archive.
/// If a file cannot be read half way through, the connection is dropped and
/// the client is left with a truncated archive.
#[derive(Debug, Clone)]
pub struct ZipResponse {
    base_path: PathBuf,
    chunk_size: NonZeroUsize,
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
}

impl ZipResponse {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
        }
    }

    /// Upper bound on the size of content chunks read from disk.
    pub fn chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Custom reason phrase for the status line (HTTP/1 only).
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Add headers; values replace any set earlier under the same name.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

impl IntoResponse for ZipResponse {
    fn into_response(self) -> Response {
        let (mut sink, body) = ChannelSink::body();

        let span = tracing::info_span!("zip_response", base = %self.base_path.display());
        let members = DirectoryMembers::new(self.base_path);
        let assembler = ArchiveAssembler::new(members, self.chunk_size);
        tokio::spawn(
            async move {
                if let Err(err) = stream_archive(assembler, &mut sink).await {
                    tracing::warn!(error = %err, "archive generation aborted");
                }
            }
            .instrument(span),
        );

        let mut response = Response::new(body);
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/zip"));
        headers.extend(self.headers);

        if let Some(reason) = self.reason {
            match ReasonPhrase::try_from(reason.into_bytes()) {
                Ok(reason) => {
                    response.extensions_mut().insert(reason);
                }
                Err(err) => tracing::warn!(error = ?err, "ignoring invalid reason phrase"),
            }
        }

        response
    }
}
