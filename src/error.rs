//! Error types for archive generation.
//!
//! Errors come in two weights. [`EntryError`] describes a single filesystem
//! entry that could not be inspected; traversal logs it and moves on to the
//! siblings. [`Error`] is fatal for the whole archive: once a member's bytes
//! or the response body have gone wrong there is no way to emit a valid
//! central directory, so generation stops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for archive generation.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal, stream-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a member's content failed part way through.
    #[error("failed to read {path}: {source}")]
    ContentRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The response sink stopped accepting bytes.
    #[error("failed to write archive to response: {0}")]
    SinkWrite(#[source] SinkError),

    /// The archive outgrew what a non-ZIP64 container can describe.
    #[error("{0} exceeds the ZIP32 format limit")]
    Zip32Limit(&'static str),

    /// The blocking traversal task panicked or was cancelled.
    #[error("directory traversal task failed: {0}")]
    Walker(#[from] tokio::task::JoinError),
}

/// A single entry that could not be stat'ed or resolved.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("failed to inspect {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// The relative path is not plain UTF-8 components.
    #[error("{path} cannot be used as an archive member name")]
    InvalidName { path: PathBuf },

    /// A file symlink resolves to a target outside the base directory.
    #[error("symlink {path} points outside the archived directory")]
    EscapingLink { path: PathBuf },
}

impl EntryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by a [`ResponseSink`](crate::http::ResponseSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer went away (client disconnected, body dropped).
    #[error("client disconnected")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] io::Error),
}
