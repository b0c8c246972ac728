//! # zipresponse
//!
//! Stream a directory tree as a ZIP archive in an HTTP response.
//!
//! The archive is produced while it is being sent: the directory is walked
//! lazily, files are read one bounded chunk at a time, and each chunk is
//! handed to the response body before the next one is read. Neither the
//! archive nor any single file is ever held in memory, and the response
//! needs no `Content-Length`.
//!
//! ## Features
//!
//! - Deterministic, depth-first traversal with sorted siblings
//! - Files, directories and file symlinks (stored as their target path)
//! - STORED members with streaming data descriptors (general purpose bit 3)
//! - Unix mode bits in the external attributes, UTF-8 names flagged
//! - Backpressure from the HTTP transport all the way down to the disk reads
//!
//! Directory symlinks are left out of the archive, and ZIP64 is not
//! supported.
//!
//! ## Example
//!
//! ```no_run
//! use axum::{Router, http::StatusCode, routing::get};
//! use zipresponse::ZipResponse;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Router::new().route(
//!         "/download",
//!         get(|| async { ZipResponse::new("path/to/directory").status(StatusCode::OK) }),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod fs;
pub mod http;
pub mod zip;

pub use cli::Cli;
pub use error::{EntryError, Error, Result, SinkError};
pub use fs::{ArchiveMember, DirectoryMembers, MemberSource};
pub use http::{ResponseSink, ZipResponse, stream_archive};
pub use crate::zip::ArchiveAssembler;
