//! ZIP archive generation.
//!
//! This module turns a sequence of archive members into the bytes of a
//! ZIP file, without knowing any member's size or checksum up front.
//!
//! ## Architecture
//!
//! - [`structures`]: Binary records of the format (headers, descriptors, EOCD)
//! - [`assembler`]: The state machine that sequences them around member content
//!
//! ## ZIP Format Overview
//!
//! A streamed ZIP file consists of:
//! 1. For each member: local file header, content, data descriptor
//! 2. Central Directory with metadata for all members
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The central directory can only be written once every member has been
//! read, which is why it is assembled from state accumulated along the way.
//!
//! ## Limitations
//!
//! - STORED (no compression) only
//! - No ZIP64: members and offsets must fit in 32 bits, at most 65535 members
//! - No encryption
//! - Timestamps have two-second resolution (MS-DOS format, local time)

mod assembler;
mod structures;

pub use assembler::{ArchiveAssembler, RunningMemberState};
pub use structures::*;
