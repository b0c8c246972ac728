//! Filesystem side of the pipeline.
//!
//! - [`walker`]: deterministic traversal of the base directory
//! - [`member`]: classification of entries into archive members
//! - [`content`]: bounded, lazy reading of member content

mod content;
mod member;
mod walker;

pub use content::{ContentStream, DEFAULT_CHUNK_SIZE};
pub use member::{
    ArchiveMember, DirectoryMembers, MemberContent, MemberKind, MemberSource, classify,
};
pub use walker::{DirectoryWalker, EntryKind, LinkTarget, WalkEntry};
