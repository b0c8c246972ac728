//! Mapping of walked filesystem entries to archive members.
//!
//! | entry                         | member                                   |
//! |-------------------------------|------------------------------------------|
//! | regular file                  | file bytes, file mode                    |
//! | directory                     | `name/`, no content, directory mode      |
//! | symlink to a file             | target path (relative to base) as text, link mode |
//! | symlink to a directory        | none                                     |
//! | dangling link, device, socket | none                                     |
//!
//! A file symlink is stored as its target path rather than the target's
//! bytes. Together with the `S_IFLNK` bits in the mode this is what lets
//! `unzip` and friends recreate the link on extraction. Directory symlinks
//! cannot be round-tripped by common extractors and are left out.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use super::walker::{DirectoryWalker, EntryKind, WalkEntry};
use crate::error::{EntryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    File,
    Directory,
    Symlink,
}

/// Where a member's bytes come from.
#[derive(Debug, Clone)]
pub enum MemberContent {
    Empty,
    Inline(Bytes),
    /// Read lazily from disk; `len` is the size seen at stat time.
    File { path: PathBuf, len: u64 },
}

/// One entry to be written into the archive.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Forward-slash separated, relative; directories end with `/`.
    pub name: String,
    pub kind: MemberKind,
    pub modified_at: SystemTime,
    /// Permission and file type bits (`st_mode`).
    pub unix_mode: u32,
    pub content: MemberContent,
}

impl ArchiveMember {
    pub fn is_directory(&self) -> bool {
        self.kind == MemberKind::Directory
    }
}

/// An ordered, pull-based sequence of members.
#[async_trait]
pub trait MemberSource: Send {
    async fn next_member(&mut self) -> Result<Option<ArchiveMember>>;
}

#[async_trait]
impl MemberSource for VecDeque<ArchiveMember> {
    async fn next_member(&mut self) -> Result<Option<ArchiveMember>> {
        Ok(self.pop_front())
    }
}

/// Members for every includable entry below a base directory.
///
/// Entries that fail to stat or resolve are logged and skipped.
pub struct DirectoryMembers {
    walker: DirectoryWalker,
}

impl DirectoryMembers {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            walker: DirectoryWalker::new(base),
        }
    }
}

#[async_trait]
impl MemberSource for DirectoryMembers {
    async fn next_member(&mut self) -> Result<Option<ArchiveMember>> {
        while let Some(item) = self.walker.next_entry().await? {
            let Some(root) = self.walker.root() else {
                break;
            };
            match item.and_then(|entry| classify(root, entry)) {
                Ok(Some(member)) => return Ok(Some(member)),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "skipping entry"),
            }
        }
        Ok(None)
    }
}

/// Map one walked entry to at most one member.
///
/// `root` is the canonical base directory the entry was found under.
pub fn classify(
    root: &Path,
    entry: WalkEntry,
) -> std::result::Result<Option<ArchiveMember>, EntryError> {
    let name = slash_path(&entry.relative_path).ok_or_else(|| EntryError::InvalidName {
        path: entry.path.clone(),
    })?;
    let modified_at = entry
        .metadata
        .modified()
        .map_err(|err| EntryError::io(&entry.path, err))?;
    let unix_mode = unix_mode(&entry.metadata);

    let (name, kind, content) = match entry.kind {
        EntryKind::File => {
            let content = MemberContent::File {
                len: entry.metadata.len(),
                path: entry.path,
            };
            (name, MemberKind::File, content)
        }
        EntryKind::Directory => (format!("{name}/"), MemberKind::Directory, MemberContent::Empty),
        EntryKind::Symlink(Some(target)) if target.metadata.is_file() => {
            let text = target
                .resolved
                .strip_prefix(root)
                .ok()
                .and_then(slash_path)
                .ok_or_else(|| EntryError::EscapingLink {
                    path: entry.path.clone(),
                })?;
            let content = MemberContent::Inline(Bytes::from(text.into_bytes()));
            (name, MemberKind::Symlink, content)
        }
        EntryKind::Symlink(Some(_)) => {
            tracing::debug!(path = %entry.path.display(), "skipping directory symlink");
            return Ok(None);
        }
        EntryKind::Symlink(None) | EntryKind::Other => {
            tracing::debug!(path = %entry.path.display(), "skipping unsupported entry");
            return Ok(None);
        }
    };

    Ok(Some(ArchiveMember {
        name,
        kind,
        modified_at,
        unix_mode,
        content,
    }))
}

/// Join the normal components of a relative path with `/`.
///
/// Returns `None` for anything that is not plain UTF-8 names: parent
/// references, roots, prefixes, or non-UTF-8 components.
fn slash_path(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(unix)]
fn unix_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn unix_mode(metadata: &std::fs::Metadata) -> u32 {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        0o120777
    } else if file_type.is_dir() {
        0o040755
    } else if metadata.permissions().readonly() {
        0o100444
    } else {
        0o100644
    }
}
