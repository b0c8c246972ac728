use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{EntryError, Result};

/// Kind of a filesystem entry, as seen without following symlinks.
#[derive(Debug)]
pub enum EntryKind {
    File,
    Directory,
    /// `None` when the link dangles.
    Symlink(Option<LinkTarget>),
    /// Devices, sockets, FIFOs.
    Other,
}

/// Where a symlink ends up once every hop is resolved.
#[derive(Debug)]
pub struct LinkTarget {
    pub resolved: PathBuf,
    pub metadata: Metadata,
}

/// One entry found below the walk root.
#[derive(Debug)]
pub struct WalkEntry {
    pub path: PathBuf,
    /// Path relative to the walk root; never empty.
    pub relative_path: PathBuf,
    pub kind: EntryKind,
    /// `lstat` metadata of the entry itself.
    pub metadata: Metadata,
}

enum WalkState {
    Unopened(PathBuf),
    Walking { root: PathBuf, iter: walkdir::IntoIter },
    Finished,
}

/// Recursive, depth-first enumeration of a directory tree.
///
/// Siblings are visited in file name order so the same tree always yields
/// the same sequence. Symlinks are reported but never descended into.
///
/// Each step runs on the blocking pool and touches at most one directory
/// listing plus the stat calls for one entry, so a slow consumer keeps the
/// walk from running ahead.
pub struct DirectoryWalker {
    state: WalkState,
    root: Option<PathBuf>,
}

impl DirectoryWalker {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            state: WalkState::Unopened(base.into()),
            root: None,
        }
    }

    /// Canonical walk root, known once the first step has run.
    ///
    /// `None` if the base path did not exist.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Advance to the next entry.
    ///
    /// The outer `Result` fails only when the blocking task itself fails;
    /// problems with individual entries come back as the inner `Err` and
    /// the walk can continue past them.
    pub async fn next_entry(
        &mut self,
    ) -> Result<Option<std::result::Result<WalkEntry, EntryError>>> {
        let state = std::mem::replace(&mut self.state, WalkState::Finished);
        let (state, item) = tokio::task::spawn_blocking(move || step(state)).await?;

        if let WalkState::Walking { root, .. } = &state {
            if self.root.is_none() {
                self.root = Some(root.clone());
            }
        }
        self.state = state;
        Ok(item)
    }
}

type Step = (WalkState, Option<std::result::Result<WalkEntry, EntryError>>);

fn step(state: WalkState) -> Step {
    let (root, mut iter) = match state {
        WalkState::Unopened(base) => match open(&base) {
            Some(opened) => opened,
            None => return (WalkState::Finished, None),
        },
        WalkState::Walking { root, iter } => (root, iter),
        WalkState::Finished => return (WalkState::Finished, None),
    };

    match iter.next() {
        None => (WalkState::Finished, None),
        Some(entry) => {
            let item = entry
                .map_err(EntryError::from)
                .and_then(|entry| inspect(&root, entry));
            (WalkState::Walking { root, iter }, Some(item))
        }
    }
}

fn open(base: &Path) -> Option<(PathBuf, walkdir::IntoIter)> {
    let root = match base.canonicalize() {
        Ok(root) => root,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(base = %base.display(), "base path does not exist");
            return None;
        }
        Err(err) => {
            tracing::warn!(base = %base.display(), error = %err, "cannot resolve base path");
            return None;
        }
    };

    let iter = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    Some((root, iter))
}

fn inspect(root: &Path, entry: walkdir::DirEntry) -> std::result::Result<WalkEntry, EntryError> {
    let metadata = entry.metadata()?;
    let path = entry.into_path();
    let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Symlink(resolve_link(&path)?)
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };

    Ok(WalkEntry {
        path,
        relative_path,
        kind,
        metadata,
    })
}

fn resolve_link(path: &Path) -> std::result::Result<Option<LinkTarget>, EntryError> {
    let resolved = match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(EntryError::io(path, err)),
    };
    let metadata = fs::metadata(&resolved).map_err(|err| EntryError::io(path, err))?;
    Ok(Some(LinkTarget { resolved, metadata }))
}
