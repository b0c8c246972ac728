use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::member::MemberContent;
use crate::error::{Error, Result};

/// 256 KiB
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(256 * 1024) {
    Some(size) => size,
    None => unreachable!(),
};

enum ContentState {
    Pending(MemberContent),
    Inline(Bytes),
    Reading {
        file: File,
        path: PathBuf,
        expected: u64,
        read: u64,
    },
    Exhausted,
}

/// Lazy, finite, non-restartable chunk sequence for one member.
///
/// Files are opened on the first pull and closed once they are exhausted,
/// fail, or the stream is dropped. Only the chunk being returned is held
/// in memory.
pub struct ContentStream {
    state: ContentState,
    chunk_size: usize,
}

impl ContentStream {
    pub fn new(content: MemberContent, chunk_size: NonZeroUsize) -> Self {
        Self {
            state: ContentState::Pending(content),
            chunk_size: chunk_size.get(),
        }
    }

    /// Next chunk of at most `chunk_size` bytes, or `None` when exhausted.
    ///
    /// A file that ends before the size it had when it was classified is
    /// reported as a read error rather than silently truncated.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match std::mem::replace(&mut self.state, ContentState::Exhausted) {
                ContentState::Pending(MemberContent::Empty) | ContentState::Exhausted => {
                    return Ok(None);
                }
                ContentState::Pending(MemberContent::Inline(bytes)) => {
                    self.state = ContentState::Inline(bytes);
                }
                ContentState::Pending(MemberContent::File { path, len }) => {
                    let file = match File::open(&path).await {
                        Ok(file) => file,
                        Err(source) => return Err(Error::ContentRead { path, source }),
                    };
                    tracing::trace!(path = %path.display(), len, "opened member file");
                    self.state = ContentState::Reading {
                        file,
                        path,
                        expected: len,
                        read: 0,
                    };
                }
                ContentState::Inline(mut bytes) => {
                    if bytes.is_empty() {
                        return Ok(None);
                    }
                    let chunk = bytes.split_to(bytes.len().min(self.chunk_size));
                    self.state = ContentState::Inline(bytes);
                    return Ok(Some(chunk));
                }
                ContentState::Reading {
                    mut file,
                    path,
                    expected,
                    read,
                } => {
                    let mut buf = vec![0u8; self.chunk_size];
                    let filled = match fill(&mut file, &mut buf).await {
                        Ok(filled) => filled,
                        Err(source) => return Err(Error::ContentRead { path, source }),
                    };

                    if filled == 0 {
                        if read < expected {
                            let source = io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!("file shrank from {expected} to {read} bytes"),
                            );
                            return Err(Error::ContentRead { path, source });
                        }
                        return Ok(None);
                    }

                    buf.truncate(filled);
                    self.state = ContentState::Reading {
                        file,
                        path,
                        expected,
                        read: read + filled as u64,
                    };
                    return Ok(Some(Bytes::from(buf)));
                }
            }
        }
    }
}

/// Read until `buf` is full or the file ends.
async fn fill(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    async fn drain(stream: &mut ContentStream) -> Result<Vec<Bytes>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    #[tokio::test]
    async fn empty_content_has_no_chunks() {
        let mut stream = ContentStream::new(MemberContent::Empty, DEFAULT_CHUNK_SIZE);
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_chunks_respect_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        for chunk_size in [1, 7, 999, 1000, 1001, 64 * 1024] {
            let content = MemberContent::File {
                path: path.clone(),
                len: data.len() as u64,
            };
            let mut stream = ContentStream::new(content, size(chunk_size));
            let chunks = drain(&mut stream).await.unwrap();

            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= chunk_size));
            assert_eq!(chunks.len(), data.len().div_ceil(chunk_size));
            assert_eq!(chunks.concat(), data);
        }
    }

    #[tokio::test]
    async fn inline_content_is_split() {
        let content = MemberContent::Inline(Bytes::from_static(b"abcdefg"));
        let mut stream = ContentStream::new(content, size(3));
        let chunks = drain(&mut stream).await.unwrap();
        assert_eq!(chunks, ["abc", "def", "g"]);
    }

    #[tokio::test]
    async fn short_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrunk.txt");
        fs::write(&path, b"only four").unwrap();

        let content = MemberContent::File {
            path: path.clone(),
            len: 4096,
        };
        let mut stream = ContentStream::new(content, size(4));
        let err = drain(&mut stream).await.unwrap_err();
        match err {
            Error::ContentRead { path: failed, source } => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // terminal after failure
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let content = MemberContent::File {
            path: dir.path().join("deleted.txt"),
            len: 10,
        };
        let mut stream = ContentStream::new(content, DEFAULT_CHUNK_SIZE);
        assert!(matches!(
            stream.next_chunk().await,
            Err(Error::ContentRead { .. })
        ));
    }
}
