//! Streaming ZIP writer.
//!
//! Every member is written as local header, raw content, data descriptor.
//! CRC and sizes are only known once the content has been read, so the
//! local header carries zeros with general purpose bit 3 set, and the real
//! values go into the descriptor and, later, the central directory.
//!
//! ```text
//! Idle ──member──▶ EmittingMember ──content exhausted──▶ Idle
//!   │                    │
//!   │ no more members    └──read error──▶ Failed
//!   ▼
//! EmittingCentralDirectory ──all entries + EOCD──▶ Done
//! ```

use std::num::NonZeroUsize;

use bytes::Bytes;
use futures::Stream;

use super::structures::*;
use crate::error::{Error, Result};
use crate::fs::{ArchiveMember, ContentStream, MemberSource};

/// Largest value a 32-bit size or offset field may hold; `0xFFFFFFFF`
/// itself tells readers to look for ZIP64 records.
const MAX_ZIP32: u64 = u32::MAX as u64 - 1;

/// Largest entry count; `0xFFFF` is the ZIP64 sentinel.
const MAX_ENTRIES: usize = u16::MAX as usize - 1;

/// Narrow a size or offset to its 32-bit field, refusing the sentinel.
fn zip32(value: u64, what: &'static str) -> Result<u32> {
    if value > MAX_ZIP32 {
        return Err(Error::Zip32Limit(what));
    }
    Ok(value as u32)
}

/// CRC and byte counts for the member currently being written.
pub struct RunningMemberState {
    hasher: crc32fast::Hasher,
    compressed_size: u64,
    uncompressed_size: u64,
    offset: u64,
}

impl RunningMemberState {
    /// `offset` is where the member's local header starts.
    pub fn new(offset: u64) -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
            compressed_size: 0,
            uncompressed_size: 0,
            offset,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn update(&mut self, chunk: &[u8]) -> Result<()> {
        self.hasher.update(chunk);
        // stored: compressed bytes are the raw bytes
        self.uncompressed_size += chunk.len() as u64;
        self.compressed_size += chunk.len() as u64;
        if self.uncompressed_size > MAX_ZIP32 {
            return Err(Error::Zip32Limit("member size"));
        }
        Ok(())
    }

    pub fn finish(self) -> Result<DataDescriptor> {
        Ok(DataDescriptor {
            compressed_size: zip32(self.compressed_size, "member size")?,
            uncompressed_size: zip32(self.uncompressed_size, "member size")?,
            crc32: self.hasher.finalize(),
        })
    }
}

struct PendingMember {
    file_name: String,
    flags: u16,
    modified: DosDateTime,
    external_attributes: u32,
    content: ContentStream,
    running: RunningMemberState,
}

impl PendingMember {
    fn finish(self) -> Result<(DataDescriptor, CentralDirectoryEntry)> {
        let lfh_offset = zip32(self.running.offset(), "archive offset")?;
        let descriptor = self.running.finish()?;
        let entry = CentralDirectoryEntry {
            file_name: self.file_name,
            flags: self.flags,
            compression_method: CompressionMethod::Stored,
            modified: self.modified,
            crc32: descriptor.crc32,
            compressed_size: descriptor.compressed_size,
            uncompressed_size: descriptor.uncompressed_size,
            external_attributes: self.external_attributes,
            lfh_offset,
        };
        Ok((descriptor, entry))
    }
}

enum State {
    Idle,
    EmittingMember(Box<PendingMember>),
    EmittingCentralDirectory { next: usize, start: u64 },
    Done,
    Failed,
}

/// Turns an ordered member sequence into the bytes of a ZIP archive,
/// one chunk per pull.
///
/// The assembler owns all per-archive state: the byte offset of
/// everything emitted so far and the central directory entries of
/// finished members. Any error is terminal; the bytes already produced
/// are then a truncated archive and nothing further is emitted.
pub struct ArchiveAssembler<S> {
    members: S,
    chunk_size: NonZeroUsize,
    state: State,
    offset: u64,
    entries: Vec<CentralDirectoryEntry>,
    written: usize,
}

impl<S: MemberSource> ArchiveAssembler<S> {
    pub fn new(members: S, chunk_size: NonZeroUsize) -> Self {
        Self {
            members,
            chunk_size,
            state: State::Idle,
            offset: 0,
            entries: Vec::new(),
            written: 0,
        }
    }

    /// Total bytes produced so far.
    pub fn bytes_emitted(&self) -> u64 {
        self.offset
    }

    /// Members whose data descriptor has been emitted.
    pub fn members_written(&self) -> usize {
        self.written
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Produce the next chunk of the archive, or `None` once the end of
    /// central directory record has been emitted (or after a failure).
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            // A `?` below leaves the placeholder in place, which is the
            // terminal failed state.
            match std::mem::replace(&mut self.state, State::Failed) {
                State::Idle => match self.members.next_member().await? {
                    Some(member) => {
                        let header = self.begin_member(member)?;
                        return Ok(Some(self.emit(header)));
                    }
                    None => {
                        self.state = State::EmittingCentralDirectory {
                            next: 0,
                            start: self.offset,
                        };
                    }
                },
                State::EmittingMember(mut pending) => match pending.content.next_chunk().await? {
                    Some(chunk) => {
                        pending.running.update(&chunk)?;
                        self.state = State::EmittingMember(pending);
                        return Ok(Some(self.emit(chunk)));
                    }
                    None => {
                        let (descriptor, entry) = pending.finish()?;
                        tracing::debug!(
                            name = %entry.file_name,
                            size = entry.uncompressed_size,
                            crc32 = entry.crc32,
                            "member written"
                        );
                        self.entries.push(entry);
                        self.written += 1;
                        self.state = State::Idle;
                        return Ok(Some(self.emit(descriptor.to_bytes())));
                    }
                },
                State::EmittingCentralDirectory { next, start } => {
                    if let Some(entry) = self.entries.get(next) {
                        let header = entry.to_bytes();
                        self.state = State::EmittingCentralDirectory {
                            next: next + 1,
                            start,
                        };
                        return Ok(Some(self.emit(header)));
                    }

                    let eocd = EndOfCentralDirectory {
                        total_entries: u16::try_from(self.entries.len())
                            .ok()
                            .filter(|&count| count as usize <= MAX_ENTRIES)
                            .ok_or(Error::Zip32Limit("member count"))?,
                        cd_size: zip32(self.offset - start, "central directory size")?,
                        cd_offset: zip32(start, "archive offset")?,
                    };
                    self.entries.clear();
                    self.state = State::Done;
                    return Ok(Some(self.emit(eocd.to_bytes())));
                }
                State::Done => {
                    self.state = State::Done;
                    return Ok(None);
                }
                State::Failed => return Ok(None),
            }
        }
    }

    /// Consume the assembler as a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send
    where
        S: 'static,
    {
        futures::stream::try_unfold(self, |mut assembler| async move {
            let chunk = assembler.next_chunk().await?;
            Ok(chunk.map(|chunk| (chunk, assembler)))
        })
    }

    fn begin_member(&mut self, member: ArchiveMember) -> Result<Bytes> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(Error::Zip32Limit("member count"));
        }
        if member.name.len() > u16::MAX as usize {
            return Err(Error::Zip32Limit("file name length"));
        }
        if self.offset > MAX_ZIP32 {
            return Err(Error::Zip32Limit("archive offset"));
        }

        let flags = general_purpose_flags(&member.name);
        let modified = DosDateTime::from_system_time(member.modified_at);
        let header = LocalFileHeader {
            flags,
            compression_method: CompressionMethod::Stored,
            modified,
            file_name: &member.name,
        }
        .to_bytes();

        tracing::debug!(name = %member.name, offset = self.offset, "writing member");
        let external_attributes = external_attributes(member.unix_mode, member.is_directory());
        self.state = State::EmittingMember(Box::new(PendingMember {
            file_name: member.name,
            flags,
            modified,
            external_attributes,
            content: ContentStream::new(member.content, self.chunk_size),
            running: RunningMemberState::new(self.offset),
        }));
        Ok(header)
    }

    fn emit(&mut self, chunk: Bytes) -> Bytes {
        self.offset += chunk.len() as u64;
        chunk
    }
}
