use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::slicer::{ChunkDescriptor, Slicer};
use crate::tree_hash::{ArchiveChecksums, ChecksumAccumulator, Sha256Digest, sha256};
use crate::TransferError;

/// A chunk of payload together with its window.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub descriptor: ChunkDescriptor,
    pub data: Vec<u8>,
    /// SHA-256 of `data`.
    pub digest: Sha256Digest,
}

impl Chunk {
    /// Hex-encoded SHA-256 of the chunk data.
    pub fn checksum(&self) -> String {
        hex::encode(self.digest)
    }
}

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes the linear and tree checksums of a file, chunking it by `chunk_size`.
pub async fn calculate_file_checksums(
    path: &Path,
    chunk_size: u64,
) -> Result<ArchiveChecksums, TransferError> {
    let mut reader = ChunkReader::open(path, chunk_size).await?;
    let mut acc = ChecksumAccumulator::new();
    while let Some(chunk) = reader.next_chunk().await? {
        acc.push_hashed(&chunk.data, chunk.digest);
    }
    Ok(acc.finish())
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a seekable source one chunk at a time, following a [`Slicer`].
///
/// Only the chunk being returned is held in memory.
pub struct ChunkReader<R> {
    source: R,
    slicer: Slicer,
}

impl ChunkReader<tokio::fs::File> {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        Self::new(file, size, chunk_size)
    }
}

impl<R> ChunkReader<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Wraps `source`, which must hold `total_size` bytes.
    pub fn new(source: R, total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        Ok(Self {
            source,
            slicer: Slicer::new(total_size, chunk_size)?,
        })
    }

    /// Moves to chunk `position` (for resume).
    pub fn seek(&mut self, position: u32) -> Result<(), TransferError> {
        self.slicer.seek(position)
    }

    /// Reads the next chunk. Returns `None` once every chunk has been read.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let Some(descriptor) = self.slicer.next_descriptor() else {
            return Ok(None);
        };

        self.source.seek(SeekFrom::Start(descriptor.start)).await?;
        let mut data = vec![0u8; descriptor.len() as usize];
        let mut filled = 0;
        while filled < data.len() {
            let n = self.source.read(&mut data[filled..]).await?;
            if n == 0 {
                return Err(TransferError::ShortRead {
                    position: descriptor.position,
                    expected: descriptor.len(),
                    actual: filled as u64,
                });
            }
            filled += n;
        }

        let digest = sha256(&data);
        Ok(Some(Chunk {
            descriptor,
            data,
            digest,
        }))
    }

    /// Chunk ordinal of the next read.
    pub fn position(&self) -> u32 {
        self.slicer.position()
    }

    pub fn total_chunks(&self) -> u32 {
        self.slicer.total_chunks()
    }

    pub fn total_size(&self) -> u64 {
        self.slicer.total_size()
    }

    /// Bytes left from the current position to the end.
    pub fn remaining(&self) -> u64 {
        self.slicer
            .descriptor(self.slicer.position())
            .map_or(0, |d| self.slicer.total_size() - d.start)
    }
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Appends chunks to a sink, refusing gaps and reordering.
pub struct ChunkWriter<W> {
    sink: W,
    next_offset: u64,
    written: u64,
}

impl<W> ChunkWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a writer whose first chunk must start at `start_offset`.
    pub fn new(sink: W, start_offset: u64) -> Self {
        Self {
            sink,
            next_offset: start_offset,
            written: 0,
        }
    }

    /// Writes `data` as the chunk described by `descriptor`.
    pub async fn write_chunk(
        &mut self,
        descriptor: &ChunkDescriptor,
        data: &[u8],
    ) -> Result<(), TransferError> {
        if descriptor.start != self.next_offset {
            return Err(TransferError::OutOfOrder {
                expected: self.next_offset,
                actual: descriptor.start,
            });
        }
        if data.len() as u64 != descriptor.len() {
            return Err(TransferError::ShortRead {
                position: descriptor.position,
                expected: descriptor.len(),
                actual: data.len() as u64,
            });
        }
        self.sink.write_all(data).await?;
        self.next_offset = descriptor.end;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Writes an unpartitioned payload in one step.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.sink.write_all(data).await?;
        self.next_offset += data.len() as u64;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flushes the sink and returns it.
    pub async fn finish(mut self) -> Result<W, TransferError> {
        self.sink.flush().await?;
        Ok(self.sink)
    }

    /// Bytes written through this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Offset the next chunk must start at.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }
}
