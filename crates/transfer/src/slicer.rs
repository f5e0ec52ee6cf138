use coldstash_protocol::ByteRange;
use tracing::trace;

use crate::TransferError;

/// Byte window of one chunk: `[start, end)` plus its zero-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkDescriptor {
    pub start: u64,
    pub end: u64,
    pub position: u32,
}

impl ChunkDescriptor {
    /// Size of the chunk in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The chunk as a wire byte range.
    pub fn byte_range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Partitions `total_size` bytes into `chunk_size` windows.
///
/// The slicer keeps a cursor: [`chunks`](Self::chunks) yields from the cursor
/// to the end and leaves it there, so a second call yields nothing until
/// [`seek`](Self::seek) moves it back.
#[derive(Debug, Clone)]
pub struct Slicer {
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
    position: u32,
}

impl Slicer {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        let total_chunks = u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| {
            TransferError::TooManyChunks {
                total_size,
                chunk_size,
            }
        })?;
        Ok(Self {
            total_size,
            chunk_size,
            total_chunks,
            position: 0,
        })
    }

    /// Moves the cursor to `position`. `total_chunks` itself is a valid
    /// target and leaves nothing to iterate.
    pub fn seek(&mut self, position: u32) -> Result<(), TransferError> {
        if position > self.total_chunks {
            return Err(TransferError::OutOfRange {
                position,
                total_chunks: self.total_chunks,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Iterates descriptors from the cursor onwards.
    pub fn chunks(&mut self) -> Chunks<'_> {
        Chunks { slicer: self }
    }

    /// Returns the descriptor at the cursor and advances it.
    pub fn next_descriptor(&mut self) -> Option<ChunkDescriptor> {
        let descriptor = self.descriptor(self.position)?;
        trace!(
            start = descriptor.start,
            end = descriptor.end,
            position = descriptor.position,
            "next chunk"
        );
        self.position += 1;
        Some(descriptor)
    }

    /// Returns the descriptor for `position` without moving the cursor.
    pub fn descriptor(&self, position: u32) -> Option<ChunkDescriptor> {
        if position >= self.total_chunks {
            return None;
        }
        let start = u64::from(position) * self.chunk_size;
        let end = if position + 1 == self.total_chunks {
            self.total_size
        } else {
            start + self.chunk_size
        };
        Some(ChunkDescriptor {
            start,
            end,
            position,
        })
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}

/// Iterator returned by [`Slicer::chunks`].
pub struct Chunks<'a> {
    slicer: &'a mut Slicer,
}

impl Iterator for Chunks<'_> {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.slicer.next_descriptor()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.slicer.total_chunks - self.slicer.position) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
