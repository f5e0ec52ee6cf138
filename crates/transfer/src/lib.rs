//! Chunked transfer primitives: slicing, tree-hash checksums and the
//! background process controller.

mod chunked;
mod controller;
mod slicer;
mod tree_hash;
mod types;

pub use chunked::{Chunk, ChunkReader, ChunkWriter, calculate_file_checksums, checksum_bytes};
pub use controller::{ProcessController, StatusCallback, StatusPublisher};
pub use slicer::{ChunkDescriptor, Chunks, Slicer};
pub use tree_hash::{ArchiveChecksums, ChecksumAccumulator, Sha256Digest, sha256, tree_hash};
pub use types::{TransferState, TransferStatus};

/// Default chunk size: 1 MiB.
///
/// Tree-hash leaves are one chunk each, so the part size of an upload must
/// stay fixed between the initial attempt and any resume.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("{total_size} bytes in chunks of {chunk_size} exceeds the chunk limit")]
    TooManyChunks { total_size: u64, chunk_size: u64 },

    #[error("position {position} is out of range 0..={total_chunks}")]
    OutOfRange { position: u32, total_chunks: u32 },

    #[error("short chunk at position {position}: expected {expected} bytes, got {actual}")]
    ShortRead {
        position: u32,
        expected: u64,
        actual: u64,
    },

    #[error("chunk out of order: expected offset {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("transfer task failed: {0}")]
    Join(String),
}
