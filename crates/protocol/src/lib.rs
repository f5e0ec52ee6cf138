//! Wire types for the cold-storage vault API.
//!
//! Field names follow the service's JSON (PascalCase) so that recorded
//! responses and inventory reports deserialize without translation.

pub mod archive_meta;
pub mod inventory;
pub mod types;

pub use archive_meta::{ArchiveMeta, META_VERSION};
pub use inventory::{ArchiveItem, Inventory, InventoryArchive, InventoryReport};
pub use types::{
    ByteRange, CompletedArchive, JobAction, JobOutput, JobParameters, JobRecord, JobStatusCode,
    MultipartUpload, RetrievalTier, VaultSummary,
};

/// Errors produced while decoding wire values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unsupported archive description: {0}")]
    UnsupportedMetadata(String),

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("invalid retrieval tier: {0}")]
    InvalidTier(String),
}
