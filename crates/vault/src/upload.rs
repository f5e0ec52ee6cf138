//! Resumable multipart upload engine.
//!
//! Every chunk of the file is read and hashed, because the tree hash needs
//! all leaves, but only chunks at or after the resume position are sent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use coldstash_protocol::CompletedArchive;
use coldstash_transfer::{
    ChecksumAccumulator, ChunkReader, ProcessController, StatusCallback, StatusPublisher,
    TransferError, TransferStatus,
};
use tracing::{debug, error, info, warn};

use crate::api::VaultApi;
use crate::error::VaultError;

/// Controller of a running upload.
pub type UploadController = ProcessController<Result<CompletedArchive, VaultError>>;

/// Where an upload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub vault_name: String,
    pub upload_id: String,
    /// Part size the upload was initiated with.
    pub chunk_size: u64,
}

/// Uploads one file into an initiated multipart upload.
pub struct Uploader {
    api: Arc<dyn VaultApi>,
    path: PathBuf,
    target: UploadTarget,
    start_position: u32,
    listeners: Vec<StatusCallback>,
}

impl Uploader {
    pub fn new(api: Arc<dyn VaultApi>, path: impl Into<PathBuf>, target: UploadTarget) -> Self {
        Self {
            api,
            path: path.into(),
            target,
            start_position: 0,
            listeners: Vec::new(),
        }
    }

    /// Skips transmission of chunks before `position`.
    ///
    /// Checked against the file's chunk count when the upload starts.
    pub fn seek(&mut self, position: u32) {
        self.start_position = position;
    }

    /// Registers a listener that sees every status push of the upload.
    pub fn add_status_listener<F>(&mut self, listener: F)
    where
        F: Fn(TransferStatus) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file and starts the upload in the background.
    ///
    /// Fails without spawning anything if the file cannot be opened or the
    /// resume position lies past the last chunk.
    pub async fn upload(self) -> Result<UploadController, VaultError> {
        let reader = ChunkReader::open(&self.path, self.target.chunk_size).await?;
        let total_chunks = reader.total_chunks();
        if self.start_position > total_chunks {
            return Err(TransferError::OutOfRange {
                position: self.start_position,
                total_chunks,
            }
            .into());
        }

        info!(
            path = %self.path.display(),
            vault = %self.target.vault_name,
            upload_id = %self.target.upload_id,
            size = reader.total_size(),
            chunks = total_chunks,
            resume_from = self.start_position,
            "starting upload"
        );

        let initial = TransferStatus::new(self.start_position, total_chunks);
        let Self {
            api,
            target,
            start_position,
            listeners,
            ..
        } = self;

        Ok(ProcessController::spawn(
            initial,
            listeners,
            move |mut publisher| async move {
                let result =
                    run_upload(api.as_ref(), reader, &target, start_position, &mut publisher)
                        .await;
                match &result {
                    Ok(archive) => {
                        info!(upload_id = %target.upload_id, archive_id = %archive.archive_id, "upload completed");
                    }
                    Err(VaultError::Cancelled) => {
                        warn!(upload_id = %target.upload_id, "upload aborted");
                        publisher.abort();
                    }
                    Err(e) => {
                        error!(upload_id = %target.upload_id, error = %e, "upload failed");
                        publisher.fail(e.to_string());
                    }
                }
                result
            },
        ))
    }
}

async fn run_upload(
    api: &dyn VaultApi,
    mut reader: ChunkReader<tokio::fs::File>,
    target: &UploadTarget,
    start_position: u32,
    publisher: &mut StatusPublisher,
) -> Result<CompletedArchive, VaultError> {
    let mut checksums = ChecksumAccumulator::new();

    loop {
        if publisher.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        let Some(chunk) = reader.next_chunk().await? else {
            break;
        };
        checksums.push_hashed(&chunk.data, chunk.digest);

        let descriptor = chunk.descriptor;
        let sent = if descriptor.position >= start_position {
            api.upload_part(
                &target.vault_name,
                &target.upload_id,
                descriptor.byte_range(),
                &chunk.data,
            )
            .await
            .map_err(|e| VaultError::remote("upload_part", e))?;
            debug!(position = descriptor.position, range = %descriptor.byte_range(), "part sent");
            descriptor.len()
        } else {
            0
        };
        publisher.advance(descriptor.position + 1, sent);
    }

    let archive_size = checksums.byte_count();
    let checksums = checksums.finish();
    debug!(tree_hash = %checksums.tree_hash, size = archive_size, "completing upload");

    let archive = api
        .complete_multipart_upload(
            &target.vault_name,
            &target.upload_id,
            &checksums,
            archive_size,
        )
        .await
        .map_err(|e| VaultError::remote("complete_multipart_upload", e))?;

    publisher.complete();
    Ok(archive)
}
