//! Resumable download of a completed retrieval job's output.

use std::sync::Arc;

use coldstash_transfer::{
    ChunkWriter, ProcessController, Slicer, StatusCallback, StatusPublisher, TransferError,
    TransferStatus,
};
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, warn};

use crate::api::VaultApi;
use crate::error::VaultError;

/// Controller of a running download. The task yields the bytes written.
pub type DownloadController = ProcessController<Result<u64, VaultError>>;

/// What to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSource {
    pub vault_name: String,
    pub job_id: String,
    /// Size of the job output. Without it the output is fetched in one request.
    pub archive_size: Option<u64>,
    pub chunk_size: u64,
}

/// Streams a job's output into a sink, one ranged request per chunk.
pub struct Downloader<W> {
    api: Arc<dyn VaultApi>,
    source: DownloadSource,
    sink: W,
    start_position: u32,
    listeners: Vec<StatusCallback>,
}

impl<W> Downloader<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// `sink` must already be positioned at the resume offset.
    pub fn new(api: Arc<dyn VaultApi>, source: DownloadSource, sink: W) -> Self {
        Self {
            api,
            source,
            sink,
            start_position: 0,
            listeners: Vec::new(),
        }
    }

    /// Starts fetching at chunk `position`.
    pub fn seek(&mut self, position: u32) {
        self.start_position = position;
    }

    pub fn add_status_listener<F>(&mut self, listener: F)
    where
        F: Fn(TransferStatus) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Starts the download in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn download(self) -> Result<DownloadController, VaultError> {
        let Self {
            api,
            source,
            sink,
            start_position,
            listeners,
        } = self;

        let plan = match source.archive_size {
            Some(size) => {
                let mut slicer = Slicer::new(size, source.chunk_size)?;
                slicer.seek(start_position)?;
                Plan::Ranged(slicer)
            }
            None if start_position > 1 => {
                return Err(TransferError::OutOfRange {
                    position: start_position,
                    total_chunks: 1,
                }
                .into());
            }
            None => Plan::Whole { skip: start_position == 1 },
        };
        let max_position = match &plan {
            Plan::Ranged(slicer) => slicer.total_chunks(),
            Plan::Whole { .. } => 1,
        };

        info!(
            vault = %source.vault_name,
            job_id = %source.job_id,
            size = ?source.archive_size,
            chunks = max_position,
            resume_from = start_position,
            "starting download"
        );

        Ok(ProcessController::spawn(
            TransferStatus::new(start_position, max_position),
            listeners,
            move |mut publisher| async move {
                let result = match plan {
                    Plan::Ranged(slicer) => {
                        run_ranged(api.as_ref(), &source, slicer, sink, &mut publisher).await
                    }
                    Plan::Whole { skip } => {
                        run_whole(api.as_ref(), &source, skip, sink, &mut publisher).await
                    }
                };
                match &result {
                    Ok(written) => {
                        info!(job_id = %source.job_id, bytes = written, "download completed");
                    }
                    Err(VaultError::Cancelled) => {
                        warn!(job_id = %source.job_id, "download aborted");
                        publisher.abort();
                    }
                    Err(e) => {
                        error!(job_id = %source.job_id, error = %e, "download failed");
                        publisher.fail(e.to_string());
                    }
                }
                result
            },
        ))
    }
}

enum Plan {
    Ranged(Slicer),
    /// Single un-ranged request; `skip` when the one chunk is already done.
    Whole { skip: bool },
}

async fn run_ranged<W>(
    api: &dyn VaultApi,
    source: &DownloadSource,
    mut slicer: Slicer,
    sink: W,
    publisher: &mut StatusPublisher,
) -> Result<u64, VaultError>
where
    W: AsyncWrite + Unpin,
{
    let start_offset = slicer
        .descriptor(slicer.position())
        .map_or(slicer.total_size(), |d| d.start);
    let mut writer = ChunkWriter::new(sink, start_offset);

    while let Some(descriptor) = slicer.next_descriptor() {
        if publisher.is_cancelled() {
            writer.finish().await?;
            return Err(VaultError::Cancelled);
        }
        let range = descriptor.byte_range();
        let output = api
            .get_job_output(&source.vault_name, &source.job_id, Some(range))
            .await
            .map_err(|e| VaultError::remote("get_job_output", e))?;
        writer.write_chunk(&descriptor, &output.body).await?;
        debug!(position = descriptor.position, range = %range, "chunk written");
        publisher.advance(descriptor.position + 1, descriptor.len());
    }

    let written = writer.written();
    writer.finish().await?;
    publisher.complete();
    Ok(written)
}

async fn run_whole<W>(
    api: &dyn VaultApi,
    source: &DownloadSource,
    skip: bool,
    sink: W,
    publisher: &mut StatusPublisher,
) -> Result<u64, VaultError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = ChunkWriter::new(sink, 0);
    if !skip {
        if publisher.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        let output = api
            .get_job_output(&source.vault_name, &source.job_id, None)
            .await
            .map_err(|e| VaultError::remote("get_job_output", e))?;
        if output.accept_ranges.is_none() {
            debug!(job_id = %source.job_id, "service did not signal range support");
        }
        writer.write_all(&output.body).await?;
        publisher.advance(1, output.body.len() as u64);
    }

    let written = writer.written();
    writer.finish().await?;
    publisher.complete();
    Ok(written)
}
