//! High-level vault operations used by the command line.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use coldstash_protocol::{
    ArchiveMeta, Inventory, InventoryReport, JobRecord, MultipartUpload, RetrievalTier,
    VaultSummary,
};
use coldstash_transfer::{Slicer, TransferError};
use tokio::io::AsyncSeekExt;
use tracing::{debug, info, warn};

use crate::api::VaultApi;
use crate::config::ColdstashConfig;
use crate::download::{DownloadController, DownloadSource, Downloader};
use crate::error::VaultError;
use crate::jobs::{JobQuery, JobResolution, matching_jobs, resolve_job};
use crate::upload::{UploadController, UploadTarget, Uploader};

/// Entry point for vault operations on one account.
#[derive(Clone)]
pub struct VaultManager {
    api: Arc<dyn VaultApi>,
    chunk_size: u64,
    tier: RetrievalTier,
}

impl VaultManager {
    pub fn new(api: Arc<dyn VaultApi>, config: &ColdstashConfig) -> Self {
        Self {
            api,
            chunk_size: config.chunk_size,
            tier: config.retrieval_tier,
        }
    }

    pub fn api(&self) -> &Arc<dyn VaultApi> {
        &self.api
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub async fn list_vaults(&self) -> Result<Vec<VaultSummary>, VaultError> {
        self.api
            .list_vaults()
            .await
            .map_err(|e| VaultError::remote("list_vaults", e))
    }

    /// Lists every job of `vault_name`, newest completion first.
    pub async fn list_jobs(&self, vault_name: &str) -> Result<Vec<JobRecord>, VaultError> {
        let mut jobs = self
            .api
            .list_jobs(vault_name)
            .await
            .map_err(|e| VaultError::remote("list_jobs", e))?;
        jobs.sort_by(|a, b| b.completion_date.cmp(&a.completion_date));
        Ok(jobs)
    }

    pub async fn list_multipart_uploads(
        &self,
        vault_name: &str,
    ) -> Result<Vec<MultipartUpload>, VaultError> {
        self.api
            .list_multipart_uploads(vault_name)
            .await
            .map_err(|e| VaultError::remote("list_multipart_uploads", e))
    }

    /// Returns the in-progress upload for `filename`, initiating one if none exists.
    ///
    /// Uploads whose description carries no metadata never match.
    pub async fn find_or_initiate_upload(
        &self,
        vault_name: &str,
        filename: &str,
    ) -> Result<MultipartUpload, VaultError> {
        let uploads = self.list_multipart_uploads(vault_name).await?;
        if let Some(existing) = uploads
            .into_iter()
            .find(|u| ArchiveMeta::description_matches(u.archive_description.as_deref(), filename))
        {
            debug!(
                vault = %vault_name,
                filename = %filename,
                upload_id = %existing.multipart_upload_id,
                "found in-progress upload"
            );
            return Ok(existing);
        }

        let description = ArchiveMeta::new(filename).to_description();
        let upload_id = self
            .api
            .initiate_multipart_upload(vault_name, self.chunk_size, &description)
            .await
            .map_err(|e| VaultError::remote("initiate_multipart_upload", e))?;
        info!(vault = %vault_name, filename = %filename, upload_id = %upload_id, "multipart upload initiated");

        Ok(MultipartUpload {
            multipart_upload_id: upload_id,
            archive_description: Some(description),
            vault_arn: None,
            part_size_in_bytes: self.chunk_size,
            creation_date: None,
        })
    }

    /// Uploads `path` into `vault_name`, transmitting from chunk `resume_from` on.
    ///
    /// The upload reuses an in-progress multipart upload for the same filename,
    /// in which case the part size it was initiated with wins.
    pub async fn upload_file<F>(
        &self,
        path: &Path,
        vault_name: &str,
        resume_from: u32,
        on_status: Option<F>,
    ) -> Result<UploadController, VaultError>
    where
        F: Fn(coldstash_transfer::TransferStatus) + Send + Sync + 'static,
    {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::NotFound(format!("file name of {}", path.display())))?;

        let upload = self.find_or_initiate_upload(vault_name, filename).await?;
        let chunk_size = if upload.part_size_in_bytes > 0 {
            upload.part_size_in_bytes
        } else {
            self.chunk_size
        };
        if chunk_size != self.chunk_size {
            warn!(
                upload_id = %upload.multipart_upload_id,
                part_size = chunk_size,
                configured = self.chunk_size,
                "resuming with the upload's original part size"
            );
        }

        let mut uploader = Uploader::new(
            Arc::clone(&self.api),
            path,
            UploadTarget {
                vault_name: vault_name.to_string(),
                upload_id: upload.multipart_upload_id,
                chunk_size,
            },
        );
        uploader.seek(resume_from);
        if let Some(listener) = on_status {
            uploader.add_status_listener(listener);
        }
        uploader.upload().await
    }

    pub async fn get_or_initiate_inventory_job(
        &self,
        vault_name: &str,
        completed_only: bool,
        prefer_existing: bool,
    ) -> Result<JobResolution, VaultError> {
        let query = JobQuery::inventory(vault_name)
            .completed_only(completed_only)
            .prefer_existing(prefer_existing);
        resolve_job(self.api.as_ref(), &query).await
    }

    /// Lists archive retrieval jobs matching `archive_id` or `filename`, newest first.
    pub async fn get_retrieval_jobs(
        &self,
        vault_name: &str,
        archive_id: Option<&str>,
        filename: Option<&str>,
        completed_only: bool,
    ) -> Result<Vec<JobRecord>, VaultError> {
        let jobs = self
            .api
            .list_jobs(vault_name)
            .await
            .map_err(|e| VaultError::remote("list_jobs", e))?;
        let query = JobQuery::archive(
            vault_name,
            archive_id.map(str::to_string),
            filename.map(str::to_string),
        )
        .completed_only(completed_only);
        Ok(matching_jobs(&jobs, &query))
    }

    pub async fn get_or_initiate_retrieval_job(
        &self,
        vault_name: &str,
        archive_id: Option<&str>,
        filename: Option<&str>,
        completed_only: bool,
        prefer_existing: bool,
    ) -> Result<JobResolution, VaultError> {
        let query = JobQuery::archive(
            vault_name,
            archive_id.map(str::to_string),
            filename.map(str::to_string),
        )
        .completed_only(completed_only)
        .prefer_existing(prefer_existing)
        .tier(self.tier);
        resolve_job(self.api.as_ref(), &query).await
    }

    /// Downloads a job's output into `destination`.
    ///
    /// With `resume_from > 0` the file is truncated to the resume offset and
    /// appended to; otherwise it is created afresh. When `archive_size` is not
    /// given, the job record's size is used if the service reports one.
    ///
    /// An out-of-range `resume_from`, or any resume when the size is unknown,
    /// fails with `OutOfRange` and leaves the destination untouched.
    pub async fn download_archive<F>(
        &self,
        vault_name: &str,
        job_id: &str,
        destination: &Path,
        archive_size: Option<u64>,
        resume_from: u32,
        on_status: Option<F>,
    ) -> Result<DownloadController, VaultError>
    where
        F: Fn(coldstash_transfer::TransferStatus) + Send + Sync + 'static,
    {
        let archive_size = match archive_size {
            Some(size) => Some(size),
            None => self.job_archive_size(vault_name, job_id).await?,
        };

        // Validate the resume position before the destination is touched.
        let resume_offset = match archive_size {
            Some(size) => {
                Slicer::new(size, self.chunk_size)?.seek(resume_from)?;
                (u64::from(resume_from) * self.chunk_size).min(size)
            }
            // A single un-ranged request cannot be resumed.
            None if resume_from > 0 => {
                return Err(TransferError::OutOfRange {
                    position: resume_from,
                    total_chunks: 0,
                }
                .into());
            }
            None => 0,
        };
        let file = if resume_from == 0 {
            tokio::fs::File::create(destination).await?
        } else {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(destination)
                .await?;
            file.set_len(resume_offset).await?;
            file.seek(SeekFrom::Start(resume_offset)).await?;
            file
        };

        let mut downloader = Downloader::new(
            Arc::clone(&self.api),
            DownloadSource {
                vault_name: vault_name.to_string(),
                job_id: job_id.to_string(),
                archive_size,
                chunk_size: self.chunk_size,
            },
            file,
        );
        downloader.seek(resume_from);
        if let Some(listener) = on_status {
            downloader.add_status_listener(listener);
        }
        downloader.download()
    }

    async fn job_archive_size(
        &self,
        vault_name: &str,
        job_id: &str,
    ) -> Result<Option<u64>, VaultError> {
        let jobs = self
            .api
            .list_jobs(vault_name)
            .await
            .map_err(|e| VaultError::remote("list_jobs", e))?;
        Ok(jobs
            .into_iter()
            .find(|j| j.job_id == job_id)
            .and_then(|j| j.archive_size))
    }

    /// Returns the inventory from the newest completed inventory job.
    ///
    /// Returns `None` while no inventory is available yet; in that case an
    /// inventory job is running, possibly one started by this call.
    pub async fn get_inventory(&self, vault_name: &str) -> Result<Option<Inventory>, VaultError> {
        let job = match self
            .get_or_initiate_inventory_job(vault_name, true, true)
            .await?
        {
            JobResolution::Existing(jobs) => match jobs.into_iter().next() {
                Some(job) => job,
                None => return Ok(None),
            },
            JobResolution::Pending => return Ok(None),
            JobResolution::Initiated(job_id) => {
                info!(vault = %vault_name, job_id = %job_id, "inventory job started, try again later");
                return Ok(None);
            }
        };

        let output = self
            .api
            .get_job_output(vault_name, &job.job_id, None)
            .await
            .map_err(|e| VaultError::remote("get_job_output", e))?;
        let report: InventoryReport = serde_json::from_slice(&output.body)?;
        for archive in &report.archive_list {
            if ArchiveMeta::from_description(archive.archive_description.as_deref()).is_none() {
                warn!(archive_id = %archive.archive_id, "archive description carries no metadata");
            }
        }
        Ok(Some(Inventory::from(report)))
    }

    pub async fn delete_archive(&self, vault_name: &str, archive_id: &str) -> Result<(), VaultError> {
        self.api
            .delete_archive(vault_name, archive_id)
            .await
            .map_err(|e| VaultError::remote("delete_archive", e))?;
        info!(vault = %vault_name, archive_id = %archive_id, "archive deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstash_protocol::{JobAction, JobStatusCode};
    use tempfile::TempDir;

    use crate::mock::MockVault;

    fn manager(mock: &Arc<MockVault>, chunk_size: u64) -> VaultManager {
        let config = ColdstashConfig {
            chunk_size,
            ..ColdstashConfig::default()
        };
        VaultManager::new(mock.clone(), &config)
    }

    type NoListener = fn(coldstash_transfer::TransferStatus);

    fn upload_record(id: &str, description: &str, part_size: u64) -> MultipartUpload {
        MultipartUpload {
            multipart_upload_id: id.into(),
            archive_description: Some(description.into()),
            vault_arn: None,
            part_size_in_bytes: part_size,
            creation_date: None,
        }
    }

    #[tokio::test]
    async fn initiates_upload_with_metadata_description() {
        let mock = Arc::new(MockVault::new());
        let upload = manager(&mock, 8)
            .find_or_initiate_upload("photos", "album.tar")
            .await
            .unwrap();
        assert_eq!(upload.multipart_upload_id, "upload-1");

        let state = mock.state.lock().unwrap();
        let (part_size, description) = &state.initiated_uploads[0];
        assert_eq!(*part_size, 8);
        assert_eq!(
            ArchiveMeta::parse(description).unwrap(),
            ArchiveMeta::new("album.tar")
        );
    }

    #[tokio::test]
    async fn reuses_in_progress_upload_for_same_filename() {
        let mock = Arc::new(MockVault::new());
        mock.state.lock().unwrap().uploads = vec![
            upload_record("raw", "not metadata", 8),
            upload_record("other", &ArchiveMeta::new("other.tar").to_description(), 8),
            upload_record("mine", &ArchiveMeta::new("album.tar").to_description(), 8),
        ];
        let upload = manager(&mock, 8)
            .find_or_initiate_upload("photos", "album.tar")
            .await
            .unwrap();
        assert_eq!(upload.multipart_upload_id, "mine");
        assert!(mock.state.lock().unwrap().initiated_uploads.is_empty());
    }

    #[tokio::test]
    async fn resumed_upload_keeps_original_part_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("album.tar");
        std::fs::write(&path, vec![7u8; 25]).unwrap();

        let mock = Arc::new(MockVault::new());
        mock.state.lock().unwrap().uploads = vec![upload_record(
            "mine",
            &ArchiveMeta::new("album.tar").to_description(),
            10,
        )];

        let controller = manager(&mock, 1024)
            .upload_file(&path, "photos", 1, None::<NoListener>)
            .await
            .unwrap();
        controller.join().await.unwrap().unwrap();

        let state = mock.state.lock().unwrap();
        let starts: Vec<u64> = state.parts.iter().map(|(r, _)| r.start).collect();
        assert_eq!(starts, [10, 20]);
        assert_eq!(state.completed[0].0, "mine");
    }

    #[tokio::test]
    async fn download_uses_job_size_when_not_given() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.bin");
        let data: Vec<u8> = (0u8..25).collect();

        let mock = Arc::new(MockVault::with_payload(&data));
        mock.state.lock().unwrap().jobs = vec![JobRecord {
            job_id: "job-9".into(),
            action: JobAction::ArchiveRetrieval,
            vault_name: "photos".into(),
            vault_arn: None,
            archive_id: Some("a-1".into()),
            description: None,
            completed: true,
            status_code: Some(JobStatusCode::Succeeded),
            archive_size: Some(25),
            creation_date: None,
            completion_date: None,
        }];

        let controller = manager(&mock, 10)
            .download_archive("photos", "job-9", &dest, None, 0, None::<NoListener>)
            .await
            .unwrap();
        assert_eq!(controller.join().await.unwrap().unwrap(), 25);
        assert_eq!(std::fs::read(&dest).unwrap(), data);
        assert_eq!(mock.state.lock().unwrap().output_requests.len(), 3);
    }

    #[tokio::test]
    async fn resumed_download_truncates_partial_tail() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.bin");
        let data: Vec<u8> = (0u8..25).collect();
        // First chunk done, second half-written.
        std::fs::write(&dest, &data[..15]).unwrap();

        let mock = Arc::new(MockVault::with_payload(&data));
        let controller = manager(&mock, 10)
            .download_archive("photos", "job-9", &dest, Some(25), 1, None::<NoListener>)
            .await
            .unwrap();
        assert_eq!(controller.join().await.unwrap().unwrap(), 15);
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }

    #[tokio::test]
    async fn resume_without_size_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, vec![1u8; 25]).unwrap();

        let mock = Arc::new(MockVault::with_payload(&[0u8; 40]));
        let manager = manager(&mock, 10);
        for resume_from in [1, 2] {
            let result = manager
                .download_archive("photos", "job-9", &dest, None, resume_from, None::<NoListener>)
                .await;
            assert!(matches!(
                result,
                Err(VaultError::Transfer(TransferError::OutOfRange { .. }))
            ));
        }
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8; 25]);
        assert!(mock.state.lock().unwrap().output_requests.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_resume_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, vec![1u8; 25]).unwrap();

        let mock = Arc::new(MockVault::with_payload(&[0u8; 25]));
        let result = manager(&mock, 10)
            .download_archive("photos", "job-9", &dest, Some(25), 4, None::<NoListener>)
            .await;
        assert!(matches!(
            result,
            Err(VaultError::Transfer(TransferError::OutOfRange {
                position: 4,
                total_chunks: 3
            }))
        ));
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8; 25]);
    }

    #[tokio::test]
    async fn inventory_from_latest_completed_job() {
        let mock = Arc::new(MockVault::new());
        let report = serde_json::json!({
            "VaultARN": "arn:coldstash:local:-:vaults/photos",
            "InventoryDate": "2020-05-12T08:00:00Z",
            "ArchiveList": [{
                "ArchiveId": "a-1",
                "ArchiveDescription": ArchiveMeta::new("album.tar").to_description(),
                "CreationDate": "2020-05-01T10:00:00Z",
                "Size": 103,
                "SHA256TreeHash": "00"
            }]
        });
        {
            let mut state = mock.state.lock().unwrap();
            state.payload = serde_json::to_vec(&report).unwrap();
            state.jobs = vec![JobRecord {
                job_id: "inv".into(),
                action: JobAction::InventoryRetrieval,
                vault_name: "photos".into(),
                vault_arn: None,
                archive_id: None,
                description: None,
                completed: true,
                status_code: Some(JobStatusCode::Succeeded),
                archive_size: None,
                creation_date: None,
                completion_date: None,
            }];
        }

        let inventory = manager(&mock, 10)
            .get_inventory("photos")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.archive_list.len(), 1);
        assert_eq!(
            inventory.archive_list[0].filename.as_deref(),
            Some("album.tar")
        );
    }

    #[tokio::test]
    async fn inventory_not_ready_initiates_job() {
        let mock = Arc::new(MockVault::new());
        let inventory = manager(&mock, 10).get_inventory("photos").await.unwrap();
        assert!(inventory.is_none());
        assert_eq!(mock.state.lock().unwrap().initiated_jobs.len(), 1);
    }

    #[tokio::test]
    async fn retrieval_job_uses_configured_tier() {
        let mock = Arc::new(MockVault::new());
        let config = ColdstashConfig {
            retrieval_tier: RetrievalTier::Standard,
            ..ColdstashConfig::default()
        };
        let manager = VaultManager::new(mock.clone(), &config);
        let res = manager
            .get_or_initiate_retrieval_job("photos", Some("a-1"), Some("album.tar"), true, true)
            .await
            .unwrap();
        assert_eq!(res, JobResolution::Initiated("job-1".into()));

        let state = mock.state.lock().unwrap();
        assert_eq!(state.initiated_jobs[0].tier, Some(RetrievalTier::Standard));
        assert_eq!(state.initiated_jobs[0].description.as_deref(), Some("album.tar"));
    }

    #[tokio::test]
    async fn delete_wraps_remote_error() {
        let mock = Arc::new(MockVault::new());
        mock.fail_on("delete_archive");
        let err = manager(&mock, 10)
            .delete_archive("photos", "a-1")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Remote { operation: "delete_archive", .. }));
    }
}
