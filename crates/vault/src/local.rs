//! Directory-backed vault service.
//!
//! Layout under the root directory:
//!
//! ```text
//! <vault>/vault.json                 vault summary
//! <vault>/archives/<id>.bin          archive payload
//! <vault>/archives/<id>.json         inventory entry
//! <vault>/uploads/<id>/upload.json   multipart upload record
//! <vault>/uploads/<id>/data.bin      parts written at their offsets
//! <vault>/jobs/<id>.json             job record
//! <vault>/jobs/<id>.out              job output
//! ```
//!
//! Jobs complete as soon as they are initiated.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::Utc;
use coldstash_protocol::{
    ArchiveMeta, ByteRange, CompletedArchive, InventoryArchive, InventoryReport, JobAction, JobOutput,
    JobParameters, JobRecord, JobStatusCode, MultipartUpload, VaultSummary,
};
use coldstash_transfer::{ArchiveChecksums, ChecksumAccumulator, ChunkReader};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiFuture, VaultApi};
use crate::config::ColdstashConfig;
use crate::error::VaultError;

const VAULT_FILE: &str = "vault.json";
const UPLOAD_FILE: &str = "upload.json";
const UPLOAD_DATA: &str = "data.bin";

/// A vault service stored in a local directory.
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
    account_id: String,
    region: String,
}

impl LocalVault {
    pub fn new(
        root: impl Into<PathBuf>,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    pub fn from_config(config: &ColdstashConfig) -> Self {
        Self::new(&config.local_root, &config.account_id, &config.region)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a vault; creating an existing vault returns it unchanged.
    pub async fn create_vault(&self, vault_name: &str) -> Result<VaultSummary, VaultError> {
        check_name("vault", vault_name)?;
        let dir = self.root.join(vault_name);
        let marker = dir.join(VAULT_FILE);
        if tokio::fs::try_exists(&marker).await? {
            return read_json(&marker).await;
        }

        for sub in ["archives", "uploads", "jobs"] {
            tokio::fs::create_dir_all(dir.join(sub)).await?;
        }
        let summary = VaultSummary {
            arn: Some(self.vault_arn(vault_name)),
            name: vault_name.to_string(),
            archive_count: 0,
            size_bytes: 0,
            creation_date: Some(Utc::now()),
            last_inventory_date: None,
        };
        write_json(&marker, &summary).await?;
        info!(vault = %vault_name, root = %self.root.display(), "vault created");
        Ok(summary)
    }

    fn vault_arn(&self, vault_name: &str) -> String {
        format!(
            "arn:coldstash:{}:{}:vaults/{vault_name}",
            self.region, self.account_id
        )
    }

    async fn vault_dir(&self, vault_name: &str) -> Result<PathBuf, VaultError> {
        check_name("vault", vault_name)?;
        let dir = self.root.join(vault_name);
        if !tokio::fs::try_exists(dir.join(VAULT_FILE)).await? {
            return Err(VaultError::NotFound(format!("vault {vault_name}")));
        }
        Ok(dir)
    }

    async fn upload_dir(&self, vault_name: &str, upload_id: &str) -> Result<PathBuf, VaultError> {
        check_name("upload", upload_id)?;
        let dir = self.vault_dir(vault_name).await?.join("uploads").join(upload_id);
        if !tokio::fs::try_exists(dir.join(UPLOAD_FILE)).await? {
            return Err(VaultError::NotFound(format!("multipart upload {upload_id}")));
        }
        Ok(dir)
    }

    async fn archives(&self, vault_dir: &Path) -> Result<Vec<InventoryArchive>, VaultError> {
        let mut archives: Vec<InventoryArchive> =
            read_json_dir(&vault_dir.join("archives")).await?;
        archives.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
        Ok(archives)
    }

    async fn summary(&self, vault_dir: &Path) -> Result<VaultSummary, VaultError> {
        let mut summary: VaultSummary = read_json(&vault_dir.join(VAULT_FILE)).await?;
        let archives = self.archives(vault_dir).await?;
        summary.archive_count = archives.len() as u64;
        summary.size_bytes = archives.iter().map(|a| a.size).sum();
        Ok(summary)
    }

    /// Writes the output of a new job and returns its size and, for archive
    /// retrievals, the archive's filename.
    async fn produce_output(
        &self,
        vault_name: &str,
        vault_dir: &Path,
        params: &JobParameters,
        output_path: &Path,
    ) -> Result<(u64, Option<String>), VaultError> {
        match params.action {
            JobAction::InventoryRetrieval => {
                let report = InventoryReport {
                    vault_arn: self.vault_arn(vault_name),
                    inventory_date: Utc::now(),
                    archive_list: self.archives(vault_dir).await?,
                };
                let json = serde_json::to_vec_pretty(&report)?;
                tokio::fs::write(output_path, &json).await?;

                let marker = vault_dir.join(VAULT_FILE);
                let mut summary: VaultSummary = read_json(&marker).await?;
                summary.last_inventory_date = Some(report.inventory_date);
                write_json(&marker, &summary).await?;
                Ok((json.len() as u64, None))
            }
            JobAction::ArchiveRetrieval => {
                let archive_id = params.archive_id.as_deref().ok_or_else(|| {
                    VaultError::NotFound("archive retrieval without archive id".into())
                })?;
                check_name("archive", archive_id)?;
                let archives = vault_dir.join("archives");
                let entry: InventoryArchive =
                    read_json(&archives.join(format!("{archive_id}.json"))).await?;
                let size = tokio::fs::copy(archives.join(format!("{archive_id}.bin")), output_path)
                    .await?;
                let filename = ArchiveMeta::from_description(entry.archive_description.as_deref())
                    .map(|meta| meta.filename);
                Ok((size, filename))
            }
        }
    }

    async fn verify_upload(
        data_path: &Path,
        part_size: u64,
        checksums: &ArchiveChecksums,
        archive_size: u64,
    ) -> Result<(), VaultError> {
        let mut reader = ChunkReader::open(data_path, part_size).await?;
        if reader.total_size() != archive_size {
            return Err(VaultError::Protocol(format!(
                "archive size {archive_size} does not match {} bytes received",
                reader.total_size()
            )));
        }
        let mut acc = ChecksumAccumulator::new();
        while let Some(chunk) = reader.next_chunk().await? {
            acc.push_hashed(&chunk.data, chunk.digest);
        }
        let actual = acc.finish();
        if actual.tree_hash != checksums.tree_hash {
            return Err(VaultError::Protocol(format!(
                "tree hash mismatch: expected {}, computed {}",
                checksums.tree_hash, actual.tree_hash
            )));
        }
        Ok(())
    }
}

impl VaultApi for LocalVault {
    fn list_vaults(&self) -> ApiFuture<'_, Vec<VaultSummary>> {
        Box::pin(async move {
            let mut vaults = Vec::new();
            if !tokio::fs::try_exists(&self.root).await? {
                return Ok(vaults);
            }
            let mut entries = tokio::fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let dir = entry.path();
                if !entry.file_type().await?.is_dir()
                    || !tokio::fs::try_exists(dir.join(VAULT_FILE)).await?
                {
                    continue;
                }
                vaults.push(self.summary(&dir).await?);
            }
            vaults.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(vaults)
        })
    }

    fn list_jobs<'a>(&'a self, vault_name: &'a str) -> ApiFuture<'a, Vec<JobRecord>> {
        Box::pin(async move {
            let dir = self.vault_dir(vault_name).await?;
            read_json_dir(&dir.join("jobs")).await
        })
    }

    fn initiate_job<'a>(
        &'a self,
        vault_name: &'a str,
        params: &'a JobParameters,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let dir = self.vault_dir(vault_name).await?;
            let job_id = Uuid::new_v4().simple().to_string();
            let jobs = dir.join("jobs");
            let created = Utc::now();

            let (size, filename) = self
                .produce_output(vault_name, &dir, params, &jobs.join(format!("{job_id}.out")))
                .await?;

            let record = JobRecord {
                job_id: job_id.clone(),
                action: params.action,
                vault_name: vault_name.to_string(),
                vault_arn: Some(self.vault_arn(vault_name)),
                archive_id: params.archive_id.clone(),
                description: params.description.clone().or(filename),
                completed: true,
                status_code: Some(JobStatusCode::Succeeded),
                archive_size: Some(size),
                creation_date: Some(created),
                completion_date: Some(Utc::now()),
            };
            write_json(&jobs.join(format!("{job_id}.json")), &record).await?;
            debug!(vault = %vault_name, job_id = %job_id, action = %params.action, size, "local job completed");
            Ok(job_id)
        })
    }

    fn get_job_output<'a>(
        &'a self,
        vault_name: &'a str,
        job_id: &'a str,
        range: Option<ByteRange>,
    ) -> ApiFuture<'a, JobOutput> {
        Box::pin(async move {
            check_name("job", job_id)?;
            let path = self
                .vault_dir(vault_name)
                .await?
                .join("jobs")
                .join(format!("{job_id}.out"));
            if !tokio::fs::try_exists(&path).await? {
                return Err(VaultError::NotFound(format!("output of job {job_id}")));
            }

            let mut file = tokio::fs::File::open(&path).await?;
            let size = file.metadata().await?.len();
            let body = match range {
                Some(r) => {
                    if r.end > size {
                        return Err(VaultError::Protocol(format!(
                            "{r} is outside the {size}-byte output"
                        )));
                    }
                    file.seek(SeekFrom::Start(r.start)).await?;
                    let mut body = vec![0u8; r.len() as usize];
                    file.read_exact(&mut body).await?;
                    body
                }
                None => {
                    let mut body = Vec::with_capacity(size as usize);
                    file.read_to_end(&mut body).await?;
                    body
                }
            };
            Ok(JobOutput {
                body,
                accept_ranges: Some("bytes".into()),
                content_range: range,
            })
        })
    }

    fn list_multipart_uploads<'a>(
        &'a self,
        vault_name: &'a str,
    ) -> ApiFuture<'a, Vec<MultipartUpload>> {
        Box::pin(async move {
            let uploads = self.vault_dir(vault_name).await?.join("uploads");
            let mut found = Vec::new();
            let mut entries = tokio::fs::read_dir(&uploads).await?;
            while let Some(entry) = entries.next_entry().await? {
                let record = entry.path().join(UPLOAD_FILE);
                if entry.file_type().await?.is_dir() && tokio::fs::try_exists(&record).await? {
                    found.push(read_json::<MultipartUpload>(&record).await?);
                }
            }
            found.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
            Ok(found)
        })
    }

    fn initiate_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        part_size: u64,
        description: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            if part_size == 0 {
                return Err(VaultError::Protocol("part size must be greater than zero".into()));
            }
            let dir = self.vault_dir(vault_name).await?;
            let upload_id = Uuid::new_v4().simple().to_string();
            let upload_dir = dir.join("uploads").join(&upload_id);
            tokio::fs::create_dir_all(&upload_dir).await?;
            tokio::fs::File::create(upload_dir.join(UPLOAD_DATA)).await?;

            let record = MultipartUpload {
                multipart_upload_id: upload_id.clone(),
                archive_description: Some(description.to_string()),
                vault_arn: Some(self.vault_arn(vault_name)),
                part_size_in_bytes: part_size,
                creation_date: Some(Utc::now()),
            };
            write_json(&upload_dir.join(UPLOAD_FILE), &record).await?;
            debug!(vault = %vault_name, upload_id = %upload_id, part_size, "multipart upload initiated");
            Ok(upload_id)
        })
    }

    fn upload_part<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
        range: ByteRange,
        body: &'a [u8],
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let dir = self.upload_dir(vault_name, upload_id).await?;
            let record: MultipartUpload = read_json(&dir.join(UPLOAD_FILE)).await?;
            let part_size = record.part_size_in_bytes;

            if body.len() as u64 != range.len() {
                return Err(VaultError::Protocol(format!(
                    "{range} declares {} bytes but the body has {}",
                    range.len(),
                    body.len()
                )));
            }
            if part_size == 0
                || range.start % part_size != 0
                || range.len() > part_size
                || range.is_empty()
            {
                return Err(VaultError::Protocol(format!(
                    "{range} does not align with part size {part_size}"
                )));
            }

            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(dir.join(UPLOAD_DATA))
                .await?;
            file.seek(SeekFrom::Start(range.start)).await?;
            file.write_all(body).await?;
            file.flush().await?;
            Ok(())
        })
    }

    fn complete_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
        checksums: &'a ArchiveChecksums,
        archive_size: u64,
    ) -> ApiFuture<'a, CompletedArchive> {
        Box::pin(async move {
            let dir = self.upload_dir(vault_name, upload_id).await?;
            let record: MultipartUpload = read_json(&dir.join(UPLOAD_FILE)).await?;
            let data = dir.join(UPLOAD_DATA);

            // Parts may have been written past the declared size by a stale attempt.
            let file = tokio::fs::OpenOptions::new().write(true).open(&data).await?;
            if file.metadata().await?.len() > archive_size {
                file.set_len(archive_size).await?;
            }
            drop(file);

            Self::verify_upload(&data, record.part_size_in_bytes, checksums, archive_size).await?;

            let archive_id = Uuid::new_v4().simple().to_string();
            let archives = self.vault_dir(vault_name).await?.join("archives");
            tokio::fs::rename(&data, archives.join(format!("{archive_id}.bin"))).await?;
            let entry = InventoryArchive {
                archive_id: archive_id.clone(),
                archive_description: record.archive_description,
                creation_date: Utc::now(),
                size: archive_size,
                sha256_tree_hash: checksums.tree_hash.clone(),
            };
            write_json(&archives.join(format!("{archive_id}.json")), &entry).await?;
            tokio::fs::remove_dir_all(&dir).await?;

            info!(vault = %vault_name, upload_id = %upload_id, archive_id = %archive_id, size = archive_size, "archive stored");
            Ok(CompletedArchive {
                location: Some(format!(
                    "/{}/vaults/{vault_name}/archives/{archive_id}",
                    self.account_id
                )),
                archive_id,
                checksum: checksums.tree_hash.clone(),
            })
        })
    }

    fn abort_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let dir = self.upload_dir(vault_name, upload_id).await?;
            tokio::fs::remove_dir_all(&dir).await?;
            info!(vault = %vault_name, upload_id = %upload_id, "multipart upload aborted");
            Ok(())
        })
    }

    fn delete_archive<'a>(
        &'a self,
        vault_name: &'a str,
        archive_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            check_name("archive", archive_id)?;
            let archives = self.vault_dir(vault_name).await?.join("archives");
            let entry = archives.join(format!("{archive_id}.json"));
            if !tokio::fs::try_exists(&entry).await? {
                return Err(VaultError::NotFound(format!("archive {archive_id}")));
            }
            tokio::fs::remove_file(&entry).await?;
            if let Err(e) = tokio::fs::remove_file(archives.join(format!("{archive_id}.bin"))).await {
                warn!(archive_id = %archive_id, error = %e, "archive payload already missing");
            }
            info!(vault = %vault_name, archive_id = %archive_id, "archive deleted");
            Ok(())
        })
    }
}

/// Rejects names that would escape their directory.
fn check_name(kind: &str, name: &str) -> Result<(), VaultError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(VaultError::NotFound(format!("{kind} {name:?}")));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, VaultError> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), VaultError> {
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Reads every `*.json` file directly under `dir`.
async fn read_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, VaultError> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            found.push(read_json(&path).await?);
        }
    }
    Ok(found)
}
