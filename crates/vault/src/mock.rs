//! In-memory [`VaultApi`] used by unit tests.

use std::sync::{Arc, Mutex};

use coldstash_protocol::{
    ByteRange, CompletedArchive, JobOutput, JobParameters, JobRecord, MultipartUpload,
    VaultSummary,
};
use coldstash_transfer::ArchiveChecksums;
use tokio::sync::Semaphore;

use crate::api::{ApiFuture, VaultApi};
use crate::error::VaultError;

#[derive(Default)]
pub struct MockState {
    pub vaults: Vec<VaultSummary>,
    pub jobs: Vec<JobRecord>,
    pub uploads: Vec<MultipartUpload>,
    /// Served by `get_job_output`.
    pub payload: Vec<u8>,
    pub accept_ranges: bool,
    pub parts: Vec<(ByteRange, Vec<u8>)>,
    pub output_requests: Vec<Option<ByteRange>>,
    pub initiated_jobs: Vec<JobParameters>,
    pub initiated_uploads: Vec<(u64, String)>,
    pub completed: Vec<(String, ArchiveChecksums, u64)>,
    pub deleted: Vec<String>,
    pub list_jobs_calls: usize,
    /// Operation name that fails on every call.
    pub fail_on: Option<&'static str>,
}

#[derive(Default)]
pub struct MockVault {
    pub state: Mutex<MockState>,
    /// When set, every `upload_part` and `get_job_output` call takes a permit first.
    pub gate: Option<Arc<Semaphore>>,
}

impl MockVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: &[u8]) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            state.payload = payload.to_vec();
            state.accept_ranges = true;
        }
        mock
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().fail_on = Some(operation);
    }

    pub fn part_count(&self) -> usize {
        self.state.lock().unwrap().parts.len()
    }

    fn check(&self, operation: &'static str) -> Result<(), VaultError> {
        if self.state.lock().unwrap().fail_on == Some(operation) {
            return Err(VaultError::Remote {
                operation,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

impl VaultApi for MockVault {
    fn list_vaults(&self) -> ApiFuture<'_, Vec<VaultSummary>> {
        Box::pin(async move {
            self.check("list_vaults")?;
            Ok(self.state.lock().unwrap().vaults.clone())
        })
    }

    fn list_jobs<'a>(&'a self, _vault_name: &'a str) -> ApiFuture<'a, Vec<JobRecord>> {
        Box::pin(async move {
            self.check("list_jobs")?;
            let mut state = self.state.lock().unwrap();
            state.list_jobs_calls += 1;
            Ok(state.jobs.clone())
        })
    }

    fn initiate_job<'a>(
        &'a self,
        _vault_name: &'a str,
        params: &'a JobParameters,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            self.check("initiate_job")?;
            let mut state = self.state.lock().unwrap();
            state.initiated_jobs.push(params.clone());
            Ok(format!("job-{}", state.initiated_jobs.len()))
        })
    }

    fn get_job_output<'a>(
        &'a self,
        _vault_name: &'a str,
        _job_id: &'a str,
        range: Option<ByteRange>,
    ) -> ApiFuture<'a, JobOutput> {
        Box::pin(async move {
            self.pass_gate().await;
            self.check("get_job_output")?;
            let mut state = self.state.lock().unwrap();
            state.output_requests.push(range);
            let body = match range {
                Some(r) => state.payload[r.start as usize..r.end as usize].to_vec(),
                None => state.payload.clone(),
            };
            Ok(JobOutput {
                body,
                accept_ranges: state.accept_ranges.then(|| "bytes".to_string()),
                content_range: range,
            })
        })
    }

    fn list_multipart_uploads<'a>(
        &'a self,
        _vault_name: &'a str,
    ) -> ApiFuture<'a, Vec<MultipartUpload>> {
        Box::pin(async move {
            self.check("list_multipart_uploads")?;
            Ok(self.state.lock().unwrap().uploads.clone())
        })
    }

    fn initiate_multipart_upload<'a>(
        &'a self,
        _vault_name: &'a str,
        part_size: u64,
        description: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            self.check("initiate_multipart_upload")?;
            let mut state = self.state.lock().unwrap();
            state
                .initiated_uploads
                .push((part_size, description.to_string()));
            Ok(format!("upload-{}", state.initiated_uploads.len()))
        })
    }

    fn upload_part<'a>(
        &'a self,
        _vault_name: &'a str,
        _upload_id: &'a str,
        range: ByteRange,
        body: &'a [u8],
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.pass_gate().await;
            self.check("upload_part")?;
            self.state.lock().unwrap().parts.push((range, body.to_vec()));
            Ok(())
        })
    }

    fn complete_multipart_upload<'a>(
        &'a self,
        _vault_name: &'a str,
        upload_id: &'a str,
        checksums: &'a ArchiveChecksums,
        archive_size: u64,
    ) -> ApiFuture<'a, CompletedArchive> {
        Box::pin(async move {
            self.check("complete_multipart_upload")?;
            self.state.lock().unwrap().completed.push((
                upload_id.to_string(),
                checksums.clone(),
                archive_size,
            ));
            Ok(CompletedArchive {
                archive_id: format!("archive-for-{upload_id}"),
                checksum: checksums.tree_hash.clone(),
                location: None,
            })
        })
    }

    fn abort_multipart_upload<'a>(
        &'a self,
        _vault_name: &'a str,
        upload_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.check("abort_multipart_upload")?;
            self.state
                .lock()
                .unwrap()
                .uploads
                .retain(|u| u.multipart_upload_id != upload_id);
            Ok(())
        })
    }

    fn delete_archive<'a>(
        &'a self,
        _vault_name: &'a str,
        archive_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.check("delete_archive")?;
            self.state
                .lock()
                .unwrap()
                .deleted
                .push(archive_id.to_string());
            Ok(())
        })
    }
}
