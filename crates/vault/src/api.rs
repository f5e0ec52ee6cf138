//! Abstract vault service.
//!
//! The engines in this crate only talk to a vault through [`VaultApi`], so
//! the remote service, the local directory backend and test mocks are
//! interchangeable. The account is a property of the implementation, not a
//! per-call argument.

use std::future::Future;
use std::pin::Pin;

use coldstash_protocol::{
    ByteRange, CompletedArchive, JobOutput, JobParameters, JobRecord, MultipartUpload,
    VaultSummary,
};
use coldstash_transfer::ArchiveChecksums;

use crate::error::VaultError;

/// Boxed future returned by every [`VaultApi`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VaultError>> + Send + 'a>>;

/// Operations the transfer engines need from a vault service.
pub trait VaultApi: Send + Sync {
    fn list_vaults(&self) -> ApiFuture<'_, Vec<VaultSummary>>;

    /// Lists the jobs of `vault_name`, completed or not.
    fn list_jobs<'a>(&'a self, vault_name: &'a str) -> ApiFuture<'a, Vec<JobRecord>>;

    /// Starts a job and returns its id.
    fn initiate_job<'a>(
        &'a self,
        vault_name: &'a str,
        params: &'a JobParameters,
    ) -> ApiFuture<'a, String>;

    /// Fetches a completed job's output, optionally restricted to `range`.
    fn get_job_output<'a>(
        &'a self,
        vault_name: &'a str,
        job_id: &'a str,
        range: Option<ByteRange>,
    ) -> ApiFuture<'a, JobOutput>;

    fn list_multipart_uploads<'a>(
        &'a self,
        vault_name: &'a str,
    ) -> ApiFuture<'a, Vec<MultipartUpload>>;

    /// Starts a multipart upload and returns its id.
    fn initiate_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        part_size: u64,
        description: &'a str,
    ) -> ApiFuture<'a, String>;

    /// Sends one part. `body` must be exactly `range.len()` bytes.
    fn upload_part<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
        range: ByteRange,
        body: &'a [u8],
    ) -> ApiFuture<'a, ()>;

    /// Finalizes an upload; the service verifies the tree hash.
    fn complete_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
        checksums: &'a ArchiveChecksums,
        archive_size: u64,
    ) -> ApiFuture<'a, CompletedArchive>;

    fn abort_multipart_upload<'a>(
        &'a self,
        vault_name: &'a str,
        upload_id: &'a str,
    ) -> ApiFuture<'a, ()>;

    fn delete_archive<'a>(&'a self, vault_name: &'a str, archive_id: &'a str)
    -> ApiFuture<'a, ()>;
}
