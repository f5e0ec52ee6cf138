//! Finds a reusable retrieval job or starts a new one.
//!
//! Retrieval jobs take hours on the real service, so a completed job for the
//! same target is preferred over initiating another. [`decide`] is the pure
//! part of the policy; [`resolve_job`] runs it against a [`VaultApi`].

use std::cmp::Ordering;

use coldstash_protocol::{JobAction, JobParameters, JobRecord, RetrievalTier};
use tracing::{debug, info};

use crate::api::VaultApi;
use crate::error::VaultError;

/// Which jobs count as matches, and what to do when none does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub vault_name: String,
    pub action: JobAction,
    pub archive_id: Option<String>,
    pub filename: Option<String>,
    /// Only completed jobs are returned as matches.
    pub completed_only: bool,
    /// When `false`, existing jobs are ignored and a new one is always started.
    pub prefer_existing: bool,
    pub tier: RetrievalTier,
}

impl JobQuery {
    /// Query for a vault inventory job.
    pub fn inventory(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            action: JobAction::InventoryRetrieval,
            archive_id: None,
            filename: None,
            completed_only: true,
            prefer_existing: true,
            tier: RetrievalTier::default(),
        }
    }

    /// Query for a retrieval of `archive_id`, matching jobs by id or by `filename`.
    pub fn archive(
        vault_name: impl Into<String>,
        archive_id: Option<String>,
        filename: Option<String>,
    ) -> Self {
        Self {
            vault_name: vault_name.into(),
            action: JobAction::ArchiveRetrieval,
            archive_id,
            filename,
            completed_only: true,
            prefer_existing: true,
            tier: RetrievalTier::default(),
        }
    }

    pub fn completed_only(mut self, completed_only: bool) -> Self {
        self.completed_only = completed_only;
        self
    }

    pub fn prefer_existing(mut self, prefer_existing: bool) -> Self {
        self.prefer_existing = prefer_existing;
        self
    }

    pub fn tier(mut self, tier: RetrievalTier) -> Self {
        self.tier = tier;
        self
    }

    /// Returns `true` if `job` targets what this query asks for, regardless
    /// of completion.
    pub fn targets(&self, job: &JobRecord) -> bool {
        if job.action != self.action || !job.is_for_vault(&self.vault_name) {
            return false;
        }
        if self.action == JobAction::InventoryRetrieval {
            return true;
        }
        match (&self.filename, &self.archive_id) {
            (None, None) => true,
            (filename, archive_id) => {
                let by_name = filename
                    .as_deref()
                    .is_some_and(|f| job.description.as_deref() == Some(f));
                let by_id = archive_id
                    .as_deref()
                    .is_some_and(|id| job.archive_id.as_deref() == Some(id));
                by_name || by_id
            }
        }
    }

    /// Parameters for initiating the job this query describes.
    pub fn job_parameters(&self) -> Result<JobParameters, VaultError> {
        match self.action {
            JobAction::InventoryRetrieval => Ok(JobParameters::inventory()),
            JobAction::ArchiveRetrieval => {
                let archive_id = self.archive_id.clone().ok_or_else(|| {
                    VaultError::NotFound("archive id required to start a retrieval".into())
                })?;
                Ok(JobParameters::archive(
                    archive_id,
                    self.filename.clone(),
                    self.tier,
                ))
            }
        }
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobDecision {
    /// Matching jobs, newest completion first.
    Existing(Vec<JobRecord>),
    /// Nothing usable yet, but a matching job is still running.
    ///
    /// The running job must match the archive id or filename too, not only
    /// the action and vault; a pending retrieval of another archive does not
    /// hold back this one.
    Wait,
    Initiate,
}

/// Outcome of [`resolve_job`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobResolution {
    /// Matching jobs, newest completion first.
    Existing(Vec<JobRecord>),
    /// A matching job is still running; nothing was started.
    Pending,
    /// A new job was started with this id.
    Initiated(String),
}

/// Orders jobs newest completion first; jobs without a completion date go last.
fn newest_first(a: &JobRecord, b: &JobRecord) -> Ordering {
    match (&a.completion_date, &b.completion_date) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.creation_date.cmp(&a.creation_date),
    }
}

/// Jobs matching `query`, newest completion first.
pub fn matching_jobs(jobs: &[JobRecord], query: &JobQuery) -> Vec<JobRecord> {
    let mut found: Vec<JobRecord> = jobs
        .iter()
        .filter(|j| query.targets(j) && (j.completed || !query.completed_only))
        .cloned()
        .collect();
    found.sort_by(newest_first);
    found
}

/// Decides between reusing, waiting and initiating.
pub fn decide(jobs: &[JobRecord], query: &JobQuery) -> JobDecision {
    if !query.prefer_existing {
        return JobDecision::Initiate;
    }
    let found = matching_jobs(jobs, query);
    if !found.is_empty() {
        return JobDecision::Existing(found);
    }
    if jobs.iter().any(|j| query.targets(j) && !j.completed) {
        return JobDecision::Wait;
    }
    JobDecision::Initiate
}

/// Lists jobs, applies [`decide`] and starts a job when needed.
pub async fn resolve_job(
    api: &dyn VaultApi,
    query: &JobQuery,
) -> Result<JobResolution, VaultError> {
    let decision = if query.prefer_existing {
        let jobs = api
            .list_jobs(&query.vault_name)
            .await
            .map_err(|e| VaultError::remote("list_jobs", e))?;
        debug!(vault = %query.vault_name, jobs = jobs.len(), action = %query.action, "listed jobs");
        decide(&jobs, query)
    } else {
        JobDecision::Initiate
    };

    match decision {
        JobDecision::Existing(jobs) => Ok(JobResolution::Existing(jobs)),
        JobDecision::Wait => {
            info!(vault = %query.vault_name, action = %query.action, "matching job still in progress");
            Ok(JobResolution::Pending)
        }
        JobDecision::Initiate => {
            let params = query.job_parameters()?;
            let job_id = api
                .initiate_job(&query.vault_name, &params)
                .await
                .map_err(|e| VaultError::remote("initiate_job", e))?;
            info!(vault = %query.vault_name, action = %query.action, job_id = %job_id, "job initiated");
            Ok(JobResolution::Initiated(job_id))
        }
    }
}
