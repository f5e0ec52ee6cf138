//! Vault transfer engine.
//!
//! Provides:
//! - [`VaultApi`]: the abstract vault service, with a directory-backed
//!   implementation in [`LocalVault`]
//! - [`Uploader`] and [`Downloader`]: resumable, cancellable chunked transfers
//! - [`jobs`]: reuse-or-initiate policy for retrieval and inventory jobs
//! - [`VaultManager`]: the operations the command line exposes

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod jobs;
pub mod local;
pub mod manager;
pub mod upload;

#[cfg(test)]
mod mock;

pub use api::{ApiFuture, VaultApi};
pub use config::{ColdstashConfig, default_config_path};
pub use download::{DownloadController, DownloadSource, Downloader};
pub use error::VaultError;
pub use jobs::{JobDecision, JobQuery, JobResolution, decide, matching_jobs, resolve_job};
pub use local::LocalVault;
pub use manager::VaultManager;
pub use upload::{UploadController, UploadTarget, Uploader};
