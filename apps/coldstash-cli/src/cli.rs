use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "coldstash",
    version,
    about = "Upload to and retrieve from cold-storage vaults",
    after_help = "\
Configuration is read from --config, or ~/.config/coldstash/config.json.
RUST_LOG overrides the configured log filter."
)]
pub(crate) struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List vaults
    Vaults,

    /// Create a vault in the local backend
    CreateVault { vault: String },

    /// Upload a file, resuming its in-progress upload if there is one
    Upload {
        file: PathBuf,

        #[arg(long)]
        vault: String,

        /// First chunk to transmit; earlier chunks are only hashed
        #[arg(long, default_value_t = 0)]
        resume: u32,
    },

    /// List in-progress multipart uploads
    Uploads { vault: String },

    /// List jobs of a vault
    Jobs { vault: String },

    /// Find or start an archive retrieval job
    Retrieve {
        vault: String,

        #[arg(long)]
        archive_id: Option<String>,

        #[arg(long)]
        filename: Option<String>,

        /// Start a new job even if a matching one exists
        #[arg(long)]
        new: bool,
    },

    /// Show the latest inventory, starting an inventory job if needed
    Inventory {
        vault: String,

        /// Start a new inventory job even if a completed one exists
        #[arg(long)]
        new: bool,
    },

    /// Download a completed job's output
    Download {
        vault: String,
        job_id: String,
        dest: PathBuf,

        /// Size of the output in bytes; looked up from the job when omitted
        #[arg(long)]
        size: Option<u64>,

        /// First chunk to fetch
        #[arg(long, default_value_t = 0)]
        resume: u32,
    },

    /// Delete an archive
    Delete { vault: String, archive_id: String },

    /// Write the effective configuration to the configuration file
    SaveConfig,
}
