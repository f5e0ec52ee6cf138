mod cli;
mod progress;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use coldstash_vault::{ColdstashConfig, JobResolution, LocalVault, VaultManager};

use cli::{Cli, Commands};
use progress::{finished, format_bytes, printer, wait_or_abort};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(coldstash_vault::default_config_path);
    let config = ColdstashConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = %config_path.display(), root = %config.local_root.display(), "starting");

    let local = Arc::new(LocalVault::from_config(&config));
    let manager = VaultManager::new(local.clone(), &config);

    match cli.command {
        Commands::Vaults => {
            let vaults = manager.list_vaults().await?;
            if cli.json {
                return print_json(&vaults);
            }
            for v in vaults {
                println!(
                    "{:<24} {:>6} archives {:>12}",
                    v.name,
                    v.archive_count,
                    format_bytes(v.size_bytes)
                );
            }
        }
        Commands::CreateVault { vault } => {
            let summary = local.create_vault(&vault).await?;
            if cli.json {
                return print_json(&summary);
            }
            println!("{}", summary.arn.as_deref().unwrap_or(&summary.name));
        }
        Commands::Upload {
            file,
            vault,
            resume,
        } => {
            let label = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".into());
            let controller = manager
                .upload_file(&file, &vault, resume, Some(printer(label)))
                .await?;
            let status = wait_or_abort(&controller).await;
            let archive = finished("upload", &status, controller.join().await?)?;
            if cli.json {
                return print_json(&archive);
            }
            println!("archive id: {}", archive.archive_id);
            println!("tree hash:  {}", archive.checksum);
        }
        Commands::Uploads { vault } => {
            let uploads = manager.list_multipart_uploads(&vault).await?;
            if cli.json {
                return print_json(&uploads);
            }
            for u in uploads {
                let name = coldstash_protocol::ArchiveMeta::from_description(
                    u.archive_description.as_deref(),
                )
                .map(|m| m.filename)
                .unwrap_or_else(|| "-".into());
                println!(
                    "{}  {}  part size {}",
                    u.multipart_upload_id,
                    name,
                    format_bytes(u.part_size_in_bytes)
                );
            }
        }
        Commands::Jobs { vault } => {
            let jobs = manager.list_jobs(&vault).await?;
            if cli.json {
                return print_json(&jobs);
            }
            for j in jobs {
                println!(
                    "{}  {:<18}  {:<9}  {}",
                    j.job_id,
                    j.action.to_string(),
                    if j.completed { "completed" } else { "pending" },
                    j.description.as_deref().or(j.archive_id.as_deref()).unwrap_or("-"),
                );
            }
        }
        Commands::Retrieve {
            vault,
            archive_id,
            filename,
            new,
        } => {
            if archive_id.is_none() && filename.is_none() {
                bail!("give --archive-id, --filename or both");
            }
            let resolution = manager
                .get_or_initiate_retrieval_job(
                    &vault,
                    archive_id.as_deref(),
                    filename.as_deref(),
                    true,
                    !new,
                )
                .await?;
            report_resolution(&resolution, cli.json)?;
        }
        Commands::Inventory { vault, new } => {
            if new {
                let resolution = manager
                    .get_or_initiate_inventory_job(&vault, true, false)
                    .await?;
                return report_resolution(&resolution, cli.json);
            }
            match manager.get_inventory(&vault).await? {
                Some(inventory) if cli.json => return print_json(&inventory),
                Some(inventory) => {
                    println!("inventory of {}", inventory.inventory_date);
                    for a in inventory.archive_list {
                        println!(
                            "{}  {:>12}  {}",
                            a.archive_id,
                            format_bytes(a.size),
                            a.filename.as_deref().unwrap_or("-")
                        );
                    }
                }
                None => println!("inventory not ready yet; try again later"),
            }
        }
        Commands::Download {
            vault,
            job_id,
            dest,
            size,
            resume,
        } => {
            let label = dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".into());
            let controller = manager
                .download_archive(&vault, &job_id, &dest, size, resume, Some(printer(label)))
                .await?;
            let status = wait_or_abort(&controller).await;
            let written = finished("download", &status, controller.join().await?)?;
            println!("{} written to {}", format_bytes(written), dest.display());
        }
        Commands::Delete { vault, archive_id } => {
            manager.delete_archive(&vault, &archive_id).await?;
            println!("deleted {archive_id}");
        }
        Commands::SaveConfig => {
            config.save_to(&config_path)?;
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

fn report_resolution(resolution: &JobResolution, json: bool) -> anyhow::Result<()> {
    match resolution {
        JobResolution::Existing(jobs) if json => print_json(jobs),
        JobResolution::Existing(jobs) => {
            for j in jobs {
                println!("ready: {}", j.job_id);
            }
            Ok(())
        }
        JobResolution::Pending => {
            println!("a matching job is still in progress");
            Ok(())
        }
        JobResolution::Initiated(job_id) => {
            println!("started job {job_id}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
