//! CLI for packsync.

mod board;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use packsync_core::catalogue::CatalogueDb;
use packsync_core::config;
use std::path::PathBuf;

use commands::{run_downloads, run_import, run_remove, run_reset, run_status, RunOptions};

/// Top-level CLI for packsync.
#[derive(Debug, Parser)]
#[command(name = "packsync")]
#[command(about = "packsync: download a catalogue of sample packs with bounded concurrency", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Import pack metadata from a JSON file (duplicates by path are skipped).
    Import {
        /// Path to the metadata file.
        path: PathBuf,
    },

    /// Show every pack and whether it has been downloaded.
    Status,

    /// Download all pending packs.
    Run {
        /// Downloads in flight at once (default: `concurrency` from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Site the pack paths are relative to (default: `base_url` from config).
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Library root (default: `download_dir` from config).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
        /// Use the slot runner directly instead of correlating transfer events.
        #[arg(long)]
        direct: bool,
    },

    /// Mark a pack as not downloaded so the next run fetches it again.
    Reset {
        /// Catalogue path of the pack.
        path: String,
    },

    /// Remove a pack from the catalogue.
    Remove {
        /// Catalogue path of the pack.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = CatalogueDb::open_default().await?;

        match cli.command {
            CliCommand::Import { path } => run_import(&db, &path).await?,
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Run {
                jobs,
                base_url,
                download_dir,
                direct,
            } => {
                let opts = RunOptions {
                    jobs,
                    base_url,
                    download_dir,
                    direct,
                };
                run_downloads(&db, &cfg, opts).await?;
            }
            CliCommand::Reset { path } => run_reset(&db, &path).await?,
            CliCommand::Remove { path } => run_remove(&db, &path).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
