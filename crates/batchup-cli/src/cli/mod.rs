//! CLI for the batchup batch uploader.

mod commands;

use anyhow::Result;
use batchup_core::config;
use batchup_core::tier::DeviceTier;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_completions, run_config, run_man, run_upload, UploadArgs};

/// Top-level CLI for batchup.
#[derive(Debug, Parser)]
#[command(name = "batchup", version)]
#[command(about = "batchup: upload many files with adaptive concurrency", long_about = None)]
pub struct Cli {
    /// More log detail (-v debug for everything batchup, -vv trace for all crates).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read this config file instead of ~/.config/batchup/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload files (directories are expanded one level) with HTTP PUT.
    Upload {
        /// Files or directories to upload.
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Base URL to PUT to; overrides [upload] endpoint from the config.
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Path segment(s) inserted between the endpoint and each file name.
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        /// Device tier selecting the concurrency ceiling: low, mid or high.
        #[arg(long, value_name = "TIER")]
        tier: Option<DeviceTier>,

        /// Print the final report as JSON instead of a progress line and summary.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file location and the effective configuration.
    Config,

    /// Generate shell completions on stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Render the man page on stdout.
    Man,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man(),
            CliCommand::Config => {
                let (path, cfg) = load_config(self.config)?;
                run_config(&path, &cfg)
            }
            CliCommand::Upload {
                paths,
                endpoint,
                prefix,
                tier,
                json,
            } => {
                let (_, cfg) = load_config(self.config)?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_upload(
                    &cfg,
                    UploadArgs {
                        paths,
                        endpoint,
                        prefix,
                        tier,
                        json,
                    },
                )
                .await
            }
        }
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<(PathBuf, config::BatchupConfig)> {
    match explicit {
        Some(path) => {
            let cfg = config::load_from_path(&path)?;
            Ok((path, cfg))
        }
        None => Ok((config::config_path()?, config::load_or_init()?)),
    }
}

#[cfg(test)]
mod tests;
