//! `batchup upload` – run one batch of HTTP PUT uploads.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use batchup_core::config::BatchupConfig;
use batchup_core::http_put::HttpPutUploader;
use batchup_core::item::{collect_files, FileItem, UploadReceipt};
use batchup_core::retry::UploadError;
use batchup_core::scheduler::{
    BatchEvent, BatchOutcome, BatchScheduler, ChannelObserver, FileProgress,
};
use batchup_core::tier::DeviceTier;
use serde::Serialize;
use tokio::sync::mpsc;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct UploadArgs {
    pub paths: Vec<PathBuf>,
    pub endpoint: Option<String>,
    pub prefix: Option<String>,
    pub tier: Option<DeviceTier>,
    pub json: bool,
}

pub async fn run_upload(cfg: &BatchupConfig, args: UploadArgs) -> Result<()> {
    let items = collect_files(&args.paths)?;
    if items.is_empty() {
        println!("No files to upload.");
        return Ok(());
    }
    let total = items.len();
    let tier = args.tier.unwrap_or(cfg.default_tier);
    let uploader = HttpPutUploader::from_config(
        &cfg.upload,
        args.endpoint.as_deref(),
        args.prefix,
        cfg.retry_policy(),
    )?;
    tracing::info!(
        files = total,
        %tier,
        endpoint = %uploader.endpoint(),
        "starting upload batch"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = BatchScheduler::new(
        items,
        uploader,
        ChannelObserver::new(tx),
        tier,
        &cfg.scheduler,
    );
    let (handle, join) = scheduler.spawn();

    let interrupt_handle = handle.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, tearing down batch");
            interrupt_handle.destroy();
        }
    });
    // Ends once the scheduler drops its observer.
    let printer = tokio::spawn(print_progress(rx, total, !args.json));

    let outcome = join.await.context("upload batch task")?;
    interrupt.abort();
    let _ = printer.await;

    let report = Report::from_outcome(outcome, total);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }
    report.into_result()
}

/// In-place progress line: files done out of total, mean percent of the files in flight.
async fn print_progress(mut rx: mpsc::UnboundedReceiver<BatchEvent>, total: usize, show: bool) {
    let mut done = 0usize;
    let mut in_flight: Vec<FileProgress> = Vec::new();
    let mut last_print: Option<Instant> = None;
    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::ItemUploaded { count } => done = count,
            BatchEvent::Progress(rows) => in_flight = rows,
            _ => {}
        }
        if !show {
            continue;
        }
        let due = last_print.map_or(true, |t| t.elapsed() >= PROGRESS_INTERVAL);
        if due || done >= total {
            let mean = if in_flight.is_empty() {
                0
            } else {
                in_flight.iter().map(|p| p.progress as usize).sum::<usize>() / in_flight.len()
            };
            print!(
                "\r  {}/{} files  {} in flight ({}%)   ",
                done,
                total,
                in_flight.len(),
                mean
            );
            let _ = std::io::stdout().flush();
            last_print = Some(Instant::now());
        }
    }
    if show && last_print.is_some() {
        println!();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Succeeded,
    Failed,
    Interrupted,
    Stalled,
}

/// Final state of a batch as printed by the CLI.
#[derive(Debug, Serialize)]
struct Report {
    status: Status,
    total: usize,
    uploaded: Vec<UploadReceipt>,
    /// Paths of files that were not uploaded.
    unresolved: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Report {
    fn from_outcome(
        outcome: BatchOutcome<FileItem, UploadReceipt, UploadError>,
        total: usize,
    ) -> Self {
        let paths = |items: Vec<FileItem>| -> Vec<PathBuf> {
            items.into_iter().map(|i| i.path).collect()
        };
        match outcome {
            BatchOutcome::Succeeded(uploaded) => Self {
                status: Status::Succeeded,
                total,
                uploaded,
                unresolved: Vec::new(),
                error: None,
            },
            BatchOutcome::Failed {
                error,
                results,
                unresolved,
            } => Self {
                status: Status::Failed,
                total,
                uploaded: results,
                unresolved: paths(unresolved),
                error: Some(error.to_string()),
            },
            // Teardown discards results, so what finished before the interrupt is unknown.
            BatchOutcome::Destroyed => Self {
                status: Status::Interrupted,
                total,
                uploaded: Vec::new(),
                unresolved: Vec::new(),
                error: None,
            },
            BatchOutcome::Stalled {
                results,
                unresolved,
            } => Self {
                status: Status::Stalled,
                total,
                uploaded: results,
                unresolved: paths(unresolved),
                error: None,
            },
        }
    }

    fn print_summary(&self) {
        match self.status {
            Status::Succeeded => println!("Uploaded {} file(s).", self.uploaded.len()),
            Status::Interrupted => println!("Upload interrupted."),
            Status::Failed | Status::Stalled => {
                println!(
                    "Uploaded {} of {} file(s); not uploaded:",
                    self.uploaded.len(),
                    self.total
                );
                for path in &self.unresolved {
                    println!("  {}", path.display());
                }
            }
        }
    }

    /// Non-success outcomes become an error so the process exits non-zero.
    fn into_result(self) -> Result<()> {
        match self.status {
            Status::Succeeded => Ok(()),
            Status::Interrupted => anyhow::bail!("upload interrupted"),
            Status::Failed => anyhow::bail!(
                "too many consecutive failures, last: {}",
                self.error.unwrap_or_default()
            ),
            Status::Stalled => anyhow::bail!(
                "batch stalled with {} file(s) unresolved",
                self.unresolved.len()
            ),
        }
    }
}
