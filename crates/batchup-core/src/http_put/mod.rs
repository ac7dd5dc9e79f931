//! HTTP PUT executor: uploads a local file to `{endpoint}/{prefix}/{name}`.
//!
//! Each attempt streams the file with libcurl on the blocking pool, reports
//! progress as the body is sent, and retries transient failures with backoff
//! before handing the outcome back to the scheduler.

mod put;
mod target;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::config::UploadConfig;
use crate::item::{FileItem, UploadReceipt};
use crate::retry::{run_with_retry, RetryPolicy, UploadError};
use crate::scheduler::{ProgressReporter, Uploader};

pub use target::target_url;

/// Per-request curl settings.
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub connect_timeout: Duration,
    /// Abort when no bytes are sent for this long.
    pub stall_timeout: Duration,
    pub max_duration: Duration,
    pub headers: Vec<(String, String)>,
}

impl From<&UploadConfig> for PutOptions {
    fn from(cfg: &UploadConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            stall_timeout: Duration::from_secs(cfg.stall_timeout_secs.max(1)),
            max_duration: Duration::from_secs(cfg.max_duration_secs.max(1)),
            headers: cfg
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Uploads [`FileItem`]s with HTTP PUT.
#[derive(Debug, Clone)]
pub struct HttpPutUploader {
    endpoint: Url,
    prefix: Option<String>,
    options: PutOptions,
    retry: RetryPolicy,
}

impl HttpPutUploader {
    pub fn new(
        endpoint: &str,
        prefix: Option<String>,
        options: PutOptions,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid endpoint {endpoint}"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("endpoint must be http or https: {}", endpoint);
        }
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("endpoint cannot take a path: {}", endpoint);
        }
        Ok(Self {
            endpoint,
            prefix: prefix.filter(|p| !p.trim_matches('/').is_empty()),
            options,
            retry,
        })
    }

    /// Build from the `[upload]` config section; `endpoint` overrides the configured one.
    pub fn from_config(
        cfg: &UploadConfig,
        endpoint: Option<&str>,
        prefix: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let endpoint = endpoint
            .or(cfg.endpoint.as_deref())
            .ok_or_else(|| {
                anyhow::anyhow!("no upload endpoint: pass --endpoint or set [upload] endpoint")
            })?;
        Self::new(endpoint, prefix, PutOptions::from(cfg), retry)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL the given file name is uploaded to.
    pub fn url_for(&self, name: &str) -> Result<Url, UploadError> {
        target_url(&self.endpoint, self.prefix.as_deref(), name)
    }
}

#[async_trait]
impl Uploader<FileItem, UploadReceipt, UploadError> for HttpPutUploader {
    async fn upload(
        &self,
        item: FileItem,
        progress: ProgressReporter,
    ) -> Result<UploadReceipt, UploadError> {
        let url = self.url_for(&item.name)?;
        let options = self.options.clone();
        let policy = self.retry;

        let joined = tokio::task::spawn_blocking(move || {
            run_with_retry(&policy, |attempt| {
                if attempt > 1 {
                    progress.report(0);
                }
                put::put_file(&url, &item, &options, &progress)
            })
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                format!("upload task cancelled: {}", e),
            ))),
        }
    }
}
