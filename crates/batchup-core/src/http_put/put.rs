//! Single HTTP PUT of a file body.

use std::fs::File;
use std::io::Read;

use url::Url;

use crate::item::{FileItem, UploadReceipt};
use crate::retry::UploadError;
use crate::scheduler::{percent_of, ProgressReporter};

use super::PutOptions;

/// PUT `item` to `url` once. Returns `UploadError` so the caller can classify
/// and retry with backoff.
pub(super) fn put_file(
    url: &Url,
    item: &FileItem,
    options: &PutOptions,
    progress: &ProgressReporter,
) -> Result<UploadReceipt, UploadError> {
    let mut file = File::open(&item.path)?;
    let size = file.metadata()?.len();

    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str()).map_err(UploadError::Curl)?;
    easy.upload(true).map_err(UploadError::Curl)?;
    easy.in_filesize(size).map_err(UploadError::Curl)?;
    easy.connect_timeout(options.connect_timeout)
        .map_err(UploadError::Curl)?;
    // Stall detection: fail when fewer than 1 byte/s moves for the stall timeout.
    easy.low_speed_limit(1).map_err(UploadError::Curl)?;
    easy.low_speed_time(options.stall_timeout)
        .map_err(UploadError::Curl)?;
    easy.timeout(options.max_duration).map_err(UploadError::Curl)?;
    easy.progress(true).map_err(UploadError::Curl)?;

    let mut list = curl::easy::List::new();
    list.append(&format!(
        "Content-Disposition: attachment; filename=\"{}\"",
        item.name.replace('"', "")
    ))
    .map_err(UploadError::Curl)?;
    list.append("Expect:").map_err(UploadError::Curl)?;
    for (k, v) in &options.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(UploadError::Curl)?;
    }
    easy.http_headers(list).map_err(UploadError::Curl)?;

    let mut sent: u64 = 0;
    let mut read_error: Option<std::io::Error> = None;
    let mut last_percent: Option<u8> = None;
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .read_function(|buf| match file.read(buf) {
                Ok(n) => {
                    sent += n as u64;
                    Ok(n)
                }
                Err(e) => {
                    read_error = Some(e);
                    Err(curl::easy::ReadError::Abort)
                }
            })
            .map_err(UploadError::Curl)?;
        transfer
            .progress_function(|_dltotal, _dlnow, _ultotal, ulnow| {
                let pct = percent_of(ulnow.max(0.0) as u64, size);
                if last_percent != Some(pct) {
                    last_percent = Some(pct);
                    progress.report(pct);
                }
                true
            })
            .map_err(UploadError::Curl)?;
        transfer.perform()
    };
    if let Err(e) = perform_result {
        if e.is_aborted_by_callback() {
            if let Some(io_err) = read_error.take() {
                return Err(UploadError::Io(io_err));
            }
        }
        return Err(UploadError::Curl(e));
    }

    let code = easy.response_code().map_err(UploadError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(UploadError::Http(code));
    }
    if sent != size {
        return Err(UploadError::Incomplete {
            expected: size,
            sent,
        });
    }
    if last_percent != Some(100) {
        progress.report(100);
    }

    tracing::debug!(item = %item.name, %url, code, bytes = sent, "upload finished");
    Ok(UploadReceipt {
        id: item.id.clone(),
        name: item.name.clone(),
        url: url.to_string(),
        status: code,
        bytes: sent,
    })
}
