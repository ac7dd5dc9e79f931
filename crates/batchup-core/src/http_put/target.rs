//! Upload URL construction.

use url::Url;

use crate::retry::UploadError;

/// `{endpoint}/{prefix...}/{name}` with every segment percent-encoded.
/// Empty prefix segments are skipped, so `"a//b/"` behaves like `"a/b"`.
pub fn target_url(endpoint: &Url, prefix: Option<&str>, name: &str) -> Result<Url, UploadError> {
    if name.is_empty() {
        return Err(UploadError::InvalidUrl("empty file name".to_string()));
    }
    let mut url = endpoint.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| UploadError::InvalidUrl(format!("{} cannot take a path", endpoint)))?;
        segments.pop_if_empty();
        if let Some(prefix) = prefix {
            segments.extend(prefix.split('/').filter(|s| !s.is_empty()));
        }
        segments.push(name);
    }
    Ok(url)
}
