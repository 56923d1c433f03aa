//! One-shot helpers that open a fresh session per call.

use crate::error::Result;
use crate::io::HttpConfig;
use crate::zip::PartialZipSession;

/// Names of all entries in the remote archive at `archive_url`, sorted.
pub async fn get_file_list(archive_url: &str) -> Result<Vec<String>> {
    let mut session = PartialZipSession::from_url(archive_url, &HttpConfig::default())?;
    session.open().await?;
    session.file_list()
}

/// Contents of `file_path` inside the remote archive at `archive_url`.
pub async fn download_file(archive_url: &str, file_path: &str) -> Result<Vec<u8>> {
    let mut session = PartialZipSession::from_url(archive_url, &HttpConfig::default())?;
    session.open().await?;
    session.download_file(file_path).await
}
