use async_trait::async_trait;
use log::{debug, trace};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::RangeSource;
use crate::error::{PartialZipError, Result};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Client settings for [`HttpRangeSource`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request deadline. The session does not retry on expiry.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// HTTP(S) Range request source for remote ZIP files
pub struct HttpRangeSource {
    client: Client,
    url: String,
    transferred_bytes: AtomicU64,
}

impl HttpRangeSource {
    /// Build a client for `url`. No request is sent until the first call.
    pub fn new(url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Get total body bytes received from the network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn send_range(&self, start: u64, end: u64) -> Result<reqwest::Response> {
        let range = format!("bytes={}-{}", start, end);
        trace!("GET {} Range: {}", self.url, range);
        Ok(self
            .client
            .get(&self.url)
            .header(RANGE, range)
            .send()
            .await?)
    }

    fn count(&self, n: usize) {
        self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Extract the complete length from a `Content-Range: bytes a-b/total` value.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().split_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    fn location(&self) -> &str {
        &self.url
    }

    async fn probe_range_support(&self) -> Result<bool> {
        let resp = self.send_range(0, 0).await?;
        let status = resp.status();
        debug!("Range probe for {} returned {}", self.url, status);

        // Drain the body so the connection can be reused; for servers that
        // ignore ranges this is the whole archive, so only read it on 206.
        if status == StatusCode::PARTIAL_CONTENT {
            let body = resp.bytes().await?;
            self.count(body.len());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn length(&self) -> Result<u64> {
        let resp = self.send_range(0, 0).await?;
        if resp.status() == StatusCode::PARTIAL_CONTENT {
            let total = resp
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total);
            let body = resp.bytes().await?;
            self.count(body.len());
            if let Some(total) = total {
                debug!("{} is {} bytes (Content-Range)", self.url, total);
                return Ok(total);
            }
        }

        // Server didn't state the complete length; ask for it directly.
        let resp = self.client.head(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(PartialZipError::UnexpectedResponse {
                start: 0,
                end: 0,
                detail: format!("HEAD returned {}", resp.status()),
            });
        }
        let total = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| PartialZipError::UnexpectedResponse {
                start: 0,
                end: 0,
                detail: "server did not return the resource length".to_string(),
            })?;
        debug!("{} is {} bytes (Content-Length)", self.url, total);
        Ok(total)
    }

    async fn get_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start {
            return Err(PartialZipError::UnexpectedResponse {
                start,
                end,
                detail: "empty range".to_string(),
            });
        }

        let resp = self.send_range(start, end).await?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(PartialZipError::UnexpectedResponse {
                start,
                end,
                detail: format!("expected 206 Partial Content, got {}", resp.status()),
            });
        }

        let bytes = resp.bytes().await?;
        self.count(bytes.len());

        let expected = end - start + 1;
        if bytes.len() as u64 != expected {
            return Err(PartialZipError::UnexpectedResponse {
                start,
                end,
                detail: format!("expected {} bytes, got {}", expected, bytes.len()),
            });
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn source(server: &MockServer) -> HttpRangeSource {
        HttpRangeSource::new(server.url("/archive.zip"), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("bytes 0-0/1234"), Some(1234));
        assert_eq!(content_range_total("bytes 0-0/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_probe_accepts_partial_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip").header("range", "bytes=0-0");
                then.status(206)
                    .header("content-range", "bytes 0-0/10")
                    .body("P");
            })
            .await;

        let source = source(&server);
        assert!(source.probe_range_support().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_rejects_full_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(200).body("PK whole archive");
            })
            .await;

        let source = source(&server);
        assert!(!source.probe_range_support().await.unwrap());
        assert_eq!(source.transferred_bytes(), 0);
    }

    #[tokio::test]
    async fn test_probe_rejects_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(416);
            })
            .await;

        assert!(!source(&server).probe_range_support().await.unwrap());
    }

    #[tokio::test]
    async fn test_length_from_content_range() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip").header("range", "bytes=0-0");
                then.status(206)
                    .header("content-range", "bytes 0-0/4096")
                    .body("P");
            })
            .await;

        assert_eq!(source(&server).length().await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn test_get_range_exact() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip").header("range", "bytes=4-7");
                then.status(206)
                    .header("content-range", "bytes 4-7/10")
                    .body("4567");
            })
            .await;

        let source = source(&server);
        assert_eq!(source.get_range(4, 7).await.unwrap(), b"4567");
        assert_eq!(source.transferred_bytes(), 4);
    }

    #[tokio::test]
    async fn test_get_range_short_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip").header("range", "bytes=4-7");
                then.status(206).body("45");
            })
            .await;

        let err = source(&server).get_range(4, 7).await.unwrap_err();
        assert!(matches!(
            err,
            PartialZipError::UnexpectedResponse { start: 4, end: 7, .. }
        ));
    }

    #[tokio::test]
    async fn test_get_range_requires_partial_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(200).body("0123456789");
            })
            .await;

        let err = source(&server).get_range(4, 7).await.unwrap_err();
        assert!(matches!(err, PartialZipError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_get_range_rejects_inverted_range() {
        let server = MockServer::start_async().await;
        let err = source(&server).get_range(8, 7).await.unwrap_err();
        assert!(matches!(err, PartialZipError::UnexpectedResponse { .. }));
    }

    async fn serve_range(server: &MockServer, archive: &[u8], start: usize, end: usize) {
        let body = archive[start..=end].to_vec();
        let range = format!("bytes={}-{}", start, end);
        let content_range = format!("bytes {}-{}/{}", start, end, archive.len());
        server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/archive.zip")
                    .header("range", range.as_str());
                then.status(206)
                    .header("content-range", content_range.as_str())
                    .body(body);
            })
            .await;
    }

    #[tokio::test]
    async fn test_session_over_http() {
        use crate::zip::PartialZipSession;
        use crate::zip::test_archive::ArchiveBuilder;

        let text = b"served through ranges ".repeat(8);
        let archive = ArchiveBuilder::new().deflated("readme.txt", &text).build();
        let len = archive.len();

        let server = MockServer::start_async().await;
        serve_range(&server, &archive, 0, 0).await;
        serve_range(&server, &archive, len - 22, len - 1).await;

        let mut session =
            PartialZipSession::from_url(server.url("/archive.zip"), &HttpConfig::default()).unwrap();
        // The Central Directory and entry ranges depend on the layout; serve
        // them once the offsets are known from the EOCD.
        let eocd = crate::zip::EndOfCentralDirectory::from_bytes(&archive[len - 22..], 0).unwrap();
        let cd_start = eocd.cd_offset as usize;
        serve_range(&server, &archive, cd_start, cd_start + eocd.cd_size as usize - 1).await;
        session.open().await.unwrap();

        let entry = session.index().unwrap().find("readme.txt").unwrap().clone();
        let header = entry.lfh_offset as usize;
        serve_range(&server, &archive, header, header + 29).await;
        let data_start = header + 30 + "readme.txt".len();
        serve_range(
            &server,
            &archive,
            data_start,
            data_start + entry.compressed_size as usize - 1,
        )
        .await;

        assert_eq!(session.download_file("readme.txt").await.unwrap(), text);
        assert!(session.source().transferred_bytes() < (len + text.len()) as u64);
    }

    #[tokio::test]
    async fn test_session_fails_without_ranges() {
        use crate::zip::PartialZipSession;
        use crate::zip::test_archive::ArchiveBuilder;

        let archive = ArchiveBuilder::new().stored("readme.txt", b"hello").build();
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/archive.zip");
                then.status(200).body(archive);
            })
            .await;

        let mut session =
            PartialZipSession::from_url(server.url("/archive.zip"), &HttpConfig::default()).unwrap();
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, PartialZipError::RangesNotSupported(_)));
        // Only the probe went out; no Central Directory fetch followed.
        mock.assert_hits_async(1).await;
    }
}
