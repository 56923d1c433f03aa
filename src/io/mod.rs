mod http;
mod local;

pub use http::{HttpConfig, HttpRangeSource};
pub use local::LocalFileSource;

use crate::error::Result;
use async_trait::async_trait;

/// A remote (or local) byte source that can serve inclusive byte ranges.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Human-readable name of the resource, used in error messages.
    fn location(&self) -> &str;

    /// Ask for a minimal range and report whether it came back as partial content.
    ///
    /// `Ok(false)` means the source would answer with the whole resource;
    /// errors are reserved for transport failures.
    async fn probe_range_support(&self) -> Result<bool>;

    /// Total length of the resource in bytes.
    async fn length(&self) -> Result<u64>;

    /// Fetch exactly `start..=end`.
    async fn get_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}
