//! # partialzip
//!
//! Download single entries from remote ZIP archives using HTTP Range requests.
//!
//! Only the archive's trailer, its Central Directory and the requested
//! entry's bytes are fetched, which makes it practical to pull a few files
//! out of a multi-gigabyte archive on a static file server.
//!
//! ## Features
//!
//! - Capability probe: servers that ignore `Range` are rejected up front
//! - ZIP64 archives (EOCD64 locator/record, ZIP64 extra fields)
//! - STORED and DEFLATE entries, checked against their CRC-32
//! - Archive comments
//!
//! ## Example
//!
//! ```no_run
//! use partialzip::{HttpConfig, PartialZipSession};
//!
//! #[tokio::main]
//! async fn main() -> partialzip::Result<()> {
//!     let mut session =
//!         PartialZipSession::from_url("https://example.com/archive.zip", &HttpConfig::default())?;
//!     session.open().await?;
//!
//!     for name in session.file_list()? {
//!         println!("{}", name);
//!     }
//!
//!     let readme = session.download_file("readme.txt").await?;
//!     println!("{}", String::from_utf8_lossy(&readme));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod downloader;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use downloader::{download_file, get_file_list};
pub use error::{PartialZipError, Result};
pub use io::{HttpConfig, HttpRangeSource, LocalFileSource, RangeSource};
pub use zip::{ArchiveIndex, CentralDirectoryEntry, PartialZipSession};
