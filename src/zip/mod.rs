//! ZIP archive structure discovery and entry extraction over byte ranges.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed-layout records (EOCD, ZIP64 locator and record,
//!   Central Directory entry, Local File Header)
//! - [`parser`]: pure decoding of fetched buffers
//! - [`inflate`]: stored pass-through and raw DEFLATE
//! - [`session`]: the open/list/download state machine
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading the EOCD first, then the Central Directory, allows listing and
//! extracting single files without fetching the rest of the archive.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support beyond reading the disk number fields
//! - No BZIP2, LZMA, or other compression methods

pub mod inflate;
pub mod parser;
mod session;
mod structures;

#[cfg(test)]
pub(crate) mod test_archive;

pub use session::{ArchiveIndex, PartialZipSession};
pub use structures::*;
