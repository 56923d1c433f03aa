//! Pure decoding of ZIP trailer and Central Directory buffers.
//!
//! Nothing here performs I/O: the session fetches byte windows and hands
//! them over together with their absolute archive offset, so every error
//! can point at the place in the archive it came from.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the locator and the ZIP64 EOCD for 64-bit values
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data

use log::trace;
use std::io::Cursor;

use crate::error::{PartialZipError, Result};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
pub const MAX_COMMENT_SIZE: u64 = 65535;

/// Where the Central Directory lives and how many entries it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryLocation {
    pub offset: u64,
    pub size: u64,
    pub entries: u64,
}

impl CentralDirectoryLocation {
    /// Take the 64-bit values when a ZIP64 record is present, the EOCD's otherwise.
    pub fn resolve(
        eocd: &EndOfCentralDirectory,
        eocd64: Option<&Zip64EndOfCentralDirectory>,
    ) -> Self {
        match eocd64 {
            Some(eocd64) => Self {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            },
            None => Self {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                entries: eocd.total_entries as u64,
            },
        }
    }
}

/// Find the EOCD inside `tail`, the last bytes of the archive starting at `tail_offset`.
///
/// The record without a comment sits exactly at the end. Otherwise the
/// tail is scanned backwards for a signature whose comment length accounts
/// for every remaining byte.
pub fn find_eocd(tail: &[u8], tail_offset: u64) -> Result<(EndOfCentralDirectory, u64)> {
    let size = EndOfCentralDirectory::SIZE;
    if tail.len() < size {
        return Err(PartialZipError::invalid(
            "end of central directory",
            tail_offset,
            format!("archive tail is only {} bytes", tail.len()),
        ));
    }

    for i in (0..=tail.len() - size).rev() {
        if &tail[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
        if comment_len == tail.len() - i - size {
            let offset = tail_offset + i as u64;
            let eocd = EndOfCentralDirectory::from_bytes(&tail[i..i + size], offset)?;
            return Ok((eocd, offset));
        }
    }

    Err(PartialZipError::invalid(
        "end of central directory",
        tail_offset,
        "signature not found; not a ZIP archive",
    ))
}

/// Decode exactly `entries` Central Directory records from `data`.
///
/// Decoding stops at the declared count rather than at the first
/// non-matching signature, since entry contents may contain `PK\x01\x02`.
pub fn parse_central_directory(
    data: &[u8],
    cd_offset: u64,
    entries: u64,
) -> Result<Vec<CentralDirectoryEntry>> {
    // Every entry needs at least its fixed part; reject absurd counts early.
    let max_entries = (data.len() / CentralDirectoryEntry::MIN_SIZE) as u64;
    if entries > max_entries {
        return Err(PartialZipError::invalid(
            "central directory",
            cd_offset,
            format!(
                "{} entries declared but only {} bytes available",
                entries,
                data.len()
            ),
        ));
    }

    let mut cursor = Cursor::new(data);
    let mut parsed = Vec::with_capacity(entries as usize);
    for _ in 0..entries {
        let entry = CentralDirectoryEntry::parse(&mut cursor, cd_offset)?;
        trace!("{:?}", entry);
        parsed.push(entry);
    }
    Ok(parsed)
}
