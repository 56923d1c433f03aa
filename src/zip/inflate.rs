use flate2::read::DeflateDecoder;
use log::debug;
use std::io::Read;

use crate::error::{PartialZipError, Result};

use super::structures::{CentralDirectoryEntry, CompressionMethod};

/// Turn an entry's compressed bytes into its contents.
///
/// `method` is the code from the local file header. Output length and
/// CRC-32 are checked against the Central Directory record.
pub fn decompress(entry: &CentralDirectoryEntry, method: u16, data: Vec<u8>) -> Result<Vec<u8>> {
    let contents = match CompressionMethod::from_u16(method) {
        CompressionMethod::Stored => data,
        CompressionMethod::Deflate => inflate(entry, &data)?,
        CompressionMethod::Unknown(method) => {
            return Err(PartialZipError::UnsupportedCompression {
                method,
                name: entry.file_name.clone(),
            });
        }
    };

    if contents.len() as u64 != entry.uncompressed_size {
        return Err(PartialZipError::Decompress {
            name: entry.file_name.clone(),
            reason: format!(
                "expected {} bytes, got {}",
                entry.uncompressed_size,
                contents.len()
            ),
        });
    }

    let actual = crc32fast::hash(&contents);
    if actual != entry.crc32 {
        return Err(PartialZipError::ChecksumMismatch {
            name: entry.file_name.clone(),
            expected: entry.crc32,
            actual,
        });
    }

    Ok(contents)
}

/// Raw DEFLATE (no zlib or gzip wrapper), bounded by the declared size.
fn inflate(entry: &CentralDirectoryEntry, data: &[u8]) -> Result<Vec<u8>> {
    debug!(
        "Inflating {} ({} -> {} bytes)",
        entry.file_name,
        data.len(),
        entry.uncompressed_size
    );

    // One extra byte lets an overlong stream show up as a size mismatch.
    let limit = entry.uncompressed_size.saturating_add(1);
    let mut out = Vec::with_capacity(entry.uncompressed_size.min(64 << 20) as usize);
    DeflateDecoder::new(data)
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| PartialZipError::Decompress {
            name: entry.file_name.clone(),
            reason: e.to_string(),
        })?;
    Ok(out)
}
