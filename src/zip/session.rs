use log::{debug, trace};
use std::sync::Arc;

use crate::error::{PartialZipError, Result};
use crate::io::{HttpConfig, HttpRangeSource, RangeSource};

use super::inflate::decompress;
use super::parser::{CentralDirectoryLocation, MAX_COMMENT_SIZE, find_eocd, parse_central_directory};
use super::structures::*;

/// Everything learned about an archive while opening it.
///
/// Built once by [`PartialZipSession::open`] and never modified afterwards.
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    /// Total archive length in bytes
    pub length: u64,
    pub eocd: EndOfCentralDirectory,
    pub eocd_offset: u64,
    pub zip64_locator: Option<Zip64EndOfCentralDirectoryLocator>,
    pub zip64_eocd: Option<Zip64EndOfCentralDirectory>,
    /// Entry count declared by the EOCD, or the ZIP64 EOCD when present
    pub entry_count: u64,
    /// Entries in Central Directory order
    pub entries: Vec<CentralDirectoryEntry>,
}

impl ArchiveIndex {
    /// First entry named `name`, in Central Directory order.
    pub fn find(&self, name: &str) -> Option<&CentralDirectoryEntry> {
        self.entries.iter().find(|e| e.file_name == name)
    }

    /// All entry names, sorted ascending.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.file_name.clone()).collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Unopened,
    Opening,
    Open(Arc<ArchiveIndex>),
}

/// A remote ZIP archive read through byte ranges.
///
/// Call [`open`](Self::open) once, then list or download entries. Downloads
/// take `&self`, so several may run concurrently against the same index.
pub struct PartialZipSession<S: RangeSource> {
    source: Arc<S>,
    state: SessionState,
}

impl PartialZipSession<HttpRangeSource> {
    /// Session over an HTTP(S) URL. Nothing is fetched until `open()`.
    pub fn from_url(url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpRangeSource::new(url, config)?)))
    }
}

impl<S: RangeSource> PartialZipSession<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            state: SessionState::Unopened,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open(_))
    }

    /// Discover the archive structure and build its index.
    ///
    /// Reopening an open session rebuilds the index. On failure the session
    /// is left unopened with no index.
    pub async fn open(&mut self) -> Result<()> {
        self.state = SessionState::Opening;
        match discover(self.source.as_ref()).await {
            Ok(index) => {
                debug!(
                    "Opened {}: {} entries, {} bytes",
                    self.source.location(),
                    index.entries.len(),
                    index.length
                );
                self.state = SessionState::Open(Arc::new(index));
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Unopened;
                Err(e)
            }
        }
    }

    pub fn index(&self) -> Result<&Arc<ArchiveIndex>> {
        match &self.state {
            SessionState::Open(index) => Ok(index),
            SessionState::Unopened | SessionState::Opening => Err(PartialZipError::NotOpen),
        }
    }

    /// Entry names sorted ascending.
    pub fn file_list(&self) -> Result<Vec<String>> {
        Ok(self.index()?.file_names())
    }

    /// Entries in Central Directory order.
    pub fn entries(&self) -> Result<&[CentralDirectoryEntry]> {
        Ok(&self.index()?.entries)
    }

    /// Fetch and decompress the first entry named `name`.
    pub async fn download_file(&self, name: &str) -> Result<Vec<u8>> {
        let index = Arc::clone(self.index()?);
        let entry = index
            .find(name)
            .ok_or_else(|| PartialZipError::FileNotFound(name.to_string()))?;
        if entry.is_encrypted() {
            return Err(PartialZipError::Unsupported {
                name: entry.file_name.clone(),
                reason: "encrypted entries are not supported",
            });
        }

        let header_offset = entry.lfh_offset;
        let header_end = header_offset.saturating_add(LocalFileHeader::SIZE as u64);
        if header_end > index.length {
            return Err(PartialZipError::invalid(
                "local file header",
                header_offset,
                "past the end of the archive",
            ));
        }
        let header_buf = self.source.get_range(header_offset, header_end - 1).await?;
        let header = LocalFileHeader::from_bytes(&header_buf, header_offset)?;
        trace!("{:?}", header);

        let start = header.data_offset(header_offset);
        let end = start
            .checked_add(entry.compressed_size)
            .filter(|&end| end <= index.length)
            .ok_or_else(|| {
                PartialZipError::invalid(
                    "local file header",
                    header_offset,
                    format!(
                        "{} bytes of data at {} run past the end of the archive",
                        entry.compressed_size, start
                    ),
                )
            })?;

        debug!("Downloading {} from bytes {}..{}", name, start, end);
        let data = if entry.compressed_size == 0 {
            Vec::new()
        } else {
            self.source.get_range(start, end - 1).await?
        };

        decompress(entry, header.compression_method, data)
    }
}

/// Probe, fetch the trailer records and the Central Directory, and decode them.
async fn discover<S: RangeSource + ?Sized>(source: &S) -> Result<ArchiveIndex> {
    if !source.probe_range_support().await? {
        return Err(PartialZipError::RangesNotSupported(
            source.location().to_string(),
        ));
    }

    let length = source.length().await?;
    let (eocd, eocd_offset) = read_eocd(source, length).await?;
    trace!("{:?} at {}", eocd, eocd_offset);

    let zip64 = if eocd.is_zip64() {
        read_zip64_eocd(source, &eocd, eocd_offset).await?
    } else {
        None
    };
    let (zip64_locator, zip64_eocd) = match zip64 {
        Some((locator, record)) => (Some(locator), Some(record)),
        None => (None, None),
    };

    let location = CentralDirectoryLocation::resolve(&eocd, zip64_eocd.as_ref());
    let cd_end = location
        .offset
        .checked_add(location.size)
        .filter(|&end| end <= eocd_offset)
        .ok_or_else(|| {
            PartialZipError::invalid(
                "central directory",
                location.offset,
                format!("{} bytes overrun the end of central directory", location.size),
            )
        })?;
    trace!(
        "{} entries in {} bytes at {}",
        location.entries, location.size, location.offset
    );

    let cd_data = if location.size == 0 {
        Vec::new()
    } else {
        source.get_range(location.offset, cd_end - 1).await?
    };
    let entries = parse_central_directory(&cd_data, location.offset, location.entries)?;

    Ok(ArchiveIndex {
        length,
        eocd,
        eocd_offset,
        zip64_locator,
        zip64_eocd,
        entry_count: location.entries,
        entries,
    })
}

/// Find the End of Central Directory record.
///
/// Try the last 22 bytes first; only archives with a comment need the
/// larger backwards search.
async fn read_eocd<S: RangeSource + ?Sized>(
    source: &S,
    length: u64,
) -> Result<(EndOfCentralDirectory, u64)> {
    let size = EndOfCentralDirectory::SIZE as u64;
    if length < size {
        return Err(PartialZipError::invalid(
            "end of central directory",
            0,
            format!("archive is only {} bytes", length),
        ));
    }

    let offset = length - size;
    let buf = source.get_range(offset, length - 1).await?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
        return Ok((EndOfCentralDirectory::from_bytes(&buf, offset)?, offset));
    }

    debug!("No EOCD in the last {} bytes; searching for an archive comment", size);
    let search_size = (MAX_COMMENT_SIZE + size).min(length);
    let search_start = length - search_size;
    let tail = source.get_range(search_start, length - 1).await?;
    find_eocd(&tail, search_start)
}

/// Read the ZIP64 locator right before the EOCD, then the record it points to.
///
/// Returns `None` when the EOCD only partly saturates its fields and no
/// locator is present, as in a plain archive with exactly 65535 entries.
async fn read_zip64_eocd<S: RangeSource + ?Sized>(
    source: &S,
    eocd: &EndOfCentralDirectory,
    eocd_offset: u64,
) -> Result<Option<(Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectory)>> {
    let locator_size = Zip64EndOfCentralDirectoryLocator::SIZE as u64;
    let locator_offset = match eocd_offset.checked_sub(locator_size) {
        Some(offset) => offset,
        None if !eocd.requires_zip64() => return Ok(None),
        None => {
            return Err(PartialZipError::invalid(
                "zip64 end of central directory locator",
                0,
                "no room before the end of central directory",
            ));
        }
    };
    let buf = source.get_range(locator_offset, eocd_offset - 1).await?;
    if !buf.starts_with(Zip64EndOfCentralDirectoryLocator::SIGNATURE) && !eocd.requires_zip64() {
        debug!(
            "No zip64 locator before the EOCD at {}; using its 32-bit fields",
            eocd_offset
        );
        return Ok(None);
    }
    let locator = Zip64EndOfCentralDirectoryLocator::from_bytes(&buf, locator_offset)?;
    trace!("{:?}", locator);

    let record_offset = locator.eocd64_offset;
    let record_end = record_offset
        .checked_add(Zip64EndOfCentralDirectory::MIN_SIZE as u64)
        .filter(|&end| end <= locator_offset)
        .ok_or_else(|| {
            PartialZipError::invalid(
                "zip64 end of central directory",
                record_offset,
                "record overlaps its locator",
            )
        })?;
    let buf = source.get_range(record_offset, record_end - 1).await?;
    let record = Zip64EndOfCentralDirectory::from_bytes(&buf, record_offset)?;
    trace!("{:?}", record);

    Ok(Some((locator, record)))
}
