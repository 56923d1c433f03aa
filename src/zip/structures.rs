use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{PartialZipError, Result};

/// Value of a 32-bit size/offset field whose real value lives in a ZIP64 record.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;
/// Value of a 16-bit count/disk field whose real value lives in a ZIP64 record.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;
/// Header ID of the ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

fn check_record(
    structure: &'static str,
    data: &[u8],
    signature: &[u8],
    size: usize,
    offset: u64,
) -> Result<()> {
    if data.len() < size {
        return Err(PartialZipError::invalid(
            structure,
            offset,
            format!("need {} bytes, have {}", size, data.len()),
        ));
    }
    if &data[0..4] != signature {
        return Err(PartialZipError::invalid(structure, offset, "bad signature"));
    }
    Ok(())
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;
    const NAME: &'static str = "end of central directory";

    /// Decode the record at the start of `data`, which sits at `offset` in the archive.
    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        check_record(Self::NAME, data, Self::SIGNATURE, Self::SIZE, offset)?;
        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Whether the real count/size/offset live in the ZIP64 records.
    ///
    /// Writers saturate only the fields that overflow, so any sentinel counts.
    /// The session still falls back to the 32-bit values when no locator
    /// precedes the record, unless [`requires_zip64`](Self::requires_zip64).
    pub fn is_zip64(&self) -> bool {
        self.total_entries == ZIP64_SENTINEL_U16
            || self.cd_size == ZIP64_SENTINEL_U32
            || self.cd_offset == ZIP64_SENTINEL_U32
    }

    /// Every count, size and offset field is a sentinel, so the 32-bit
    /// values cannot describe the archive on their own.
    pub fn requires_zip64(&self) -> bool {
        self.total_entries == ZIP64_SENTINEL_U16
            && self.cd_size == ZIP64_SENTINEL_U32
            && self.cd_offset == ZIP64_SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;
    const NAME: &'static str = "zip64 end of central directory locator";

    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        check_record(Self::NAME, data, Self::SIGNATURE, Self::SIZE, offset)?;
        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;
    const NAME: &'static str = "zip64 end of central directory";

    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        check_record(Self::NAME, data, Self::SIGNATURE, Self::MIN_SIZE, offset)?;
        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// One Central Directory File Header, with any ZIP64 overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number: u32,
    pub lfh_offset: u64,
    pub is_directory: bool,
}

impl CentralDirectoryEntry {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const MIN_SIZE: usize = 46;
    const NAME: &'static str = "central directory entry";

    /// Decode one entry and advance `cursor` past its name, extra field and comment.
    ///
    /// `base` is the absolute archive offset of the buffer behind `cursor`.
    pub fn parse(cursor: &mut Cursor<&[u8]>, base: u64) -> Result<Self> {
        let start = cursor.position() as usize;
        let offset = base + start as u64;
        let buf: &[u8] = *cursor.get_ref();
        let data = &buf[start..];
        check_record(Self::NAME, data, Self::SIGNATURE, Self::MIN_SIZE, offset)?;

        let mut fixed = Cursor::new(&data[4..Self::MIN_SIZE]);
        let _version_made_by = fixed.read_u16::<LittleEndian>()?;
        let _version_needed = fixed.read_u16::<LittleEndian>()?;
        let flags = fixed.read_u16::<LittleEndian>()?;
        let compression_method = fixed.read_u16::<LittleEndian>()?;
        let last_mod_time = fixed.read_u16::<LittleEndian>()?;
        let last_mod_date = fixed.read_u16::<LittleEndian>()?;
        let crc32 = fixed.read_u32::<LittleEndian>()?;
        let compressed_size = fixed.read_u32::<LittleEndian>()?;
        let uncompressed_size = fixed.read_u32::<LittleEndian>()?;
        let file_name_length = fixed.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = fixed.read_u16::<LittleEndian>()? as usize;
        let file_comment_length = fixed.read_u16::<LittleEndian>()? as usize;
        let disk_number = fixed.read_u16::<LittleEndian>()?;
        let _internal_attrs = fixed.read_u16::<LittleEndian>()?;
        let _external_attrs = fixed.read_u32::<LittleEndian>()?;
        let lfh_offset = fixed.read_u32::<LittleEndian>()?;

        let total = Self::MIN_SIZE + file_name_length + extra_field_length + file_comment_length;
        if data.len() < total {
            return Err(PartialZipError::invalid(
                Self::NAME,
                offset,
                format!("variable fields need {} bytes, have {}", total, data.len()),
            ));
        }

        let name_end = Self::MIN_SIZE + file_name_length;
        let file_name = String::from_utf8_lossy(&data[Self::MIN_SIZE..name_end]).into_owned();
        let extra = &data[name_end..name_end + extra_field_length];

        let mut entry = Self {
            is_directory: file_name.ends_with('/'),
            file_name,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            disk_number: disk_number as u32,
            lfh_offset: lfh_offset as u64,
        };
        entry
            .apply_zip64_extra(
                extra,
                uncompressed_size == ZIP64_SENTINEL_U32,
                compressed_size == ZIP64_SENTINEL_U32,
                lfh_offset == ZIP64_SENTINEL_U32,
                disk_number == ZIP64_SENTINEL_U16,
            )
            .map_err(|reason| PartialZipError::invalid(Self::NAME, offset, reason))?;

        cursor.set_position((start + total) as u64);
        Ok(entry)
    }

    /// Replace flagged fields with the ZIP64 extra's values.
    ///
    /// Slots appear only for flagged fields, always in the order uncompressed
    /// size, compressed size, local header offset, disk number.
    fn apply_zip64_extra(
        &mut self,
        extra: &[u8],
        uncompressed: bool,
        compressed: bool,
        lfh_offset: bool,
        disk: bool,
    ) -> std::result::Result<(), String> {
        if !(uncompressed || compressed || lfh_offset || disk) {
            return Ok(());
        }

        let mut block = None;
        let mut fields = Cursor::new(extra);
        while extra.len() - fields.position() as usize >= 4 {
            let header_id = fields.read_u16::<LittleEndian>().map_err(|e| e.to_string())?;
            let size = fields.read_u16::<LittleEndian>().map_err(|e| e.to_string())? as usize;
            let start = fields.position() as usize;
            let end = (start + size).min(extra.len());
            if header_id == ZIP64_EXTRA_ID {
                block = Some(&extra[start..end]);
                break;
            }
            fields.set_position(end as u64);
        }
        let block = block.ok_or_else(|| format!("{}: missing zip64 extra field", self.file_name))?;

        let name = &self.file_name;
        let mut slots = Cursor::new(block);
        let mut take = |width: usize, field: &str| {
            slots
                .read_uint::<LittleEndian>(width)
                .map_err(|_| format!("{}: zip64 extra field lacks {}", name, field))
        };
        let mut next = |flagged: bool, width: usize, field: &str| {
            if flagged {
                take(width, field).map(Some)
            } else {
                Ok(None)
            }
        };
        let uncompressed_size = next(uncompressed, 8, "uncompressed size")?;
        let compressed_size = next(compressed, 8, "compressed size")?;
        let header_offset = next(lfh_offset, 8, "local header offset")?;
        let disk_number = next(disk, 4, "disk number")?;

        if let Some(v) = uncompressed_size {
            self.uncompressed_size = v;
        }
        if let Some(v) = compressed_size {
            self.compressed_size = v;
        }
        if let Some(v) = header_offset {
            self.lfh_offset = v;
        }
        if let Some(v) = disk_number {
            self.disk_number = v as u32;
        }
        Ok(())
    }

    /// Bit 0 of the general purpose flags
    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x0001 != 0
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Local File Header (LFH) - 30 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub flags: u16,
    pub compression_method: u16,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;
    const NAME: &'static str = "local file header";

    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self> {
        check_record(Self::NAME, data, Self::SIGNATURE, Self::SIZE, offset)?;
        let mut cursor = Cursor::new(&data[6..]);
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;

        // Skip time, date, crc and both sizes to reach the length fields
        cursor.set_position(26 - 6);
        Ok(Self {
            flags,
            compression_method,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Where the entry's compressed data begins, given where this header begins.
    pub fn data_offset(&self, header_offset: u64) -> u64 {
        header_offset
            + Self::SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
    }
}
