//! Hand-assembled archives for tests.

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use super::structures::*;

struct Entry {
    name: String,
    payload: Vec<u8>,
    method: u16,
    flags: u16,
    crc32: u32,
    uncompressed_size: u64,
}

#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<Entry>,
    comment: Vec<u8>,
    zip64: bool,
}

fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry whose payload is written as-is under `method`.
    pub fn raw(mut self, name: &str, payload: Vec<u8>, method: u16, original: &[u8]) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            payload,
            method,
            flags: 0,
            crc32: crc32fast::hash(original),
            uncompressed_size: original.len() as u64,
        });
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.raw(name, data.to_vec(), 0, data)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.raw(name, deflate(data), 8, data)
    }

    /// Override the general purpose flags of the last entry.
    pub fn flags(mut self, flags: u16) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.flags = flags;
        }
        self
    }

    /// Override the recorded CRC-32 of the last entry.
    pub fn crc32(mut self, crc32: u32) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.crc32 = crc32;
        }
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write every size, offset and count through the ZIP64 records,
    /// leaving sentinels in all 32-bit fields.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(out.len() as u64);
            out.extend_from_slice(LocalFileHeader::SIGNATURE);
            put16(&mut out, if self.zip64 { 45 } else { 20 });
            put16(&mut out, entry.flags);
            put16(&mut out, entry.method);
            put16(&mut out, 0);
            put16(&mut out, 0x21);
            put32(&mut out, entry.crc32);
            if self.zip64 {
                put32(&mut out, u32::MAX);
                put32(&mut out, u32::MAX);
            } else {
                put32(&mut out, entry.payload.len() as u32);
                put32(&mut out, entry.uncompressed_size as u32);
            }
            put16(&mut out, entry.name.len() as u16);
            put16(&mut out, if self.zip64 { 20 } else { 0 });
            out.extend_from_slice(entry.name.as_bytes());
            if self.zip64 {
                put16(&mut out, ZIP64_EXTRA_ID);
                put16(&mut out, 16);
                put64(&mut out, entry.uncompressed_size);
                put64(&mut out, entry.payload.len() as u64);
            }
            out.extend_from_slice(&entry.payload);
        }

        let cd_offset = out.len() as u64;
        for (entry, &offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(CentralDirectoryEntry::SIGNATURE);
            put16(&mut out, 45);
            put16(&mut out, if self.zip64 { 45 } else { 20 });
            put16(&mut out, entry.flags);
            put16(&mut out, entry.method);
            put16(&mut out, 0);
            put16(&mut out, 0x21);
            put32(&mut out, entry.crc32);
            if self.zip64 {
                put32(&mut out, u32::MAX);
                put32(&mut out, u32::MAX);
            } else {
                put32(&mut out, entry.payload.len() as u32);
                put32(&mut out, entry.uncompressed_size as u32);
            }
            put16(&mut out, entry.name.len() as u16);
            put16(&mut out, if self.zip64 { 28 } else { 0 });
            put16(&mut out, 0);
            put16(&mut out, 0);
            put16(&mut out, 0);
            put32(&mut out, 0);
            put32(&mut out, if self.zip64 { u32::MAX } else { offset as u32 });
            out.extend_from_slice(entry.name.as_bytes());
            if self.zip64 {
                put16(&mut out, ZIP64_EXTRA_ID);
                put16(&mut out, 24);
                put64(&mut out, entry.uncompressed_size);
                put64(&mut out, entry.payload.len() as u64);
                put64(&mut out, offset);
            }
        }
        let cd_size = out.len() as u64 - cd_offset;
        let count = self.entries.len() as u64;

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(Zip64EndOfCentralDirectory::SIGNATURE);
            put64(&mut out, 44);
            put16(&mut out, 45);
            put16(&mut out, 45);
            put32(&mut out, 0);
            put32(&mut out, 0);
            put64(&mut out, count);
            put64(&mut out, count);
            put64(&mut out, cd_size);
            put64(&mut out, cd_offset);

            out.extend_from_slice(Zip64EndOfCentralDirectoryLocator::SIGNATURE);
            put32(&mut out, 0);
            put64(&mut out, eocd64_offset);
            put32(&mut out, 1);
        }

        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        put16(&mut out, 0);
        put16(&mut out, 0);
        if self.zip64 {
            put16(&mut out, u16::MAX);
            put16(&mut out, u16::MAX);
            put32(&mut out, u32::MAX);
            put32(&mut out, u32::MAX);
        } else {
            put16(&mut out, count as u16);
            put16(&mut out, count as u16);
            put32(&mut out, cd_size as u32);
            put32(&mut out, cd_offset as u32);
        }
        put16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);
        out
    }
}
