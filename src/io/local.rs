use super::RangeSource;
use crate::error::{PartialZipError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Local file source with random access support
pub struct LocalFileSource {
    file: std::fs::File,
    path: String,
    size: u64,
}

impl LocalFileSource {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.display().to_string(),
            size,
        })
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut filled = 0;
            while filled < buf.len() {
                let n = self.file.seek_read(&mut buf[filled..], offset + filled as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                filled += n;
            }
            Ok(())
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (buf, offset);
            Err(std::io::ErrorKind::Unsupported.into())
        }
    }
}

#[async_trait]
impl RangeSource for LocalFileSource {
    fn location(&self) -> &str {
        &self.path
    }

    async fn probe_range_support(&self) -> Result<bool> {
        Ok(true)
    }

    async fn length(&self) -> Result<u64> {
        Ok(self.size)
    }

    async fn get_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start || end >= self.size {
            return Err(PartialZipError::UnexpectedResponse {
                start,
                end,
                detail: format!("outside of file of {} bytes", self.size),
            });
        }

        let mut buf = vec![0u8; (end - start + 1) as usize];
        self.read_exact_at(&mut buf, start)?;
        Ok(buf)
    }
}
