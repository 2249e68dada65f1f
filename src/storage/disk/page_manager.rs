use crate::storage::page::PageId;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

/// Page-granular access to a single flat data file.
///
/// Every read and write goes straight to the file; there is no page cache.
/// All physical I/O on one instance is serialized under a single exclusive
/// lock around the file handle, so callers get no parallel throughput.
pub struct PageManager {
    path: PathBuf,
    file: Mutex<File>,
    sync_on_write: bool,
}

impl PageManager {
    /// Create a fresh data file, truncating any existing one.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            sync_on_write: true,
        })
    }

    /// Open the data file, creating it if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_options(path, true)
    }

    pub fn open_with_options(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open file: {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            sync_on_write,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one page into `buf`.
    ///
    /// A page at or beyond the end of the file reads as zeroes, and a short
    /// physical read zero-fills the remainder. Both are logged as warnings
    /// and are not errors: allocated-but-unwritten pages must read as empty.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            bail!(
                "Buffer size must be PAGE_SIZE ({}), got {}",
                PAGE_SIZE,
                buf.len()
            );
        }

        let offset = Self::page_offset(page_id)?;
        let mut file = self.file.lock();
        let file_size = file.metadata()?.len();

        if offset >= file_size {
            warn!(
                "read of page {} past end of file ({} bytes), returning zeroed page",
                page_id.0, file_size
            );
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))
            .context("Failed to seek")?;

        let mut read = 0;
        while read < PAGE_SIZE {
            match file.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read page"),
            }
        }

        if read < PAGE_SIZE {
            warn!(
                "short read of page {}: got {} of {} bytes, zero-filling the rest",
                page_id.0, read, PAGE_SIZE
            );
            buf[read..].fill(0);
        }

        Ok(())
    }

    /// Write one full page and sync it to stable storage before returning.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            bail!(
                "Data size must be PAGE_SIZE ({}), got {}",
                PAGE_SIZE,
                data.len()
            );
        }

        let offset = Self::page_offset(page_id)?;
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(offset))
            .context("Failed to seek")?;
        file.write_all(data).context("Failed to write page")?;
        if self.sync_on_write {
            file.sync_all().context("Failed to sync")?;
        }

        Ok(())
    }

    pub fn num_pages(&self) -> Result<u32> {
        let file_size = self.file.lock().metadata()?.len();
        Ok(file_size.div_ceil(PAGE_SIZE as u64) as u32)
    }

    /// Reserve a new page at the end of the file.
    ///
    /// The file is extended immediately so two allocations never hand out
    /// the same id, even if the first page has not been written yet.
    pub fn allocate_page(&self) -> Result<PageId> {
        let file = self.file.lock();
        let current_pages = file.metadata()?.len().div_ceil(PAGE_SIZE as u64);
        if current_pages >= i32::MAX as u64 {
            bail!("Data file is full: {} pages", current_pages);
        }
        let new_page_id = PageId(current_pages as i32);

        let new_size = (current_pages + 1) * PAGE_SIZE as u64;
        file.set_len(new_size)
            .context("Failed to extend file")?;
        debug!("allocated page {}", new_page_id.0);

        Ok(new_page_id)
    }

    /// Byte length of the file at `path`, or `None` when it cannot be determined.
    pub fn file_size(path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    fn page_offset(page_id: PageId) -> Result<u64> {
        if !page_id.is_valid() {
            bail!("Invalid page id: {}", page_id.0);
        }
        Ok(page_id.0 as u64 * PAGE_SIZE as u64)
    }
}
