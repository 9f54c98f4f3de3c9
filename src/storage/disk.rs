//! Disk access for heapdb
//!
//! A `DiskFile` is a flat sequence of `PAGE_SIZE` blocks on disk. Page `i`
//! lives at byte offset `i * PAGE_SIZE`. Nothing else is stored in the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::page::PAGE_SIZE;
use crate::error::{Error, Result};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u64);

/// Identity of a cached page: which file and which page within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub file_id: FileId,
    pub page: usize,
}

/// Page-granular file handle
#[derive(Debug)]
pub struct DiskFile {
    id: FileId,
    path: PathBuf,
    file: Mutex<File>,
}

impl DiskFile {
    /// Open `path`, creating an empty file when it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let id = FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed));
        debug!(file = ?id, path = %path.display(), "opened heap file");

        Ok(Self {
            id,
            path,
            file: Mutex::new(file),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole pages in the file
    pub fn page_count(&self) -> Result<usize> {
        let file = self.file.lock();
        Ok((file.metadata()?.len() / PAGE_SIZE as u64) as usize)
    }

    /// Read page `index` into a fresh buffer
    pub fn read_page(&self, index: usize) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let offset = (index * PAGE_SIZE) as u64;
        if offset + PAGE_SIZE as u64 > len {
            return Err(Error::IllegalOperation(format!(
                "page {} is past the end of {}",
                index,
                self.path.display()
            )));
        }

        let mut data = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;
        Ok(data)
    }

    /// Overwrite page `index` in place
    pub fn write_page(&self, index: usize, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::MalformedData(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start((index * PAGE_SIZE) as u64))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Append a page to the end of the file and return its index
    pub fn append_page(&self, data: &[u8]) -> Result<usize> {
        if data.len() != PAGE_SIZE {
            return Err(Error::MalformedData(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }

        let mut file = self.file.lock();
        let index = (file.metadata()?.len() / PAGE_SIZE as u64) as usize;
        file.seek(SeekFrom::Start((index * PAGE_SIZE) as u64))?;
        file.write_all(data)?;
        file.flush()?;

        debug!(file = ?self.id, page = index, "appended page");
        Ok(index)
    }
}
