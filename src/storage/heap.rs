//! Heap file storage for heapdb
//!
//! A heap file is an unordered sequence of heap pages, all rows sharing one
//! schema. Page access goes through the buffer pool so that it is locked on
//! behalf of a transaction; the file itself only knows how to read and write
//! page images.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::buffer_pool::BufferPool;
use super::disk::{DiskFile, FileId, PageKey};
use super::page::{HeapPage, PageRef, PAGE_SIZE};
use super::tuple::Tuple;
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::executor::{Operator, TupleIter};
use crate::transaction::{LockMode, TransactionId};

/// Location of a stored row: file, page index, slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub file_id: FileId,
    pub page: usize,
    pub slot: usize,
}

/// Heap file for storing tuples
#[derive(Debug)]
pub struct HeapFile {
    disk: Arc<DiskFile>,
    schema: Arc<Schema>,
    pool: Arc<BufferPool>,
}

impl HeapFile {
    /// Open the heap file at `path`, creating it empty if it does not exist
    pub fn open(path: impl AsRef<Path>, schema: Arc<Schema>, pool: Arc<BufferPool>) -> Result<Self> {
        let disk = Arc::new(DiskFile::open(path)?);
        Ok(Self { disk, schema, pool })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn disk(&self) -> &Arc<DiskFile> {
        &self.disk
    }

    pub fn file_id(&self) -> FileId {
        self.disk.id()
    }

    /// Number of pages, derived from the file length
    pub fn page_count(&self) -> Result<usize> {
        self.disk.page_count()
    }

    /// Cache key of page `index`, unique across open files
    pub fn page_key(&self, index: usize) -> PageKey {
        PageKey {
            file_id: self.disk.id(),
            page: index,
        }
    }

    /// Decode page `index` straight from disk, bypassing the pool
    pub fn read_page(&self, index: usize) -> Result<HeapPage> {
        HeapPage::load(Arc::clone(&self.schema), index, Arc::clone(&self.disk))
    }

    /// Overwrite a page of this file with `page`'s image
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        if page.file().id() != self.disk.id() {
            return Err(Error::IllegalOperation(format!(
                "page {} belongs to another file",
                page.index()
            )));
        }
        page.flush()
    }

    /// Store `tuple` in the first page with a free slot, appending a page if
    /// every existing one is full
    pub fn insert_row(&self, tuple: Tuple, tid: TransactionId) -> Result<RecordId> {
        tuple.conforms_to(&self.schema)?;

        for index in 0..self.page_count()? {
            let page = self.pool.get_page(self, index, tid, LockMode::Read)?;
            let has_room = page.lock().has_free_slot();
            if has_room {
                let page = self.pool.get_page(self, index, tid, LockMode::Write)?;
                return Self::insert_into(&page, tuple, tid);
            }
        }

        let index = self.disk.append_page(&[0u8; PAGE_SIZE])?;
        debug!(file = ?self.disk.id(), page = index, %tid, "heap file grew");
        let page = self.pool.get_page(self, index, tid, LockMode::Write)?;
        Self::insert_into(&page, tuple, tid)
    }

    fn insert_into(page: &PageRef, tuple: Tuple, tid: TransactionId) -> Result<RecordId> {
        let mut page = page.lock();
        let slot = page.insert(tuple)?;
        page.set_dirty(tid, true);
        Ok(RecordId {
            file_id: page.file().id(),
            page: page.index(),
            slot,
        })
    }

    /// Remove the row `tuple`'s locator points at
    pub fn delete_row(&self, tuple: &Tuple, tid: TransactionId) -> Result<()> {
        let rid = tuple
            .rid()
            .ok_or_else(|| Error::TupleNotFound(format!("row {} was never stored", tuple)))?;
        if rid.file_id != self.disk.id() {
            return Err(Error::TupleNotFound(format!(
                "row {} belongs to another file",
                tuple
            )));
        }
        if rid.page >= self.page_count()? {
            return Err(Error::TupleNotFound(format!(
                "page {} does not exist",
                rid.page
            )));
        }

        let page = self.pool.get_page(self, rid.page, tid, LockMode::Write)?;
        let mut page = page.lock();
        page.delete(rid.slot)?;
        page.set_dirty(tid, true);
        Ok(())
    }
}

/// Page-at-a-time scan; each page's rows are copied out under its read lock
struct HeapScan<'a> {
    heap: &'a HeapFile,
    tid: TransactionId,
    next_page: usize,
    page_count: usize,
    rows: std::vec::IntoIter<Tuple>,
    failed: bool,
}

impl Iterator for HeapScan<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(row) = self.rows.next() {
                return Some(Ok(row));
            }
            if self.next_page >= self.page_count {
                return None;
            }

            let index = self.next_page;
            self.next_page += 1;
            match self.heap.pool.get_page(self.heap, index, self.tid, LockMode::Read) {
                Ok(page) => {
                    let rows: Vec<Tuple> = page.lock().rows().cloned().collect();
                    self.rows = rows.into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Operator for HeapFile {
    fn descriptor(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(HeapScan {
            heap: self,
            tid,
            next_page: 0,
            page_count: self.page_count()?,
            rows: Vec::new().into_iter(),
            failed: false,
        }))
    }
}
