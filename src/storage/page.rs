//! Page management for heapdb
//!
//! A heap page is a fixed-size block holding rows of a single schema in
//! fixed-width slots. The on-disk image is a bitmap of occupied slots
//! followed by the slot array:
//!
//! ```text
//! +----------------------+--------+--------+-----+--------+---------+
//! | bitmap (ceil(n/8) B) | slot 0 | slot 1 | ... | slot n | padding |
//! +----------------------+--------+--------+-----+--------+---------+
//! ```
//!
//! Bit `i % 8` of bitmap byte `i / 8` is set when slot `i` holds a row.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use super::disk::{DiskFile, PageKey};
use super::heap::RecordId;
use super::tuple::Tuple;
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::transaction::TransactionId;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Shared handle to a cached page
pub type PageRef = Arc<Mutex<HeapPage>>;

/// Number of slots a page holds for rows `row_width` bytes wide
///
/// Each slot costs its width plus one bitmap bit.
pub fn slots_per_page(row_width: usize) -> usize {
    if row_width == 0 {
        return 0;
    }
    (PAGE_SIZE * 8) / (row_width * 8 + 1)
}

/// Bytes taken by the occupancy bitmap for `slots` slots
fn bitmap_len(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// A decoded heap page
#[derive(Debug, Clone)]
pub struct HeapPage {
    schema: Arc<Schema>,
    file: Arc<DiskFile>,
    index: usize,
    /// Slot contents; `None` marks a free slot
    slots: Vec<Option<Tuple>>,
    /// Transaction that last dirtied this page, if it is dirty
    dirty: Option<TransactionId>,
}

impl HeapPage {
    /// Create an empty page for page `index` of `file`
    pub fn new(schema: Arc<Schema>, index: usize, file: Arc<DiskFile>) -> Self {
        let slots = slots_per_page(schema.row_width());
        Self {
            schema,
            file,
            index,
            slots: vec![None; slots],
            dirty: None,
        }
    }

    /// Read page `index` of `file` from disk
    pub fn load(schema: Arc<Schema>, index: usize, file: Arc<DiskFile>) -> Result<Self> {
        let data = file.read_page(index)?;
        Self::decode(schema, index, file, &data)
    }

    /// Decode a page image produced by `encode`
    pub fn decode(
        schema: Arc<Schema>,
        index: usize,
        file: Arc<DiskFile>,
        data: &[u8],
    ) -> Result<Self> {
        if data.len() != PAGE_SIZE {
            return Err(Error::MalformedData(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                PAGE_SIZE
            )));
        }

        let width = schema.row_width();
        let num_slots = slots_per_page(width);
        let header = bitmap_len(num_slots);
        let (bitmap, body) = data.split_at(header);

        // Bits past the last slot must be clear
        if num_slots % 8 != 0 {
            if let Some(&last) = bitmap.last() {
                if last >> (num_slots % 8) != 0 {
                    return Err(Error::MalformedData(format!(
                        "page {} marks slots beyond its capacity of {}",
                        index, num_slots
                    )));
                }
            }
        }

        let file_id = file.id();
        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if bitmap[slot / 8] & (1 << (slot % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let mut raw = &body[slot * width..(slot + 1) * width];
            let rid = RecordId {
                file_id,
                page: index,
                slot,
            };
            slots.push(Some(Tuple::read_from(&mut raw, &schema)?.with_rid(rid)));
        }

        Ok(Self {
            schema,
            file,
            index,
            slots,
            dirty: None,
        })
    }

    /// Encode to a `PAGE_SIZE` image
    pub fn encode(&self) -> Result<Bytes> {
        let width = self.schema.row_width();
        let mut bitmap = vec![0u8; bitmap_len(self.slots.len())];
        for (slot, row) in self.slots.iter().enumerate() {
            if row.is_some() {
                bitmap[slot / 8] |= 1 << (slot % 8);
            }
        }

        let mut buf = BytesMut::with_capacity(PAGE_SIZE).writer();
        std::io::Write::write_all(&mut buf, &bitmap)?;
        for row in &self.slots {
            match row {
                Some(tuple) => tuple.write_to(&mut buf)?,
                None => std::io::Write::write_all(&mut buf, &vec![0u8; width])?,
            }
        }

        let mut buf = buf.into_inner();
        buf.resize(PAGE_SIZE, 0);
        Ok(buf.freeze())
    }

    /// Write this page's image back to its own index in its file
    pub fn flush(&self) -> Result<()> {
        self.file.write_page(self.index, &self.encode()?)
    }

    /// Put `tuple` in the first free slot and return the slot index
    ///
    /// Does not mark the page dirty.
    pub fn insert(&mut self, tuple: Tuple) -> Result<usize> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::PageFull(self.index))?;

        let rid = RecordId {
            file_id: self.file.id(),
            page: self.index,
            slot,
        };
        let tuple = tuple.with_schema(Arc::clone(&self.schema))?.with_rid(rid);
        self.slots[slot] = Some(tuple);
        Ok(slot)
    }

    /// Free `slot`
    ///
    /// Does not mark the page dirty.
    pub fn delete(&mut self, slot: usize) -> Result<()> {
        match self.slots.get_mut(slot) {
            Some(row @ Some(_)) => {
                *row = None;
                Ok(())
            }
            _ => Err(Error::TupleNotFound(format!(
                "slot {} of page {} is empty",
                slot, self.index
            ))),
        }
    }

    /// Live rows in slot order, each carrying its locator
    pub fn rows(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> PageKey {
        PageKey {
            file_id: self.file.id(),
            page: self.index,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn file(&self) -> &Arc<DiskFile> {
        &self.file
    }

    /// Mark dirty on behalf of `tid`, or clean
    pub fn set_dirty(&mut self, tid: TransactionId, dirty: bool) {
        self.dirty = dirty.then_some(tid);
    }

    /// Check if page is dirty
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Transaction that dirtied the page
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty
    }
}
