//! Buffer pool for heapdb
//!
//! A fixed-capacity cache of heap pages shared by all transactions. Every
//! page access goes through `get_page`, which takes a page lock on behalf of
//! the calling transaction before handing out the page.
//!
//! Durability follows force/no-steal: a dirty page stays cached until its
//! transaction commits (written back) or aborts (reloaded from disk), and is
//! never chosen for eviction.
//!
//! Lock order is pool state first, then a page mutex. Callers must not hold
//! a page mutex while calling into the pool.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::disk::PageKey;
use super::heap::HeapFile;
use super::page::{HeapPage, PageRef};
use crate::error::{Error, Result};
use crate::transaction::{Acquire, LockMode, LockTable, TransactionId};

/// Cached page with its recency stamp
#[derive(Debug)]
struct Frame {
    page: PageRef,
    last_used: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    frames: HashMap<PageKey, Frame>,
    locks: LockTable,
    /// Logical clock for LRU ordering
    clock: u64,
}

impl PoolState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Transaction-aware page cache
#[derive(Debug)]
pub struct BufferPool {
    capacity: usize,
    state: Mutex<PoolState>,
    /// Signalled whenever locks are released
    released: Condvar,
}

impl BufferPool {
    /// Create a pool caching at most `capacity` pages
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached
    pub fn cached_pages(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_cached(&self, key: &PageKey) -> bool {
        self.state.lock().frames.contains_key(key)
    }

    /// Transactions that have begun and not yet committed or aborted
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.state.lock().locks.active()
    }

    /// Start a transaction
    pub fn begin_transaction(&self) -> TransactionId {
        let tid = TransactionId::next();
        self.state.lock().locks.begin(tid);
        debug!(%tid, "begin transaction");
        tid
    }

    /// Get page `index` of `file` for `tid`, locked in `mode`
    ///
    /// Blocks while another transaction holds an incompatible lock. If waiting
    /// would close a cycle in the wait-for graph, `tid` is aborted and
    /// `Error::Deadlock` returned.
    pub fn get_page(
        &self,
        file: &HeapFile,
        index: usize,
        tid: TransactionId,
        mode: LockMode,
    ) -> Result<PageRef> {
        let page_count = file.page_count()?;
        if index >= page_count {
            return Err(Error::IllegalOperation(format!(
                "page {} is past the end of a {} page file",
                index, page_count
            )));
        }

        let key = file.page_key(index);
        let mut state = self.state.lock();

        loop {
            if !state.locks.is_active(tid) {
                return Err(Error::IllegalTransaction(tid.as_u64()));
            }

            match state.locks.acquire(key, tid, mode) {
                Acquire::Granted => {
                    state.locks.stop_waiting(tid);
                    break;
                }
                Acquire::Blocked(holders) => {
                    state.locks.wait_on(tid, holders);
                    if state.locks.would_deadlock(tid) {
                        warn!(%tid, page = key.page, "deadlock detected, aborting");
                        if let Err(e) = self.abort_locked(&mut state, tid) {
                            warn!(%tid, error = %e, "abort after deadlock failed");
                        }
                        return Err(Error::Deadlock(tid.as_u64()));
                    }
                    self.released.wait(&mut state);
                }
            }
        }

        let now = state.tick();
        if let Some(frame) = state.frames.get_mut(&key) {
            frame.last_used = now;
            return Ok(Arc::clone(&frame.page));
        }

        if state.frames.len() >= self.capacity {
            self.evict(&mut state, tid)?;
        }

        let page: PageRef = Arc::new(Mutex::new(file.read_page(index)?));
        state.frames.insert(
            key,
            Frame {
                page: Arc::clone(&page),
                last_used: now,
            },
        );
        debug!(file = ?key.file_id, page = index, "loaded page");
        Ok(page)
    }

    /// Drop the least recently used page that is clean and not locked by
    /// anyone but `tid`
    fn evict(&self, state: &mut PoolState, tid: TransactionId) -> Result<()> {
        let victim = state
            .frames
            .iter()
            .filter(|(key, frame)| {
                !state.locks.locked_by_other(key, tid) && !frame.page.lock().is_dirty()
            })
            .min_by_key(|(_, frame)| frame.last_used)
            .map(|(key, _)| *key);

        match victim {
            Some(key) => {
                state.frames.remove(&key);
                debug!(file = ?key.file_id, page = key.page, "evicted page");
                Ok(())
            }
            None => Err(Error::BufferPoolFull(self.capacity)),
        }
    }

    /// Write back every page `tid` dirtied, then release its locks
    pub fn commit_transaction(&self, tid: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.locks.is_active(tid) {
            return Err(Error::IllegalTransaction(tid.as_u64()));
        }

        for key in state.locks.exclusive_pages(tid) {
            if let Some(frame) = state.frames.get(&key) {
                let mut page = frame.page.lock();
                if page.dirtied_by() == Some(tid) {
                    page.flush()?;
                    page.set_dirty(tid, false);
                }
            }
        }

        state.locks.release_all(tid);
        self.released.notify_all();
        debug!(%tid, "commit transaction");
        Ok(())
    }

    /// Undo `tid`'s changes by reloading its dirty pages, then release its
    /// locks
    ///
    /// Aborting a transaction that is not active does nothing.
    pub fn abort_transaction(&self, tid: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        self.abort_locked(&mut state, tid)
    }

    fn abort_locked(&self, state: &mut PoolState, tid: TransactionId) -> Result<()> {
        if !state.locks.is_active(tid) {
            return Ok(());
        }

        let mut outcome = Ok(());
        for key in state.locks.exclusive_pages(tid) {
            let Some(frame) = state.frames.get(&key) else {
                continue;
            };
            let failed = {
                let mut page = frame.page.lock();
                if page.dirtied_by() != Some(tid) {
                    continue;
                }
                let reloaded = HeapPage::load(
                    Arc::clone(page.schema()),
                    page.index(),
                    Arc::clone(page.file()),
                );
                match reloaded {
                    Ok(fresh) => {
                        *page = fresh;
                        None
                    }
                    Err(e) => Some(e),
                }
            };
            if let Some(e) = failed {
                // An unreadable page must not stay cached with uncommitted rows
                state.frames.remove(&key);
                outcome = Err(e);
            }
        }

        state.locks.release_all(tid);
        self.released.notify_all();
        debug!(%tid, "abort transaction");
        outcome
    }

    /// Write every dirty page to disk regardless of transaction state
    ///
    /// Breaks no-steal if used while transactions are running; meant for
    /// checkpoints and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for frame in state.frames.values() {
            let mut page = frame.page.lock();
            if let Some(tid) = page.dirtied_by() {
                page.flush()?;
                page.set_dirty(tid, false);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::tuple::{Tuple, Value};
    use tempfile::{tempdir, TempDir};

    fn people() -> Arc<Schema> {
        Arc::new(Schema::from_columns(vec![
            Column::new("name", DataType::String),
            Column::new("age", DataType::Integer),
        ]))
    }

    fn setup(capacity: usize) -> (TempDir, Arc<BufferPool>, HeapFile) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(capacity));
        let heap = HeapFile::open(dir.path().join("t.dat"), people(), Arc::clone(&pool)).unwrap();
        (dir, pool, heap)
    }

    fn person(name: &str, age: i64) -> Tuple {
        Tuple::new(people(), vec![name.into(), Value::Integer(age)])
    }

    #[test]
    fn test_unknown_transaction() {
        let (_dir, pool, heap) = setup(2);
        let tid = pool.begin_transaction();
        heap.insert_row(person("sam", 25), tid).unwrap();
        pool.commit_transaction(tid).unwrap();

        assert!(matches!(
            pool.get_page(&heap, 0, tid, LockMode::Read),
            Err(Error::IllegalTransaction(_))
        ));
        assert!(matches!(
            pool.commit_transaction(tid),
            Err(Error::IllegalTransaction(_))
        ));
        pool.abort_transaction(tid).unwrap();
    }

    #[test]
    fn test_cache_hit_returns_same_page() {
        let (_dir, pool, heap) = setup(2);
        let tid = pool.begin_transaction();
        heap.insert_row(person("sam", 25), tid).unwrap();

        let a = pool.get_page(&heap, 0, tid, LockMode::Read).unwrap();
        let b = pool.get_page(&heap, 0, tid, LockMode::Write).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.cached_pages(), 1);
        assert!(pool.is_cached(&heap.page_key(0)));
    }

    #[test]
    fn test_commit_flushes_and_cleans() {
        let (_dir, pool, heap) = setup(2);
        let tid = pool.begin_transaction();
        heap.insert_row(person("sam", 25), tid).unwrap();

        let page = pool.get_page(&heap, 0, tid, LockMode::Read).unwrap();
        assert!(page.lock().is_dirty());
        pool.commit_transaction(tid).unwrap();
        assert!(!page.lock().is_dirty());

        // The committed image is on disk
        assert_eq!(heap.read_page(0).unwrap().used_slots(), 1);
        assert!(pool.active_transactions().is_empty());
    }

    #[test]
    fn test_abort_discards_changes() {
        let (_dir, pool, heap) = setup(2);
        let t1 = pool.begin_transaction();
        heap.insert_row(person("sam", 25), t1).unwrap();
        pool.commit_transaction(t1).unwrap();

        let t2 = pool.begin_transaction();
        heap.insert_row(person("george jones", 999), t2).unwrap();
        pool.abort_transaction(t2).unwrap();

        let t3 = pool.begin_transaction();
        let page = pool.get_page(&heap, 0, t3, LockMode::Read).unwrap();
        let page = page.lock();
        assert!(!page.is_dirty());
        assert_eq!(page.used_slots(), 1);
    }

    #[test]
    fn test_page_past_end_keeps_cache() {
        let (_dir, pool, heap) = setup(1);
        let tid = pool.begin_transaction();
        heap.insert_row(person("sam", 25), tid).unwrap();
        pool.commit_transaction(tid).unwrap();

        let t2 = pool.begin_transaction();
        pool.get_page(&heap, 0, t2, LockMode::Read).unwrap();
        assert!(matches!(
            pool.get_page(&heap, 5, t2, LockMode::Write),
            Err(Error::IllegalOperation(_))
        ));
        assert!(pool.is_cached(&heap.page_key(0)));
        assert_eq!(pool.state.lock().locks.holds(&heap.page_key(5), t2), None);
    }

    #[test]
    fn test_clean_pages_are_evicted() {
        let (_dir, pool, heap) = setup(1);
        let tid = pool.begin_transaction();
        heap.insert_row(person("sam", 25), tid).unwrap();
        pool.commit_transaction(tid).unwrap();

        let t2 = pool.begin_transaction();
        let second = heap
            .disk()
            .append_page(&[0u8; crate::storage::page::PAGE_SIZE])
            .unwrap();
        pool.get_page(&heap, second, t2, LockMode::Read).unwrap();
        assert_eq!(pool.cached_pages(), 1);
        assert!(!pool.is_cached(&heap.page_key(0)));
    }
}
