//! Transaction identifiers and page locks
//!
//! `LockTable` tracks which transaction holds which page in which mode and who
//! is waiting on whom. It does no synchronization of its own; the buffer pool
//! owns it behind its state mutex and does the blocking.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::storage::disk::PageKey;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction identifier, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn {}", self.0)
    }
}

/// Page lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared
    Read,
    /// Exclusive
    Write,
}

/// Outcome of a lock request
#[derive(Debug, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    /// Held incompatibly by these transactions
    Blocked(HashSet<TransactionId>),
}

/// Holders of one page
#[derive(Debug, Default)]
struct PageLock {
    exclusive: Option<TransactionId>,
    shared: HashSet<TransactionId>,
}

impl PageLock {
    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

/// Page lock table with a wait-for graph
#[derive(Debug, Default)]
pub struct LockTable {
    locks: HashMap<PageKey, PageLock>,
    /// Active transactions and the pages each has locked
    held: HashMap<TransactionId, HashSet<PageKey>>,
    /// Edges `waiter -> holders` for transactions currently blocked
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction
    pub fn begin(&mut self, tid: TransactionId) {
        self.held.entry(tid).or_default();
    }

    pub fn is_active(&self, tid: TransactionId) -> bool {
        self.held.contains_key(&tid)
    }

    /// Active transactions in id order
    pub fn active(&self) -> Vec<TransactionId> {
        let mut tids: Vec<_> = self.held.keys().copied().collect();
        tids.sort();
        tids
    }

    /// Try to lock `key` for `tid`
    ///
    /// A sole reader is upgraded in place to writer. Holding the write lock
    /// implies the read lock.
    pub fn acquire(&mut self, key: PageKey, tid: TransactionId, mode: LockMode) -> Acquire {
        let entry = self.locks.entry(key).or_default();

        match entry.exclusive {
            Some(holder) if holder == tid => return Acquire::Granted,
            Some(holder) => return Acquire::Blocked(HashSet::from([holder])),
            None => {}
        }

        match mode {
            LockMode::Read => {
                entry.shared.insert(tid);
            }
            LockMode::Write => {
                let others: HashSet<_> =
                    entry.shared.iter().copied().filter(|&t| t != tid).collect();
                if !others.is_empty() {
                    return Acquire::Blocked(others);
                }
                entry.shared.remove(&tid);
                entry.exclusive = Some(tid);
            }
        }

        self.held.entry(tid).or_default().insert(key);
        Acquire::Granted
    }

    /// Mode in which `tid` holds `key`, if at all
    pub fn holds(&self, key: &PageKey, tid: TransactionId) -> Option<LockMode> {
        let entry = self.locks.get(key)?;
        if entry.exclusive == Some(tid) {
            Some(LockMode::Write)
        } else if entry.shared.contains(&tid) {
            Some(LockMode::Read)
        } else {
            None
        }
    }

    /// Whether any transaction other than `tid` holds `key`
    pub fn locked_by_other(&self, key: &PageKey, tid: TransactionId) -> bool {
        match self.locks.get(key) {
            Some(entry) => {
                entry.exclusive.is_some_and(|t| t != tid)
                    || entry.shared.iter().any(|&t| t != tid)
            }
            None => false,
        }
    }

    /// Pages `tid` holds exclusively
    pub fn exclusive_pages(&self, tid: TransactionId) -> Vec<PageKey> {
        self.held
            .get(&tid)
            .map(|keys| {
                keys.iter()
                    .filter(|k| self.holds(k, tid) == Some(LockMode::Write))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record that `tid` is blocked behind `holders`
    pub fn wait_on(&mut self, tid: TransactionId, holders: HashSet<TransactionId>) {
        self.waits_for.insert(tid, holders);
    }

    pub fn stop_waiting(&mut self, tid: TransactionId) {
        self.waits_for.remove(&tid);
    }

    /// Whether the wait-for graph has a path from `tid` back to itself
    pub fn would_deadlock(&self, tid: TransactionId) -> bool {
        let mut queue: VecDeque<TransactionId> = VecDeque::new();
        let mut visited = HashSet::new();
        queue.push_back(tid);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(holders) = self.waits_for.get(&current) {
                for &holder in holders {
                    if holder == tid {
                        return true;
                    }
                    queue.push_back(holder);
                }
            }
        }
        false
    }

    /// Drop every lock `tid` holds and forget the transaction
    pub fn release_all(&mut self, tid: TransactionId) {
        self.waits_for.remove(&tid);
        let Some(keys) = self.held.remove(&tid) else {
            return;
        };
        for key in keys {
            if let Some(entry) = self.locks.get_mut(&key) {
                if entry.exclusive == Some(tid) {
                    entry.exclusive = None;
                }
                entry.shared.remove(&tid);
                if entry.is_free() {
                    self.locks.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::FileId;

    fn key(page: usize) -> PageKey {
        PageKey {
            file_id: FileId(1),
            page,
        }
    }

    fn two_txns(table: &mut LockTable) -> (TransactionId, TransactionId) {
        let t1 = TransactionId::next();
        let t2 = TransactionId::next();
        table.begin(t1);
        table.begin(t2);
        (t1, t2)
    }

    #[test]
    fn test_ids_are_monotonic() {
        let a = TransactionId::next();
        let b = TransactionId::next();
        assert!(b > a);
    }

    #[test]
    fn test_shared_locks_are_compatible() {
        let mut table = LockTable::new();
        let (t1, t2) = two_txns(&mut table);

        assert_eq!(table.acquire(key(0), t1, LockMode::Read), Acquire::Granted);
        assert_eq!(table.acquire(key(0), t2, LockMode::Read), Acquire::Granted);
        assert_eq!(
            table.acquire(key(0), t1, LockMode::Write),
            Acquire::Blocked(HashSet::from([t2]))
        );
    }

    #[test]
    fn test_upgrade_and_release() {
        let mut table = LockTable::new();
        let (t1, t2) = two_txns(&mut table);

        assert_eq!(table.acquire(key(0), t1, LockMode::Read), Acquire::Granted);
        assert_eq!(table.acquire(key(0), t1, LockMode::Write), Acquire::Granted);
        assert_eq!(table.holds(&key(0), t1), Some(LockMode::Write));
        assert_eq!(table.acquire(key(0), t1, LockMode::Read), Acquire::Granted);
        assert_eq!(table.exclusive_pages(t1), vec![key(0)]);
        assert!(table.locked_by_other(&key(0), t2));

        table.release_all(t1);
        assert!(!table.is_active(t1));
        assert_eq!(table.acquire(key(0), t2, LockMode::Write), Acquire::Granted);
    }

    #[test]
    fn test_deadlock_cycle() {
        let mut table = LockTable::new();
        let (t1, t2) = two_txns(&mut table);

        table.acquire(key(0), t1, LockMode::Write);
        table.acquire(key(1), t2, LockMode::Write);

        if let Acquire::Blocked(holders) = table.acquire(key(1), t1, LockMode::Read) {
            table.wait_on(t1, holders);
        }
        assert!(!table.would_deadlock(t1));

        if let Acquire::Blocked(holders) = table.acquire(key(0), t2, LockMode::Read) {
            table.wait_on(t2, holders);
        }
        assert!(table.would_deadlock(t2));
    }
}
