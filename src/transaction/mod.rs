//! Transaction module
//!
//! Transaction identifiers and page-level lock bookkeeping. Commit and abort
//! are driven by the buffer pool, which owns the lock table.

pub mod transaction;

pub use transaction::{Acquire, LockMode, LockTable, TransactionId};
