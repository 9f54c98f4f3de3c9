//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Row and value representation
//! - Heap page codec
//! - Page-granular disk files
//! - Heap files
//! - Transaction-aware buffer pool

pub mod buffer_pool;
pub mod disk;
pub mod heap;
pub mod page;
pub mod tuple;

pub use buffer_pool::BufferPool;
pub use disk::{DiskFile, FileId, PageKey};
pub use heap::{HeapFile, RecordId};
pub use page::{HeapPage, PageRef, PAGE_SIZE};
pub use tuple::{CmpOp, Tuple, Value};
