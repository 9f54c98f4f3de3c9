//! heapdb - an embeddable relational storage and execution engine
//!
//! This library provides the core components of a small database:
//! - Storage (slotted heap pages, heap files, a transaction-aware buffer pool)
//! - Transactions (page-level shared/exclusive locks with deadlock detection)
//! - Query execution (pull-based operators over heap files)
//! - Catalog (table registry, schemas and statistics)
//!
//! Parsing and planning are left to the caller, which hands the engine a tree
//! of [`executor::Operator`]s.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod storage;
pub mod transaction;

pub use catalog::{Catalog, Column, DataType, Schema};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::Operator;
pub use storage::{BufferPool, HeapFile, Tuple, Value};
pub use transaction::{LockMode, TransactionId};
