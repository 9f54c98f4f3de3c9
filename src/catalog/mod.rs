//! Catalog module
//!
//! This module contains the table registry, schema definitions, data types
//! and table statistics.

pub mod catalog;
pub mod schema;
pub mod stats;
pub mod types;

pub use catalog::Catalog;
pub use schema::{Column, Schema};
pub use stats::{HeapStats, TableStats};
pub use types::DataType;
