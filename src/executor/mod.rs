//! Query execution module
//!
//! Operators form a tree; each one produces rows by pulling from its
//! children. A `HeapFile` is itself an operator (a full scan).
//!
//! Every call to `Operator::iterator` builds a fresh, independent iterator.
//! The operator keeps only its configuration; all traversal state lives in
//! the iterator. Once an iterator yields an error it yields nothing more.

pub mod aggregate;
pub mod delete;
pub mod expr;
pub mod filter;
pub mod insert;
pub mod join;
pub mod limit;
pub mod order_by;
pub mod project;
pub mod values;

use std::sync::Arc;

use crate::catalog::{Column, DataType, Schema};
use crate::error::Result;
use crate::storage::Tuple;
use crate::transaction::TransactionId;

pub use aggregate::{AggFunc, AggState, Aggregator};
pub use delete::Delete;
pub use expr::{ArithOp, Expr};
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use limit::Limit;
pub use order_by::{OrderBy, SortKey};
pub use project::Project;
pub use values::Values;

/// Row stream produced by an operator
pub type TupleIter<'a> = Box<dyn Iterator<Item = Result<Tuple>> + 'a>;

/// A node in an operator tree
pub trait Operator: Send + Sync {
    /// Schema of the rows this operator produces
    fn descriptor(&self) -> Arc<Schema>;

    /// Start a new traversal on behalf of `tid`
    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>>;
}

/// Schema of the single row emitted by Insert and Delete
pub(crate) fn count_schema() -> Arc<Schema> {
    Arc::new(Schema::from_columns(vec![Column::new(
        "count",
        DataType::Integer,
    )]))
}

/// Ends the stream after the first error
pub(crate) struct StopOnError<I> {
    inner: I,
    failed: bool,
}

impl<I: Iterator<Item = Result<Tuple>>> Iterator for StopOnError<I> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        self.failed = item.is_err();
        Some(item)
    }
}

pub(crate) trait StopOnErrorExt: Iterator<Item = Result<Tuple>> + Sized {
    fn stop_on_error(self) -> StopOnError<Self> {
        StopOnError {
            inner: self,
            failed: false,
        }
    }
}

impl<I: Iterator<Item = Result<Tuple>>> StopOnErrorExt for I {}

/// Runs `produce` on the first pull and then streams its rows
///
/// Used by operators that must consume their whole input before emitting
/// anything (sorting, aggregation, DML).
pub(crate) struct Deferred<F> {
    produce: Option<F>,
    rows: std::vec::IntoIter<Tuple>,
}

impl<F> Deferred<F>
where
    F: FnOnce() -> Result<Vec<Tuple>>,
{
    pub(crate) fn new(produce: F) -> Self {
        Self {
            produce: Some(produce),
            rows: Vec::new().into_iter(),
        }
    }
}

impl<F> Iterator for Deferred<F>
where
    F: FnOnce() -> Result<Vec<Tuple>>,
{
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(produce) = self.produce.take() {
            match produce() {
                Ok(rows) => self.rows = rows.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
        self.rows.next().map(Ok)
    }
}
