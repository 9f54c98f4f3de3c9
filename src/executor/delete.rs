//! Deletion from a heap file
//!
//! The child (usually a filter over the target) is drained into a list of
//! located rows before the first delete, so deleting never disturbs the scan
//! that found the rows.

use std::sync::Arc;

use tracing::debug;

use super::{count_schema, Deferred, Operator, TupleIter};
use crate::catalog::Schema;
use crate::error::Result;
use crate::storage::{HeapFile, Tuple, Value};
use crate::transaction::TransactionId;

pub struct Delete {
    target: Arc<HeapFile>,
    child: Arc<dyn Operator>,
}

impl Delete {
    pub fn new(target: Arc<HeapFile>, child: Arc<dyn Operator>) -> Self {
        Self { target, child }
    }

    fn run(&self, tid: TransactionId) -> Result<Vec<Tuple>> {
        let doomed = self.child.iterator(tid)?.collect::<Result<Vec<_>>>()?;
        for row in &doomed {
            self.target.delete_row(row, tid)?;
        }
        debug!(%tid, file = ?self.target.file_id(), count = doomed.len(), "deleted rows");
        Ok(vec![Tuple::new(
            count_schema(),
            vec![Value::Integer(doomed.len() as i64)],
        )])
    }
}

impl Operator for Delete {
    fn descriptor(&self) -> Arc<Schema> {
        count_schema()
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(Deferred::new(move || self.run(tid))))
    }
}
