//! Insertion into a heap file
//!
//! Reads every child row before writing any, so a child that scans the target
//! file does not see the rows being added.

use std::sync::Arc;

use tracing::debug;

use super::{count_schema, Deferred, Operator, TupleIter};
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::storage::{HeapFile, Tuple, Value};
use crate::transaction::TransactionId;

pub struct Insert {
    target: Arc<HeapFile>,
    child: Arc<dyn Operator>,
}

impl Insert {
    /// The child must produce rows of the target's schema
    pub fn new(target: Arc<HeapFile>, child: Arc<dyn Operator>) -> Result<Self> {
        let produced = child.descriptor();
        if *produced != **target.schema() {
            return Err(Error::IncompatibleTypes(format!(
                "cannot insert ({}) into ({})",
                produced,
                target.schema()
            )));
        }
        Ok(Self { target, child })
    }

    fn run(&self, tid: TransactionId) -> Result<Vec<Tuple>> {
        let rows = self.child.iterator(tid)?.collect::<Result<Vec<_>>>()?;
        let count = rows.len();
        for row in rows {
            self.target.insert_row(row, tid)?;
        }
        debug!(%tid, file = ?self.target.file_id(), count, "inserted rows");
        Ok(vec![Tuple::new(count_schema(), vec![Value::Integer(count as i64)])])
    }
}

impl Operator for Insert {
    fn descriptor(&self) -> Arc<Schema> {
        count_schema()
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(Deferred::new(move || self.run(tid))))
    }
}
