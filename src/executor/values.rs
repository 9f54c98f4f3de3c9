//! Literal rows
//!
//! An in-memory operator over a fixed list of rows, typically the child of an
//! `Insert`.

use std::sync::Arc;

use super::{Operator, TupleIter};
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};
use crate::transaction::TransactionId;

pub struct Values {
    schema: Arc<Schema>,
    rows: Vec<Vec<Value>>,
}

impl Values {
    /// Every row must match `schema` field by field
    pub fn new(schema: Arc<Schema>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for row in &rows {
            let fits = row.len() == schema.column_count()
                && row
                    .iter()
                    .zip(schema.data_types())
                    .all(|(v, t)| v.data_type() == t);
            if !fits {
                let shown: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                return Err(Error::IncompatibleTypes(format!(
                    "row ({}) does not match schema ({})",
                    shown.join(", "),
                    schema
                )));
            }
        }
        Ok(Self { schema, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Operator for Values {
    fn descriptor(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn iterator(&self, _tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(self.rows.iter().map(move |values| {
            Ok(Tuple::new(Arc::clone(&self.schema), values.clone()))
        })))
    }
}
