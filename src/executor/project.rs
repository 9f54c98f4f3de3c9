//! Projection
//!
//! Computes a new row per child row from a list of expressions, optionally
//! dropping rows whose output values were already emitted.

use std::collections::HashSet;
use std::sync::Arc;

use super::{Expr, Operator, StopOnErrorExt, TupleIter};
use crate::catalog::{Column, Schema};
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};
use crate::transaction::TransactionId;

pub struct Project {
    exprs: Vec<Expr>,
    schema: Arc<Schema>,
    distinct: bool,
    child: Arc<dyn Operator>,
}

impl Project {
    /// `names[i]` names the column computed by `exprs[i]`
    pub fn new(
        exprs: Vec<Expr>,
        names: Vec<String>,
        distinct: bool,
        child: Arc<dyn Operator>,
    ) -> Result<Self> {
        if exprs.len() != names.len() {
            return Err(Error::IllegalOperation(format!(
                "{} output names for {} expressions",
                names.len(),
                exprs.len()
            )));
        }

        let columns = exprs
            .iter()
            .zip(names)
            .map(|(expr, name)| Column {
                name,
                ..expr.output_column()
            })
            .collect();

        Ok(Self {
            exprs,
            schema: Arc::new(Schema::from_columns(columns)),
            distinct,
            child,
        })
    }

    fn project(&self, row: &Tuple) -> Result<Vec<Value>> {
        self.exprs.iter().map(|e| e.eval(row)).collect()
    }
}

impl Operator for Project {
    fn descriptor(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        let rows = self.child.iterator(tid)?.filter_map(move |row| {
            let values = match row.and_then(|r| self.project(&r)) {
                Ok(values) => values,
                Err(e) => return Some(Err(e)),
            };
            if self.distinct && !seen.insert(values.clone()) {
                return None;
            }
            Some(Ok(Tuple::new(Arc::clone(&self.schema), values)))
        });
        Ok(Box::new(rows.stop_on_error()))
    }
}
