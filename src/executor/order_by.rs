//! Sorting
//!
//! Materializes the child input and sorts it by a list of keys. Later keys
//! only break ties left by earlier ones. The sort is stable.

use std::cmp::Ordering;
use std::sync::Arc;

use super::{Deferred, Expr, Operator, TupleIter};
use crate::catalog::Schema;
use crate::error::Result;
use crate::storage::{Tuple, Value};
use crate::transaction::TransactionId;

/// One sort key
#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
        }
    }
}

pub struct OrderBy {
    keys: Vec<SortKey>,
    child: Arc<dyn Operator>,
}

impl OrderBy {
    pub fn new(keys: Vec<SortKey>, child: Arc<dyn Operator>) -> Self {
        Self { keys, child }
    }

    fn sorted(&self, tid: TransactionId) -> Result<Vec<Tuple>> {
        let mut keyed: Vec<(Vec<Value>, Tuple)> = Vec::new();
        for row in self.child.iterator(tid)? {
            let row = row?;
            let key = self
                .keys
                .iter()
                .map(|k| k.expr.eval(&row))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((key, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (key, (va, vb)) in self.keys.iter().zip(a.iter().zip(b)) {
                let ord = va.cmp(vb);
                if ord != Ordering::Equal {
                    return if key.ascending { ord } else { ord.reverse() };
                }
            }
            Ordering::Equal
        });

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

impl Operator for OrderBy {
    fn descriptor(&self) -> Arc<Schema> {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(Deferred::new(move || self.sorted(tid))))
    }
}
