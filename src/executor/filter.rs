//! Selection
//!
//! Passes through the child rows for which `left op right` holds.

use std::sync::Arc;

use super::{Expr, Operator, StopOnErrorExt, TupleIter};
use crate::catalog::Schema;
use crate::error::Result;
use crate::storage::{CmpOp, Tuple};
use crate::transaction::TransactionId;

pub struct Filter {
    left: Expr,
    op: CmpOp,
    right: Expr,
    child: Arc<dyn Operator>,
}

impl Filter {
    pub fn new(left: Expr, op: CmpOp, right: Expr, child: Arc<dyn Operator>) -> Self {
        Self {
            left,
            op,
            right,
            child,
        }
    }

    fn matches(&self, tuple: &Tuple) -> Result<bool> {
        let left = self.left.eval(tuple)?;
        let right = self.right.eval(tuple)?;
        left.eval_pred(self.op, &right)
    }
}

impl Operator for Filter {
    fn descriptor(&self) -> Arc<Schema> {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        let rows = self.child.iterator(tid)?;
        Ok(Box::new(
            rows.filter_map(move |row| match row.and_then(|t| Ok((self.matches(&t)?, t))) {
                Ok((true, t)) => Some(Ok(t)),
                Ok((false, _)) => None,
                Err(e) => Some(Err(e)),
            })
            .stop_on_error(),
        ))
    }
}
