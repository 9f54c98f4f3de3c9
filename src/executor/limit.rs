//! Row limit

use std::sync::Arc;

use super::{Expr, Operator, StopOnErrorExt, TupleIter};
use crate::catalog::Schema;
use crate::error::{Error, Result};
use crate::storage::Value;
use crate::transaction::TransactionId;

pub struct Limit {
    limit: usize,
    child: Arc<dyn Operator>,
}

impl Limit {
    /// `limit` must evaluate to a non-negative integer without an input row
    pub fn new(limit: Expr, child: Arc<dyn Operator>) -> Result<Self> {
        let limit = match limit.eval_const()? {
            Value::Integer(n) => usize::try_from(n).map_err(|_| {
                Error::IllegalOperation(format!("limit must not be negative, got {}", n))
            })?,
            other => {
                return Err(Error::type_mismatch(
                    "INTEGER",
                    &other.data_type().to_string(),
                ))
            }
        };
        Ok(Self { limit, child })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Operator for Limit {
    fn descriptor(&self) -> Arc<Schema> {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(
            self.child.iterator(tid)?.take(self.limit).stop_on_error(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::executor::{ArithOp, Values};

    fn numbers(n: i64) -> Arc<dyn Operator> {
        let schema = Arc::new(Schema::from_columns(vec![Column::new(
            "n",
            DataType::Integer,
        )]));
        Arc::new(Values::new(schema, (0..n).map(|i| vec![Value::Integer(i)]).collect()).unwrap())
    }

    #[test]
    fn test_limit() {
        let tid = TransactionId::next();
        let limit = Limit::new(Expr::constant(3), numbers(10)).unwrap();
        assert_eq!(limit.iterator(tid).unwrap().count(), 3);
        assert_eq!(limit.iterator(tid).unwrap().count(), 3);

        let short = Limit::new(Expr::constant(30), numbers(10)).unwrap();
        assert_eq!(short.iterator(tid).unwrap().count(), 10);

        let zero = Limit::new(Expr::constant(0), numbers(10)).unwrap();
        assert_eq!(zero.iterator(tid).unwrap().count(), 0);

        let computed = Limit::new(
            Expr::arith(ArithOp::Add, Expr::constant(1), Expr::constant(1)),
            numbers(10),
        )
        .unwrap();
        assert_eq!(computed.limit(), 2);
    }

    #[test]
    fn test_limit_rejects_bad_counts() {
        assert!(matches!(
            Limit::new(Expr::constant(-1), numbers(1)),
            Err(Error::IllegalOperation(_))
        ));
        assert!(matches!(
            Limit::new(Expr::constant("ten"), numbers(1)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            Limit::new(Expr::field("n", DataType::Integer), numbers(1)),
            Err(Error::IllegalOperation(_))
        ));
    }
}
