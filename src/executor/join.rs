//! Equality join
//!
//! Block hash join: the left input is read in blocks of at most
//! `max_buffer_rows` rows, each block is hashed on the left key, and the
//! right input is rescanned once per block to probe it. Memory is bounded by
//! the block size no matter how large either input is.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::{Expr, Operator, TupleIter};
use crate::catalog::Schema;
use crate::config::DEFAULT_JOIN_BUFFER_ROWS;
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};
use crate::transaction::TransactionId;

pub struct Join {
    left: Arc<dyn Operator>,
    left_key: Expr,
    right: Arc<dyn Operator>,
    right_key: Expr,
    max_buffer_rows: usize,
}

impl Join {
    /// Join rows where `left_key` on the left row equals `right_key` on the
    /// right row
    pub fn new(
        left: Arc<dyn Operator>,
        left_key: Expr,
        right: Arc<dyn Operator>,
        right_key: Expr,
        max_buffer_rows: usize,
    ) -> Result<Self> {
        if left_key.data_type() != right_key.data_type() {
            return Err(Error::IncompatibleTypes(format!(
                "cannot join {} ({}) with {} ({})",
                left_key,
                left_key.data_type(),
                right_key,
                right_key.data_type()
            )));
        }
        if max_buffer_rows == 0 {
            return Err(Error::IllegalOperation(
                "join buffer must hold at least one row".to_string(),
            ));
        }
        Ok(Self {
            left,
            left_key,
            right,
            right_key,
            max_buffer_rows,
        })
    }

    /// Join with the default block size
    pub fn with_default_buffer(
        left: Arc<dyn Operator>,
        left_key: Expr,
        right: Arc<dyn Operator>,
        right_key: Expr,
    ) -> Result<Self> {
        Self::new(left, left_key, right, right_key, DEFAULT_JOIN_BUFFER_ROWS)
    }

    pub fn max_buffer_rows(&self) -> usize {
        self.max_buffer_rows
    }
}

impl Operator for Join {
    fn descriptor(&self) -> Arc<Schema> {
        Arc::new(self.left.descriptor().merge(&self.right.descriptor()))
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(JoinIter {
            join: self,
            tid,
            left: self.left.iterator(tid)?,
            left_done: false,
            block: HashMap::new(),
            right: None,
            pending: VecDeque::new(),
            finished: false,
        }))
    }
}

struct JoinIter<'a> {
    join: &'a Join,
    tid: TransactionId,
    left: TupleIter<'a>,
    left_done: bool,
    /// Current left block keyed by join value
    block: HashMap<Value, Vec<Tuple>>,
    /// Right-side scan probing the current block
    right: Option<TupleIter<'a>>,
    /// Joined rows for the current right row
    pending: VecDeque<Tuple>,
    finished: bool,
}

impl JoinIter<'_> {
    /// Read the next left block and restart the right scan; false when the
    /// left input is exhausted
    fn load_block(&mut self) -> Result<bool> {
        self.block.clear();
        let mut loaded = 0;
        while loaded < self.join.max_buffer_rows {
            match self.left.next() {
                Some(row) => {
                    let row = row?;
                    let key = self.join.left_key.eval(&row)?;
                    self.block.entry(key).or_default().push(row);
                    loaded += 1;
                }
                None => {
                    self.left_done = true;
                    break;
                }
            }
        }
        if loaded == 0 {
            return Ok(false);
        }
        self.right = Some(self.join.right.iterator(self.tid)?);
        Ok(true)
    }

    fn step(&mut self) -> Result<Option<Tuple>> {
        loop {
            if let Some(joined) = self.pending.pop_front() {
                return Ok(Some(joined));
            }

            let Some(right) = self.right.as_mut() else {
                if self.left_done || !self.load_block()? {
                    return Ok(None);
                }
                continue;
            };

            match right.next() {
                Some(row) => {
                    let row = row?;
                    let key = self.join.right_key.eval(&row)?;
                    if let Some(matches) = self.block.get(&key) {
                        self.pending.extend(matches.iter().map(|l| l.concat(&row)));
                    }
                }
                None => self.right = None,
            }
        }
    }
}

impl Iterator for JoinIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::executor::Values;

    fn numbers(table: &str, values: &[i64]) -> Arc<dyn Operator> {
        let schema = Arc::new(
            Schema::from_columns(vec![
                Column::new("id", DataType::Integer),
                Column::new("label", DataType::String),
            ])
            .with_qualifier(table),
        );
        let rows = values
            .iter()
            .map(|&v| vec![Value::Integer(v), format!("{}{}", table, v).into()])
            .collect();
        Arc::new(Values::new(schema, rows).unwrap())
    }

    fn run(join: &Join) -> Vec<Tuple> {
        let tid = TransactionId::next();
        join.iterator(tid).unwrap().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_join_duplicates() {
        for buffer in [1, 2, 100] {
            let join = Join::new(
                numbers("a", &[1, 2, 2]),
                Expr::qualified("a", "id", DataType::Integer),
                numbers("b", &[1, 2, 2]),
                Expr::qualified("b", "id", DataType::Integer),
                buffer,
            )
            .unwrap();
            let rows = run(&join);
            assert_eq!(rows.len(), 5, "buffer of {} rows", buffer);
            assert!(rows.iter().all(|r| r.get(0) == r.get(2)));
        }
    }

    #[test]
    fn test_join_schema() {
        let join = Join::with_default_buffer(
            numbers("a", &[1]),
            Expr::qualified("a", "id", DataType::Integer),
            numbers("b", &[1]),
            Expr::qualified("b", "id", DataType::Integer),
        )
        .unwrap();
        let schema = join.descriptor();
        assert_eq!(schema.column_count(), 4);
        assert_eq!(schema.column(2).and_then(|c| c.table.as_deref()), Some("b"));

        let rows = run(&join);
        assert_eq!(rows[0].get(1), Some(&Value::from("a1")));
        assert_eq!(rows[0].get(3), Some(&Value::from("b1")));
    }

    #[test]
    fn test_join_no_matches_and_empty_inputs() {
        let key_a = || Expr::qualified("a", "id", DataType::Integer);
        let key_b = || Expr::qualified("b", "id", DataType::Integer);

        let disjoint = Join::new(numbers("a", &[1]), key_a(), numbers("b", &[2]), key_b(), 4).unwrap();
        assert!(run(&disjoint).is_empty());

        let empty = Join::new(numbers("a", &[]), key_a(), numbers("b", &[2]), key_b(), 4).unwrap();
        assert!(run(&empty).is_empty());
    }

    #[test]
    fn test_join_rejects_mismatched_keys() {
        let result = Join::new(
            numbers("a", &[1]),
            Expr::qualified("a", "id", DataType::Integer),
            numbers("b", &[1]),
            Expr::qualified("b", "label", DataType::String),
            4,
        );
        assert!(matches!(result, Err(Error::IncompatibleTypes(_))));
    }
}
