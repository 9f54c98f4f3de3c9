//! Aggregation
//!
//! An `Aggregator` folds its whole input into running aggregate states and
//! emits the finalized values. Without group-by expressions it emits exactly
//! one row; with them it emits one row per distinct group key, in the order
//! the keys were first seen.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{Deferred, Expr, Operator, TupleIter};
use crate::catalog::{Column, DataType, Schema};
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};
use crate::transaction::TransactionId;

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// Number of input rows; the expression may be of any kind
    Count,
    /// Integer sum; string inputs are rejected when the state is built rather
    /// than coerced, so only Count and Min/Max accept strings
    Sum,
    /// Integer average, truncated
    Avg,
    Min,
    Max,
}

/// Running value of one aggregate
#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    Count(i64),
    Sum(i64),
    Avg { sum: i64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

/// One aggregate: its output name, input expression and running value
///
/// Cloning gives an independent state, which is how each group gets its own.
#[derive(Debug, Clone)]
pub struct AggState {
    alias: String,
    expr: Expr,
    func: AggFunc,
    acc: Accumulator,
}

impl AggState {
    /// Sum and Avg need an integer expression and fail with `TypeMismatch`
    /// otherwise
    pub fn new(func: AggFunc, alias: impl Into<String>, expr: Expr) -> Result<Self> {
        if matches!(func, AggFunc::Sum | AggFunc::Avg) && expr.data_type() != DataType::Integer {
            return Err(Error::type_mismatch(
                &DataType::Integer.to_string(),
                &expr.data_type().to_string(),
            ));
        }
        let acc = match func {
            AggFunc::Count => Accumulator::Count(0),
            AggFunc::Sum => Accumulator::Sum(0),
            AggFunc::Avg => Accumulator::Avg { sum: 0, count: 0 },
            AggFunc::Min => Accumulator::Min(None),
            AggFunc::Max => Accumulator::Max(None),
        };
        Ok(Self {
            alias: alias.into(),
            expr,
            func,
            acc,
        })
    }

    pub fn count(alias: impl Into<String>, expr: Expr) -> Result<Self> {
        Self::new(AggFunc::Count, alias, expr)
    }

    pub fn sum(alias: impl Into<String>, expr: Expr) -> Result<Self> {
        Self::new(AggFunc::Sum, alias, expr)
    }

    pub fn avg(alias: impl Into<String>, expr: Expr) -> Result<Self> {
        Self::new(AggFunc::Avg, alias, expr)
    }

    pub fn min(alias: impl Into<String>, expr: Expr) -> Result<Self> {
        Self::new(AggFunc::Min, alias, expr)
    }

    pub fn max(alias: impl Into<String>, expr: Expr) -> Result<Self> {
        Self::new(AggFunc::Max, alias, expr)
    }

    pub fn func(&self) -> AggFunc {
        self.func
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Descriptor of the finalized value
    pub fn output_column(&self) -> Column {
        let data_type = match self.func {
            AggFunc::Min | AggFunc::Max => self.expr.data_type(),
            _ => DataType::Integer,
        };
        Column::new(self.alias.clone(), data_type)
    }

    /// Fold one input row into the state
    pub fn update(&mut self, tuple: &Tuple) -> Result<()> {
        if let Accumulator::Count(n) = &mut self.acc {
            *n += 1;
            return Ok(());
        }

        let value = self.expr.eval(tuple)?;
        match &mut self.acc {
            Accumulator::Count(_) => {}
            Accumulator::Sum(sum) => *sum = checked_add(*sum, &value)?,
            Accumulator::Avg { sum, count } => {
                *sum = checked_add(*sum, &value)?;
                *count += 1;
            }
            Accumulator::Min(best) => {
                if best.as_ref().map_or(true, |b| value < *b) {
                    *best = Some(value);
                }
            }
            Accumulator::Max(best) => {
                if best.as_ref().map_or(true, |b| value > *b) {
                    *best = Some(value);
                }
            }
        }
        Ok(())
    }

    /// Final value; Avg, Min and Max need at least one input row
    pub fn finalize(&self) -> Result<Value> {
        match &self.acc {
            Accumulator::Count(n) => Ok(Value::Integer(*n)),
            Accumulator::Sum(sum) => Ok(Value::Integer(*sum)),
            Accumulator::Avg { count: 0, .. } => Err(self.no_input()),
            Accumulator::Avg { sum, count } => Ok(Value::Integer(sum / count)),
            Accumulator::Min(best) | Accumulator::Max(best) => {
                best.clone().ok_or_else(|| self.no_input())
            }
        }
    }

    fn no_input(&self) -> Error {
        Error::IllegalOperation(format!("{:?}({}) over no rows", self.func, self.expr))
    }
}

fn checked_add(sum: i64, value: &Value) -> Result<i64> {
    let Value::Integer(v) = value else {
        return Err(Error::type_mismatch(
            &DataType::Integer.to_string(),
            &value.data_type().to_string(),
        ));
    };
    sum.checked_add(*v)
        .ok_or_else(|| Error::IllegalOperation("integer overflow in aggregate".to_string()))
}

pub struct Aggregator {
    states: Vec<AggState>,
    group_by: Vec<Expr>,
    child: Arc<dyn Operator>,
}

impl Aggregator {
    /// Aggregate the whole input into one row
    pub fn new(states: Vec<AggState>, child: Arc<dyn Operator>) -> Self {
        Self {
            states,
            group_by: Vec::new(),
            child,
        }
    }

    /// Aggregate per distinct value of `group_by`
    pub fn grouped(states: Vec<AggState>, group_by: Vec<Expr>, child: Arc<dyn Operator>) -> Self {
        Self {
            states,
            group_by,
            child,
        }
    }

    fn aggregate(&self, tid: TransactionId) -> Result<Vec<Tuple>> {
        let schema = self.descriptor();
        let mut groups: IndexMap<Vec<Value>, Vec<AggState>> = IndexMap::new();
        if self.group_by.is_empty() {
            groups.insert(Vec::new(), self.states.clone());
        }

        for row in self.child.iterator(tid)? {
            let row = row?;
            let key = self
                .group_by
                .iter()
                .map(|e| e.eval(&row))
                .collect::<Result<Vec<_>>>()?;
            let states = groups.entry(key).or_insert_with(|| self.states.clone());
            for state in states.iter_mut() {
                state.update(&row)?;
            }
        }

        groups
            .into_iter()
            .map(|(mut key, states)| {
                for state in &states {
                    key.push(state.finalize()?);
                }
                Ok(Tuple::new(Arc::clone(&schema), key))
            })
            .collect()
    }
}

impl Operator for Aggregator {
    fn descriptor(&self) -> Arc<Schema> {
        let columns = self
            .group_by
            .iter()
            .map(Expr::output_column)
            .chain(self.states.iter().map(AggState::output_column))
            .collect();
        Arc::new(Schema::from_columns(columns))
    }

    fn iterator(&self, tid: TransactionId) -> Result<TupleIter<'_>> {
        Ok(Box::new(Deferred::new(move || self.aggregate(tid))))
    }
}
