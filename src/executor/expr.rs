//! Value expressions
//!
//! Expressions are evaluated against one row at a time: constants, field
//! references and integer arithmetic over those.

use std::cmp::Ordering;
use std::fmt;

use crate::catalog::{Column, DataType};
use crate::error::{Error, Result};
use crate::storage::{Tuple, Value};

/// Integer arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        };
        write!(f, "{}", s)
    }
}

/// A value expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant value
    Const(Value),
    /// Reference to a field of the input row
    Field(Column),
    /// Integer arithmetic
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Const(value.into())
    }

    /// Unqualified field reference
    pub fn field(name: &str, data_type: DataType) -> Self {
        Expr::Field(Column::new(name, data_type))
    }

    /// Field reference qualified by table or alias
    pub fn qualified(table: &str, name: &str, data_type: DataType) -> Self {
        Expr::Field(Column::new(name, data_type).qualified(table))
    }

    pub fn arith(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Kind of value this expression produces
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Const(v) => v.data_type(),
            Expr::Field(c) => c.data_type,
            Expr::Arith { .. } => DataType::Integer,
        }
    }

    /// Field descriptor for a result column computed by this expression
    pub fn output_column(&self) -> Column {
        match self {
            Expr::Field(c) => c.clone(),
            other => Column::new(other.to_string(), other.data_type()),
        }
    }

    /// Evaluate against `tuple`
    pub fn eval(&self, tuple: &Tuple) -> Result<Value> {
        match self {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Field(c) => tuple.field(c).cloned(),
            Expr::Arith { op, left, right } => {
                arith(*op, &left.eval(tuple)?, &right.eval(tuple)?)
            }
        }
    }

    /// Evaluate without an input row; field references are not allowed
    pub fn eval_const(&self) -> Result<Value> {
        match self {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Field(c) => Err(Error::IllegalOperation(format!(
                "field '{}' used where a constant is required",
                c
            ))),
            Expr::Arith { op, left, right } => {
                arith(*op, &left.eval_const()?, &right.eval_const()?)
            }
        }
    }

    /// Order two rows by the value this expression takes on each
    pub fn compare(&self, a: &Tuple, b: &Tuple) -> Result<Ordering> {
        let (left, right) = (self.eval(a)?, self.eval(b)?);
        if left.data_type() != right.data_type() {
            return Err(Error::type_mismatch(
                &left.data_type().to_string(),
                &right.data_type().to_string(),
            ));
        }
        Ok(left.cmp(&right))
    }
}

fn arith(op: ArithOp, left: &Value, right: &Value) -> Result<Value> {
    let (Value::Integer(l), Value::Integer(r)) = (left, right) else {
        return Err(Error::type_mismatch(
            &left.data_type().to_string(),
            &right.data_type().to_string(),
        ));
    };

    let result = match op {
        ArithOp::Add => l.checked_add(*r),
        ArithOp::Sub => l.checked_sub(*r),
        ArithOp::Mul => l.checked_mul(*r),
        ArithOp::Div | ArithOp::Mod if *r == 0 => {
            return Err(Error::IllegalOperation(format!("{} {} 0", l, op)));
        }
        ArithOp::Div => l.checked_div(*r),
        ArithOp::Mod => l.checked_rem(*r),
    };
    result
        .map(Value::Integer)
        .ok_or_else(|| Error::IllegalOperation(format!("{} {} {} overflows", l, op, r)))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(Value::String(s)) => write!(f, "'{}'", s),
            Expr::Const(v) => write!(f, "{}", v),
            Expr::Field(c) => write!(f, "{}", c),
            Expr::Arith { op, left, right } => write!(f, "({} {} {})", left, op, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Schema;
    use std::sync::Arc;

    fn sam() -> Tuple {
        let schema = Arc::new(
            Schema::from_columns(vec![
                Column::new("name", DataType::String),
                Column::new("age", DataType::Integer),
            ])
            .with_qualifier("t"),
        );
        Tuple::new(schema, vec!["sam".into(), Value::Integer(25)])
    }

    #[test]
    fn test_field_and_const() {
        let t = sam();
        assert_eq!(
            Expr::field("age", DataType::Integer).eval(&t).unwrap(),
            Value::Integer(25)
        );
        assert_eq!(
            Expr::qualified("t", "name", DataType::String).eval(&t).unwrap(),
            Value::from("sam")
        );
        assert_eq!(Expr::constant(7).eval(&t).unwrap(), Value::Integer(7));
        assert!(Expr::field("salary", DataType::Integer).eval(&t).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let t = sam();
        let age = || Expr::field("age", DataType::Integer);
        let doubled = Expr::arith(ArithOp::Mul, age(), Expr::constant(2));
        assert_eq!(doubled.eval(&t).unwrap(), Value::Integer(50));
        assert_eq!(doubled.to_string(), "(age * 2)");

        let modded = Expr::arith(ArithOp::Mod, age(), Expr::constant(7));
        assert_eq!(modded.eval(&t).unwrap(), Value::Integer(4));

        let by_zero = Expr::arith(ArithOp::Div, age(), Expr::constant(0));
        assert!(matches!(by_zero.eval(&t), Err(Error::IllegalOperation(_))));

        let mixed = Expr::arith(
            ArithOp::Add,
            Expr::field("name", DataType::String),
            Expr::constant(1),
        );
        assert!(matches!(mixed.eval(&t), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_eval_const() {
        let sum = Expr::arith(ArithOp::Add, Expr::constant(2), Expr::constant(3));
        assert_eq!(sum.eval_const().unwrap(), Value::Integer(5));
        assert!(matches!(
            Expr::field("age", DataType::Integer).eval_const(),
            Err(Error::IllegalOperation(_))
        ));
    }

    #[test]
    fn test_compare() {
        let schema = sam().schema().clone();
        let george = Tuple::new(schema, vec!["george jones".into(), Value::Integer(999)]);
        let age = Expr::field("age", DataType::Integer);
        assert_eq!(age.compare(&sam(), &george).unwrap(), Ordering::Less);
        let name = Expr::field("name", DataType::String);
        assert_eq!(name.compare(&sam(), &george).unwrap(), Ordering::Greater);
    }
}
