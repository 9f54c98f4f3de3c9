//! Tuple and Value types for heapdb
//!
//! This module defines how field values and rows are represented in memory,
//! how they compare, and how a row is laid out inside a page slot.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::heap::RecordId;
use crate::catalog::types::STRING_LENGTH;
use crate::catalog::{Column, DataType, Schema};
use crate::error::{Error, Result};

/// A field value
///
/// Values of the same kind order naturally: integers numerically, strings
/// lexicographically by byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),
    /// String value
    String(String),
}

/// Comparison operators usable in predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// SQL LIKE with `%` matching any run of characters; strings only
    Like,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "<>",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

impl Value {
    /// Get the type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::String(_) => DataType::String,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(_) => None,
        }
    }

    /// Try to convert to string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    /// Evaluate `self op other`.
    ///
    /// Operands of different kinds are a `TypeMismatch`; LIKE on integers is
    /// `IncompatibleTypes`.
    pub fn eval_pred(&self, op: CmpOp, other: &Value) -> Result<bool> {
        if self.data_type() != other.data_type() {
            return Err(Error::type_mismatch(
                &self.data_type().to_string(),
                &other.data_type().to_string(),
            ));
        }

        let ord = self.cmp(other);
        Ok(match op {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::Neq => ord.is_ne(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Gte => ord.is_ge(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Lte => ord.is_le(),
            CmpOp::Like => match (self, other) {
                (Value::String(text), Value::String(pattern)) => like_match(text, pattern),
                _ => {
                    return Err(Error::IncompatibleTypes(
                        "LIKE requires string operands".to_string(),
                    ))
                }
            },
        })
    }

    /// Write this value in its fixed on-page width
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        match self {
            Value::Integer(i) => out.write_i64::<LittleEndian>(*i)?,
            Value::String(s) => {
                let mut buf = [0u8; STRING_LENGTH];
                let stored = truncate_to_boundary(s, STRING_LENGTH);
                buf[..stored.len()].copy_from_slice(stored.as_bytes());
                out.write_all(&buf)?;
            }
        }
        Ok(())
    }

    /// Read a value of kind `data_type` written by `write_to`
    pub fn read_from<R: Read>(input: &mut R, data_type: DataType) -> Result<Value> {
        match data_type {
            DataType::Integer => Ok(Value::Integer(input.read_i64::<LittleEndian>()?)),
            DataType::String => {
                let mut buf = [0u8; STRING_LENGTH];
                input.read_exact(&mut buf)?;
                let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                let s = std::str::from_utf8(&buf[..end])
                    .map_err(|e| Error::MalformedData(e.to_string()))?;
                Ok(Value::String(s.to_string()))
            }
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Match `text` against a LIKE pattern where `%` stands for any run of chars
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    // Position of the last '%' seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, tried)) = backtrack {
            p = star + 1;
            t = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A row: its schema, its values in order, and where it lives on disk once
/// it has been stored
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Create a new tuple from values
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        Self {
            schema,
            values,
            rid: None,
        }
    }

    /// Attach a record locator
    pub fn with_rid(mut self, rid: RecordId) -> Self {
        self.rid = Some(rid);
        self
    }

    /// Get the schema
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Where this row is stored, if it has been read from a heap file
    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Get a value by index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if tuple is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that the values match `schema` in count and kind
    pub fn conforms_to(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.column_count() {
            return Err(Error::IncompatibleTypes(format!(
                "row {} has {} values, schema ({}) has {} fields",
                self,
                self.values.len(),
                schema,
                schema.column_count()
            )));
        }
        for (value, column) in self.values.iter().zip(schema.columns()) {
            if value.data_type() != column.data_type {
                return Err(Error::IncompatibleTypes(format!(
                    "value {} is {}, field {} is {}",
                    value,
                    value.data_type(),
                    column,
                    column.data_type
                )));
            }
        }
        Ok(())
    }

    /// Same values under another schema (used when a row moves into a file)
    pub fn with_schema(self, schema: Arc<Schema>) -> Result<Tuple> {
        self.conforms_to(&schema)?;
        Ok(Tuple::new(schema, self.values))
    }

    /// Value of the field described by `column`
    pub fn field(&self, column: &Column) -> Result<&Value> {
        let idx = self.schema.index_of(column)?;
        self.values.get(idx).ok_or_else(|| {
            Error::IncompatibleTypes(format!("row {} has no value for {}", self, column))
        })
    }

    /// Project onto `columns`, looked up by name and qualifier
    pub fn project(&self, columns: &[Column]) -> Result<Tuple> {
        let mut out_columns = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let idx = self.schema.index_of(column)?;
            out_columns.push(self.schema.columns()[idx].clone());
            values.push(self.field(column)?.clone());
        }
        Ok(Tuple::new(Arc::new(Schema::from_columns(out_columns)), values))
    }

    /// Concatenate two tuples; the result has no locator
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let schema = Arc::new(self.schema.merge(&other.schema));
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Tuple::new(schema, values)
    }

    /// Nil-safe concatenation: a missing side yields the other one unchanged
    pub fn join(left: Option<&Tuple>, right: Option<&Tuple>) -> Option<Tuple> {
        match (left, right) {
            (Some(l), Some(r)) => Some(l.concat(r)),
            (Some(t), None) | (None, Some(t)) => Some(t.clone()),
            (None, None) => None,
        }
    }

    /// Write the values in slot layout
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for value in &self.values {
            value.write_to(out)?;
        }
        Ok(())
    }

    /// Read one row of `schema` in slot layout
    pub fn read_from<R: Read>(input: &mut R, schema: &Arc<Schema>) -> Result<Tuple> {
        let values = schema
            .data_types()
            .map(|t| Value::read_from(input, t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tuple::new(Arc::clone(schema), values))
    }
}

/// Rows are equal when their values are, regardless of schema names or
/// locators
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}
