//! Schema definitions for heapdb
//!
//! A `Schema` is the ordered list of field descriptors shared by every row
//! an operator produces.

use super::types::DataType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Owning table (or alias), used only to disambiguate lookups
    pub table: Option<String>,
    /// Data type
    pub data_type: DataType,
}

impl Column {
    /// Create an unqualified column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            table: None,
            data_type,
        }
    }

    /// Set the table qualifier
    pub fn qualified(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Row schema - ordered field descriptors
///
/// Two schemas are equal when their ordered kind sequences are equal;
/// names and qualifiers do not take part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Create a schema from a list of columns
    pub fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get column by index
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Field kinds in order
    pub fn data_types(&self) -> impl Iterator<Item = DataType> + '_ {
        self.columns.iter().map(|c| c.data_type)
    }

    /// Bytes one row of this schema occupies in a page slot
    pub fn row_width(&self) -> usize {
        self.data_types().map(|t| t.size()).sum()
    }

    /// Locate `column` by name, using its qualifier when one is given.
    ///
    /// An exact qualifier match wins; otherwise the name alone decides, and a
    /// name shared by several columns is ambiguous. The column found must have
    /// the kind `column` declares.
    pub fn index_of(&self, column: &Column) -> Result<usize> {
        let idx = self.position_of(column)?;
        let found = self.columns[idx].data_type;
        if found != column.data_type {
            return Err(Error::type_mismatch(
                &column.data_type.to_string(),
                &found.to_string(),
            ));
        }
        Ok(idx)
    }

    fn position_of(&self, column: &Column) -> Result<usize> {
        if column.table.is_some() {
            if let Some(idx) = self
                .columns
                .iter()
                .position(|c| c.name == column.name && c.table == column.table)
            {
                return Ok(idx);
            }
        }

        let mut candidates = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == column.name)
            .map(|(i, _)| i);

        match (candidates.next(), candidates.next()) {
            (Some(idx), None) => Ok(idx),
            (Some(_), Some(_)) => Err(Error::AmbiguousName(column.to_string())),
            (None, _) => Err(Error::IncompatibleTypes(format!(
                "field '{}' not found in schema ({})",
                column, self
            ))),
        }
    }

    /// Concatenate two schemas, keeping order and qualifiers
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Copy of this schema with every column qualified by `table`
    pub fn with_qualifier(&self, table: &str) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .cloned()
                .map(|c| c.qualified(table))
                .collect(),
        }
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.data_types().eq(other.data_types())
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c, c.data_type))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
