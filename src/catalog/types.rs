//! Data types for heapdb
//!
//! This module defines the field kinds a row can hold and their on-page
//! widths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of bytes stored for a string field
pub const STRING_LENGTH: usize = 32;

/// Field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    Integer,
    /// String of at most `STRING_LENGTH` bytes
    String,
}

impl DataType {
    /// Number of bytes a field of this type occupies inside a page slot
    pub fn size(&self) -> usize {
        match self {
            DataType::Integer => std::mem::size_of::<i64>(),
            DataType::String => STRING_LENGTH,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::String => write!(f, "STRING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_size() {
        assert_eq!(DataType::Integer.size(), 8);
        assert_eq!(DataType::String.size(), STRING_LENGTH);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(DataType::Integer.to_string(), "INTEGER");
        assert_eq!(DataType::String.to_string(), "STRING");
    }
}
