//! Engine configuration
//!
//! Sizing knobs for the buffer pool and operators, plus where table files
//! live. Can be built in code or loaded from JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default number of pages the buffer pool may cache
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 64;

/// Default number of left-side rows a join holds in memory per block
pub const DEFAULT_JOIN_BUFFER_ROWS: usize = 10_000;

/// Extension used for heap files under the data directory
pub const TABLE_FILE_EXTENSION: &str = "dat";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding one heap file per table
    pub data_dir: PathBuf,
    /// Buffer pool capacity in pages
    pub buffer_pool_pages: usize,
    /// Join block size in rows
    pub join_buffer_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            buffer_pool_pages: DEFAULT_BUFFER_POOL_PAGES,
            join_buffer_rows: DEFAULT_JOIN_BUFFER_ROWS,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the buffer pool capacity
    pub fn buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    /// Set the join block size
    pub fn join_buffer_rows(mut self, rows: usize) -> Self {
        self.join_buffer_rows = rows;
        self
    }

    /// Parse a config from JSON text; missing keys keep their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Path of the heap file backing `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", table, TABLE_FILE_EXTENSION))
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_pool_pages == 0 {
            return Err(crate::Error::Config(
                "buffer_pool_pages must be at least 1".to_string(),
            ));
        }
        if self.join_buffer_rows == 0 {
            return Err(crate::Error::Config(
                "join_buffer_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
