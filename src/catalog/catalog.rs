//! System Catalog for heapdb
//!
//! Maps table names to their heap files and optional statistics. Each table
//! is stored in `<data_dir>/<name>.dat`; its schema is qualified with the
//! table name so that joined rows can be told apart.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::schema::Schema;
use super::stats::TableStats;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::storage::{BufferPool, HeapFile};

/// Catalog entry
#[derive(Debug)]
struct TableEntry {
    file: Arc<HeapFile>,
    stats: Option<Arc<dyn TableStats>>,
}

/// System Catalog - name to heap file registry
#[derive(Debug)]
pub struct Catalog {
    config: EngineConfig,
    pool: Arc<BufferPool>,
    tables: RwLock<HashMap<String, TableEntry>>,
}

impl Catalog {
    /// Create an empty catalog whose tables share `pool`
    pub fn new(config: EngineConfig, pool: Arc<BufferPool>) -> Self {
        Self {
            config,
            pool,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Register a table, opening (or creating) its heap file
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<HeapFile>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }

        std::fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.table_path(name);
        let schema = Arc::new(schema.with_qualifier(name));
        let file = Arc::new(HeapFile::open(&path, schema, Arc::clone(&self.pool))?);
        debug!(table = name, path = %path.display(), "created table");

        tables.insert(
            name.to_string(),
            TableEntry {
                file: Arc::clone(&file),
                stats: None,
            },
        );
        Ok(file)
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    /// Forget a table; its file stays on disk
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    /// Registered table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Name of the table that owns `field`
    ///
    /// With a table given, the field must exist there. Without one, exactly
    /// one registered table may have a field of that name.
    pub fn resolve_column(&self, table: Option<&str>, field: &str) -> Result<String> {
        let tables = self.tables.read();

        if let Some(table) = table {
            let entry = tables
                .get(table)
                .ok_or_else(|| Error::NoSuchTable(table.to_string()))?;
            if entry.file.schema().column_names().contains(&field) {
                return Ok(table.to_string());
            }
            return Err(Error::IncompatibleTypes(format!(
                "table '{}' has no field '{}'",
                table, field
            )));
        }

        let mut owners: Vec<&String> = tables
            .iter()
            .filter(|(_, entry)| entry.file.schema().column_names().contains(&field))
            .map(|(name, _)| name)
            .collect();
        owners.sort();

        match owners.as_slice() {
            [owner] => Ok((*owner).clone()),
            [] => Err(Error::IncompatibleTypes(format!(
                "no table has a field '{}'",
                field
            ))),
            _ => Err(Error::AmbiguousName(field.to_string())),
        }
    }

    /// Attach statistics to a table
    pub fn set_stats(&self, name: &str, stats: Arc<dyn TableStats>) -> Result<()> {
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))?;
        entry.stats = Some(stats);
        Ok(())
    }

    /// Statistics of a table, if any were attached
    pub fn stats(&self, name: &str) -> Result<Option<Arc<dyn TableStats>>> {
        self.tables
            .read()
            .get(name)
            .map(|entry| entry.stats.clone())
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }
}
