//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use heapdb::catalog::{Column, DataType, Schema};
use heapdb::executor::Operator;
use heapdb::storage::{BufferPool, HeapFile, Tuple, Value};
use heapdb::transaction::TransactionId;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; filter with RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// (name STRING, age INTEGER)
pub fn people_schema() -> Arc<Schema> {
    Arc::new(Schema::from_columns(vec![
        Column::new("name", DataType::String),
        Column::new("age", DataType::Integer),
    ]))
}

pub fn person(name: &str, age: i64) -> Tuple {
    Tuple::new(people_schema(), vec![Value::from(name), Value::Integer(age)])
}

/// A scratch directory and a pool shared by the files opened in it
pub struct Fixture {
    pub dir: TempDir,
    pub pool: Arc<BufferPool>,
}

impl Fixture {
    pub fn new(capacity: usize) -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
            pool: Arc::new(BufferPool::new(capacity)),
        }
    }

    /// Open `<name>.dat` with the people schema qualified by `name`
    pub fn people(&self, name: &str) -> Arc<HeapFile> {
        let schema = Arc::new(people_schema().with_qualifier(name));
        self.open(name, schema)
    }

    pub fn open(&self, name: &str, schema: Arc<Schema>) -> Arc<HeapFile> {
        let path = self.dir.path().join(format!("{}.dat", name));
        Arc::new(HeapFile::open(path, schema, Arc::clone(&self.pool)).unwrap())
    }
}

/// Insert `rows` into `heap` under `tid`
pub fn insert_people(heap: &HeapFile, tid: TransactionId, rows: &[(&str, i64)]) {
    for (name, age) in rows {
        heap.insert_row(person(name, *age), tid).unwrap();
    }
}

/// Drain a fresh iterator of `op`, panicking on the first error
pub fn collect_rows(op: &dyn Operator, tid: TransactionId) -> Vec<Tuple> {
    op.iterator(tid)
        .unwrap()
        .collect::<heapdb::Result<Vec<_>>>()
        .unwrap()
}
