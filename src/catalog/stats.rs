//! Table statistics
//!
//! Planners ask a table's statistics object for cost and cardinality
//! estimates. A table may have none, in which case fixed defaults apply.

use crate::catalog::Column;
use crate::error::Result;
use crate::executor::Operator;
use crate::storage::{CmpOp, HeapFile, Value};
use crate::transaction::TransactionId;

/// Scan cost assumed for a table without statistics
pub const DEFAULT_SCAN_COST: f64 = 1000.0;

/// Row count assumed for a table without statistics
pub const DEFAULT_CARDINALITY: usize = 100_000;

/// Cost charged per page read
pub const COST_PER_PAGE: usize = 1000;

/// Estimates supplied per table
pub trait TableStats: Send + Sync + std::fmt::Debug {
    /// Cost of a full scan
    fn estimate_scan_cost(&self) -> f64;

    /// Rows left after a predicate of the given selectivity
    fn estimate_cardinality(&self, selectivity: f64) -> usize;

    /// Fraction of rows for which `field op value` holds
    fn estimate_selectivity(&self, field: &Column, op: CmpOp, value: &Value) -> f64;
}

/// Scan cost from `stats`, or the default when a table has none
pub fn scan_cost(stats: Option<&dyn TableStats>) -> f64 {
    stats.map_or(DEFAULT_SCAN_COST, |s| s.estimate_scan_cost())
}

/// Cardinality from `stats`, or the default when a table has none
pub fn cardinality(stats: Option<&dyn TableStats>, selectivity: f64) -> usize {
    stats.map_or(DEFAULT_CARDINALITY, |s| s.estimate_cardinality(selectivity))
}

/// Page and row counts of a heap file
///
/// No value histograms are kept, so every predicate is assumed to select
/// all rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub pages: usize,
    pub rows: usize,
}

impl HeapStats {
    /// Count pages and rows with a full scan under `tid`
    pub fn compute(heap: &HeapFile, tid: TransactionId) -> Result<Self> {
        let pages = heap.page_count()?;
        let mut rows = 0;
        for row in heap.iterator(tid)? {
            row?;
            rows += 1;
        }
        Ok(Self { pages, rows })
    }
}

impl TableStats for HeapStats {
    fn estimate_scan_cost(&self) -> f64 {
        (self.pages * COST_PER_PAGE) as f64
    }

    fn estimate_cardinality(&self, selectivity: f64) -> usize {
        (self.rows as f64 * selectivity.clamp(0.0, 1.0)) as usize
    }

    fn estimate_selectivity(&self, _field: &Column, _op: CmpOp, _value: &Value) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    #[test]
    fn test_defaults_without_stats() {
        assert_eq!(scan_cost(None), DEFAULT_SCAN_COST);
        assert_eq!(cardinality(None, 0.5), DEFAULT_CARDINALITY);
    }

    #[test]
    fn test_heap_stats_estimates() {
        let stats = HeapStats { pages: 3, rows: 300 };
        assert_eq!(scan_cost(Some(&stats)), 3000.0);
        assert_eq!(cardinality(Some(&stats), 0.5), 150);
        assert_eq!(cardinality(Some(&stats), 2.0), 300);

        let age = Column::new("age", DataType::Integer);
        assert_eq!(
            stats.estimate_selectivity(&age, CmpOp::Gt, &Value::Integer(25)),
            1.0
        );
    }
}
