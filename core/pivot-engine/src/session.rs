//! FILENAME: core/pivot-engine/src/session.rs
//! Pivot Session - The memoizing facade over a dataset.
//!
//! `PivotEngine` owns the records and the most recent valid table. A
//! configuration identical to the one that produced the current table is
//! answered from memory; any other configuration triggers a full
//! recomputation. Drill-down always runs against the configuration of the
//! table currently on display.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashSet, FxHasher};

use crate::definition::PivotConfiguration;
use crate::engine::{calculate_pivot, DrillDownResolver};
use crate::error::PivotResult;
use crate::logging::{log_debug, log_info, log_warn};
use crate::record::{PivotSource, Record};
use crate::view::{DrillDownQuery, DrillDownResult, PivotTable};

/// The last successfully computed table and what it was computed from.
#[derive(Debug, Clone)]
struct MemoEntry {
    fingerprint: u64,
    version: u64,
    table: Arc<PivotTable>,
}

/// A dataset plus the table last calculated over it.
#[derive(Debug)]
pub struct PivotEngine {
    source: PivotSource,
    version: u64,
    memo: Option<MemoEntry>,
}

impl PivotEngine {
    pub fn new(source: PivotSource) -> Self {
        PivotEngine {
            source,
            version: 0,
            memo: None,
        }
    }

    pub fn source(&self) -> &PivotSource {
        &self.source
    }

    /// Incremented every time the dataset is replaced.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Swaps in a new dataset. The current table no longer describes it and
    /// is dropped.
    pub fn replace_source(&mut self, source: PivotSource) {
        self.source = source;
        self.version += 1;
        self.memo = None;
        log_info!(
            "PIVOT",
            "dataset replaced: version={} records={}",
            self.version,
            self.source.record_count()
        );
    }

    /// Calculates (or recalls) the table for `configuration`.
    ///
    /// On a validation error the previous table stays current.
    pub fn calculate(&mut self, configuration: &PivotConfiguration) -> PivotResult<Arc<PivotTable>> {
        let fingerprint = fingerprint(self.version, configuration);

        if let Some(memo) = &self.memo {
            if memo.fingerprint == fingerprint
                && memo.version == self.version
                && memo.table.configuration == *configuration
            {
                log_debug!("PIVOT", "memo hit: fingerprint={:016x}", fingerprint);
                return Ok(Arc::clone(&memo.table));
            }
        }

        let mut table = match calculate_pivot(configuration, &self.source) {
            Ok(table) => table,
            Err(e) => {
                log_warn!("PIVOT", "configuration rejected: {}", e);
                return Err(e);
            }
        };
        table.version = self.version;

        log_info!(
            "PIVOT",
            "recomputed: rows={} columns={} filtered={} mode={}",
            table.rows.len(),
            table.columns.len(),
            table.filtered_record_count,
            table.calculation_mode.label()
        );

        let table = Arc::new(table);
        self.memo = Some(MemoEntry {
            fingerprint,
            version: self.version,
            table: Arc::clone(&table),
        });
        Ok(table)
    }

    /// The table last produced by `calculate`, if any.
    pub fn current_table(&self) -> Option<Arc<PivotTable>> {
        self.memo.as_ref().map(|m| Arc::clone(&m.table))
    }

    /// Records behind a displayed section of the current table.
    /// Empty when nothing has been calculated yet.
    pub fn resolve(&self, section_key: &str, column_value: Option<&str>) -> Vec<&Record> {
        match &self.memo {
            Some(memo) => DrillDownResolver::new(&self.source.records, &memo.table.configuration)
                .resolve(section_key, column_value),
            None => Vec::new(),
        }
    }

    /// Drill-down against the current table.
    pub fn drill_down(&self, query: &DrillDownQuery, max_records: usize) -> DrillDownResult {
        match &self.memo {
            Some(memo) => DrillDownResolver::new(&self.source.records, &memo.table.configuration)
                .drill_down(query, &self.source.headers, max_records),
            None => {
                let mut result = DrillDownResult::new(query.clone(), self.source.headers.clone());
                result.max_records = max_records;
                result
            }
        }
    }

    /// Rows of the current table still drawn with `collapsed` sections folded.
    pub fn visible_rows(&self, collapsed: &FxHashSet<String>) -> Vec<usize> {
        self.memo
            .as_ref()
            .map(|m| m.table.visible_rows(collapsed))
            .unwrap_or_default()
    }
}

fn fingerprint(version: u64, configuration: &PivotConfiguration) -> u64 {
    let mut hasher = FxHasher::default();
    version.hash(&mut hasher);
    configuration.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ColumnRole, PivotError};
    use crate::record::ScalarValue;

    fn source(rows: &[(&str, &str, f64)]) -> PivotSource {
        PivotSource::new(
            vec!["Region".into(), "Product".into(), "Sales".into()],
            rows.iter()
                .map(|(region, product, sales)| {
                    Record::from_pairs([
                        ("Region", ScalarValue::from(*region)),
                        ("Product", (*product).into()),
                        ("Sales", (*sales).into()),
                    ])
                })
                .collect(),
        )
    }

    fn config() -> PivotConfiguration {
        PivotConfiguration::new(["Region"], "Product")
            .with_value_column("Sales")
            .with_grand_total(true)
    }

    #[test]
    fn test_identical_configuration_is_memoized() {
        let mut engine = PivotEngine::new(source(&[("East", "A", 1.0), ("West", "B", 2.0)]));
        let first = engine.calculate(&config()).unwrap();
        let second = engine.calculate(&config()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let third = engine.calculate(&config().with_subtotals(true)).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.rows, third.rows);
    }

    #[test]
    fn test_invalid_configuration_keeps_previous_table() {
        let mut engine = PivotEngine::new(source(&[("East", "A", 1.0)]));
        let valid = engine.calculate(&config()).unwrap();

        let err = engine
            .calculate(&config().with_value_column("Profit"))
            .unwrap_err();
        assert_eq!(
            err,
            PivotError::UnknownColumn {
                role: ColumnRole::ValueColumn,
                name: "Profit".to_string(),
            }
        );
        let current = engine.current_table().unwrap();
        assert!(Arc::ptr_eq(&valid, &current));
    }

    #[test]
    fn test_replace_source_invalidates_memo() {
        let mut engine = PivotEngine::new(source(&[("East", "A", 1.0)]));
        let before = engine.calculate(&config()).unwrap();
        assert_eq!(before.version, 0);

        engine.replace_source(source(&[("East", "A", 5.0)]));
        assert!(engine.current_table().is_none());
        assert!(engine.resolve("", None).is_empty());

        let after = engine.calculate(&config()).unwrap();
        assert_eq!(after.version, 1);
        assert_eq!(after.rows[0].values.total, 5.0);
    }

    #[test]
    fn test_drill_down_uses_current_configuration() {
        let mut engine = PivotEngine::new(source(&[
            ("East", "A", 1.0),
            ("East", "B", 2.0),
            ("West", "A", 3.0),
        ]));
        assert_eq!(engine.drill_down(&DrillDownQuery::subtotal("East"), 10).total_count, 0);

        engine.calculate(&config()).unwrap();
        assert_eq!(engine.resolve("East", None).len(), 2);
        assert_eq!(engine.resolve("East", Some("B")).len(), 1);

        engine.calculate(&config().with_filter("Product", "A")).unwrap();
        assert_eq!(engine.resolve("East", None).len(), 1);
        let result = engine.drill_down(&DrillDownQuery::grand_total(None), 10);
        assert_eq!(result.source_rows, vec![0, 2]);
        assert!(!result.is_truncated);
    }

    #[test]
    fn test_visible_rows_before_and_after_calculation() {
        let mut engine = PivotEngine::new(source(&[("East", "A", 1.0)]));
        let collapsed = FxHashSet::default();
        assert!(engine.visible_rows(&collapsed).is_empty());

        engine.calculate(&config()).unwrap();
        assert_eq!(engine.visible_rows(&collapsed), vec![0, 1]);
    }

    #[test]
    fn test_fingerprint_depends_on_version() {
        assert_ne!(fingerprint(0, &config()), fingerprint(1, &config()));
        assert_eq!(fingerprint(3, &config()), fingerprint(3, &config()));
    }
}
