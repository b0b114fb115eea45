//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot View - Renderable output for rendering and export collaborators.
//!
//! Every row separates its bookkeeping (`RowMeta`: kind, depth, path,
//! section key) from its displayable values (`RowValues`: label, cells,
//! total). Consumers that only want the display part read `values`.
//!
//! Expand/collapse is a display concern layered on top: `visible_rows`
//! answers which rows to draw and never touches the row sequence.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cache::{section_key, CompositeKey};
use crate::definition::{CalculationMode, PivotConfiguration};

/// Label of the grand total row.
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

/// Appended to a node's own value to label its subtotal row.
pub const SUBTOTAL_SUFFIX: &str = " Subtotal";

// ============================================================================
// ROWS
// ============================================================================

/// Types of rows in the flattened table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    /// One complete composite key.
    Data,
    /// Summary of an internal hierarchy node.
    Subtotal,
    /// Summary of every filtered record.
    GrandTotal,
}

/// Bookkeeping for a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    pub kind: RowKind,

    /// Nesting depth (0 = outermost).
    pub depth: usize,

    /// Dimension values from the root to this row's node.
    /// Empty for the grand total.
    pub path: CompositeKey,

    /// `path` joined with the section key separator.
    pub section_key: String,
}

/// Displayable content of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowValues {
    pub label: String,

    /// One value per output column, in the calculation mode's units.
    pub cells: Vec<f64>,

    /// Row total, same units.
    pub total: f64,
}

/// A single output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedRow {
    pub meta: RowMeta,
    pub values: RowValues,
}

impl FlattenedRow {
    pub fn data(path: &[String], cells: Vec<f64>, total: f64) -> Self {
        let label = path.last().cloned().unwrap_or_default();
        FlattenedRow::with_kind(RowKind::Data, path, label, cells, total)
    }

    pub fn subtotal(path: &[String], cells: Vec<f64>, total: f64) -> Self {
        let label = format!("{}{}", path.last().map(String::as_str).unwrap_or(""), SUBTOTAL_SUFFIX);
        FlattenedRow::with_kind(RowKind::Subtotal, path, label, cells, total)
    }

    pub fn grand_total(cells: Vec<f64>, total: f64) -> Self {
        FlattenedRow::with_kind(RowKind::GrandTotal, &[], GRAND_TOTAL_LABEL.to_string(), cells, total)
    }

    fn with_kind(kind: RowKind, path: &[String], label: String, cells: Vec<f64>, total: f64) -> Self {
        FlattenedRow {
            meta: RowMeta {
                kind,
                depth: path.len().saturating_sub(1),
                path: path.iter().cloned().collect(),
                section_key: section_key(path),
            },
            values: RowValues { label, cells, total },
        }
    }

    pub fn kind(&self) -> RowKind {
        self.meta.kind
    }

    pub fn label(&self) -> &str {
        &self.values.label
    }

    pub fn section_key(&self) -> &str {
        &self.meta.section_key
    }

    pub fn depth(&self) -> usize {
        self.meta.depth
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// The complete result of one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// Sorted distinct column-dimension values.
    pub columns: Vec<String>,

    /// Data, subtotal and grand total rows in traversal order.
    pub rows: Vec<FlattenedRow>,

    /// Active row dimensions, outer to inner.
    pub row_dimensions: Vec<String>,

    pub column_dimension: Option<String>,

    pub calculation_mode: CalculationMode,

    /// Records that passed the filter.
    pub filtered_record_count: usize,

    /// The configuration this table was built from.
    pub configuration: PivotConfiguration,

    /// Dataset version, for cache coherency with the caller.
    pub version: u64,
}

impl PivotTable {
    /// A table with no columns and no rows.
    pub fn empty(configuration: &PivotConfiguration) -> Self {
        PivotTable {
            columns: Vec::new(),
            rows: Vec::new(),
            row_dimensions: configuration
                .active_row_dimensions()
                .into_iter()
                .map(str::to_string)
                .collect(),
            column_dimension: configuration.active_column_dimension().map(str::to_string),
            calculation_mode: configuration.calculation_mode,
            filtered_record_count: 0,
            configuration: configuration.clone(),
            version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `row` in `column`, if the column exists.
    pub fn value(&self, row: &FlattenedRow, column: &str) -> Option<f64> {
        self.column_index(column)
            .and_then(|i| row.values.cells.get(i).copied())
    }

    pub fn grand_total(&self) -> Option<&FlattenedRow> {
        self.rows.iter().find(|r| r.kind() == RowKind::GrandTotal)
    }

    pub fn data_rows(&self) -> impl Iterator<Item = &FlattenedRow> {
        self.rows.iter().filter(|r| r.kind() == RowKind::Data)
    }

    pub fn subtotal_rows(&self) -> impl Iterator<Item = &FlattenedRow> {
        self.rows.iter().filter(|r| r.kind() == RowKind::Subtotal)
    }

    /// Finds the row of `kind` with the given section key.
    pub fn row_by_section(&self, kind: RowKind, section_key: &str) -> Option<&FlattenedRow> {
        self.rows
            .iter()
            .find(|r| r.kind() == kind && r.section_key() == section_key)
    }

    /// Indices of the rows still drawn when `collapsed` sections are folded.
    ///
    /// A collapsed section hides every row strictly beneath it. Its own
    /// subtotal row and the grand total stay visible.
    pub fn visible_rows(&self, collapsed: &FxHashSet<String>) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !is_hidden(row, collapsed))
            .map(|(i, _)| i)
            .collect()
    }
}

fn is_hidden(row: &FlattenedRow, collapsed: &FxHashSet<String>) -> bool {
    if collapsed.is_empty() {
        return false;
    }
    let path = &row.meta.path;
    // A subtotal row belongs to its own section, so only proper prefixes count.
    let ancestors = match row.kind() {
        RowKind::GrandTotal => return false,
        RowKind::Subtotal | RowKind::Data => path.len().saturating_sub(1),
    };
    (1..=ancestors).any(|len| collapsed.contains(&section_key(&path[..len])))
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

/// Address of a displayed cell for drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrillDownQuery {
    /// Section key of the data row, subtotal row, or "" for the grand total.
    pub section_key: String,

    /// Column value of the cell, or `None` for the whole row.
    pub column_value: Option<String>,
}

impl DrillDownQuery {
    /// A data cell.
    pub fn cell(section_key: impl Into<String>, column_value: impl Into<String>) -> Self {
        DrillDownQuery {
            section_key: section_key.into(),
            column_value: Some(column_value.into()),
        }
    }

    /// A whole subtotal section, across all columns.
    pub fn subtotal(section_key: impl Into<String>) -> Self {
        DrillDownQuery {
            section_key: section_key.into(),
            column_value: None,
        }
    }

    /// The row-total cell of any row.
    pub fn row_total(row: &FlattenedRow) -> Self {
        DrillDownQuery::subtotal(row.section_key())
    }

    /// A grand total cell, or the whole filtered record set.
    pub fn grand_total(column_value: Option<String>) -> Self {
        DrillDownQuery {
            section_key: String::new(),
            column_value,
        }
    }
}

/// Result of a drill-down operation (showing detail records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownResult {
    /// The query that was resolved.
    pub query: DrillDownQuery,

    /// Column headers from the source data.
    pub headers: Vec<String>,

    /// Indices of the matching records in the source dataset.
    pub source_rows: Vec<usize>,

    /// Total count of matching records.
    pub total_count: usize,

    /// Whether `source_rows` stops short of `total_count`.
    pub is_truncated: bool,

    /// Maximum records that were fetched.
    pub max_records: usize,
}

impl DrillDownResult {
    /// Default cap on returned source rows.
    pub const DEFAULT_MAX_RECORDS: usize = 1000;

    pub fn new(query: DrillDownQuery, headers: Vec<String>) -> Self {
        DrillDownResult {
            query,
            headers,
            source_rows: Vec::new(),
            total_count: 0,
            is_truncated: false,
            max_records: Self::DEFAULT_MAX_RECORDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    fn sample_table() -> PivotTable {
        let config = PivotConfiguration::new(["Region", "Product"], "Quarter");
        let mut table = PivotTable::empty(&config);
        table.columns = vec!["Q1".to_string()];
        table.rows = vec![
            FlattenedRow::data(&path(&["East", "A"]), vec![1.0], 1.0),
            FlattenedRow::data(&path(&["East", "B"]), vec![2.0], 2.0),
            FlattenedRow::subtotal(&path(&["East"]), vec![3.0], 3.0),
            FlattenedRow::data(&path(&["West", "A"]), vec![4.0], 4.0),
            FlattenedRow::subtotal(&path(&["West"]), vec![4.0], 4.0),
            FlattenedRow::grand_total(vec![7.0], 7.0),
        ];
        table
    }

    #[test]
    fn test_row_constructors() {
        let data = FlattenedRow::data(&path(&["East", "A"]), vec![1.0], 1.0);
        assert_eq!(data.label(), "A");
        assert_eq!(data.depth(), 1);
        assert_eq!(data.section_key(), "East|A");

        let subtotal = FlattenedRow::subtotal(&path(&["East"]), vec![1.0], 1.0);
        assert_eq!(subtotal.label(), "East Subtotal");
        assert_eq!(subtotal.depth(), 0);
        assert_eq!(subtotal.section_key(), "East");

        let total = FlattenedRow::grand_total(vec![1.0], 1.0);
        assert_eq!(total.label(), GRAND_TOTAL_LABEL);
        assert_eq!(total.section_key(), "");
        assert!(total.meta.path.is_empty());
    }

    #[test]
    fn test_table_lookups() {
        let table = sample_table();
        assert_eq!(table.data_rows().count(), 3);
        assert_eq!(table.subtotal_rows().count(), 2);
        let west = table.row_by_section(RowKind::Subtotal, "West").unwrap();
        assert_eq!(table.value(west, "Q1"), Some(4.0));
        assert_eq!(table.value(west, "Q9"), None);
        assert_eq!(table.grand_total().unwrap().values.total, 7.0);
        assert_eq!(table.row_dimensions, vec!["Region", "Product"]);
    }

    #[test]
    fn test_visible_rows_with_collapsed_section() {
        let table = sample_table();
        let mut collapsed = FxHashSet::default();
        assert_eq!(table.visible_rows(&collapsed), vec![0, 1, 2, 3, 4, 5]);

        collapsed.insert("East".to_string());
        assert_eq!(table.visible_rows(&collapsed), vec![2, 3, 4, 5]);
        // Collapsing never mutates the underlying rows.
        assert_eq!(table.rows.len(), 6);
    }

    #[test]
    fn test_drill_down_query_constructors() {
        let row = FlattenedRow::subtotal(&path(&["East"]), vec![1.0], 1.0);
        assert_eq!(DrillDownQuery::row_total(&row), DrillDownQuery::subtotal("East"));
        assert_eq!(DrillDownQuery::cell("East", "B").column_value.as_deref(), Some("B"));
        assert_eq!(DrillDownQuery::grand_total(None).section_key, "");
    }

    #[test]
    fn test_table_serializes_to_json() {
        let table = sample_table();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rows"][2]["meta"]["kind"], "Subtotal");
        assert_eq!(json["rows"][2]["values"]["label"], "East Subtotal");
        assert_eq!(json["configuration"]["calculation_mode"], "sum");
    }
}
