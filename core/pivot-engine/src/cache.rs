//! FILENAME: core/pivot-engine/src/cache.rs
//! Pivot Cache - Composite keys and the raw aggregation matrix.
//!
//! The cache is designed for:
//! - A single O(n) pass over the filtered records
//! - Purely additive storage (sum + contributing record count per cell)
//! - Deterministic iteration (keys and column values come out sorted)
//!
//! Averages and percentages are never stored here. They are derived views
//! computed from the additive accumulators at emission time, which is what
//! keeps subtotal rollups exact.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::definition::{ActiveConfig, CalculationMode};
use crate::record::{Record, ScalarValue};

// ============================================================================
// KEY NORMALIZATION
// ============================================================================

/// Stand-in for null, absent and blank values in keys and column values.
pub const EMPTY_SENTINEL: &str = "Empty/Null";

/// Joins path components into a section key.
pub const SECTION_KEY_SEPARATOR: &str = "|";

/// Ordered, normalized row-dimension values. Most pivots nest a handful of
/// levels, so the components stay inline.
pub type CompositeKey = SmallVec<[String; 4]>;

/// Normalizes a record value for grouping.
/// Absent, empty and whitespace-only values become `EMPTY_SENTINEL`.
pub fn normalize_value(value: Option<&ScalarValue>) -> String {
    match value {
        None => EMPTY_SENTINEL.to_string(),
        Some(v) if v.is_blank() => EMPTY_SENTINEL.to_string(),
        Some(ScalarValue::Text(s)) => s.trim().to_string(),
        Some(v) => v.to_string(),
    }
}

/// Normalizes free text the same way record values are normalized.
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        EMPTY_SENTINEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the composite key of a record for the given row dimensions.
pub fn composite_key(record: &Record, row_dimensions: &[&str]) -> CompositeKey {
    row_dimensions
        .iter()
        .map(|dim| normalize_value(record.get(dim)))
        .collect()
}

/// Precedes a separator or escape character that is part of a component.
pub const SECTION_KEY_ESCAPE: char = '\\';

/// Joins a dimension path into its section key.
///
/// Components are escaped, so distinct paths always get distinct keys.
/// Components without a separator or backslash appear verbatim.
pub fn section_key<S: AsRef<str>>(path: &[S]) -> String {
    let mut key = String::new();
    for (i, part) in path.iter().enumerate() {
        if i > 0 {
            key.push_str(SECTION_KEY_SEPARATOR);
        }
        push_escaped(&mut key, part.as_ref());
    }
    key
}

/// Appends one key component to a section key, escaped.
pub fn push_escaped(key: &mut String, part: &str) {
    for ch in part.chars() {
        if ch == SECTION_KEY_ESCAPE || SECTION_KEY_SEPARATOR.starts_with(ch) {
            key.push(SECTION_KEY_ESCAPE);
        }
        key.push(ch);
    }
}

/// Contribution of one record to its cell.
///
/// Count mode always contributes 1. Otherwise a numeric value-column entry
/// contributes its value, and everything else (no value column, blank or
/// non-numeric text) contributes 1.
pub fn contribution(record: &Record, value_column: Option<&str>, mode: CalculationMode) -> f64 {
    if mode == CalculationMode::Count {
        return 1.0;
    }
    value_column
        .and_then(|column| record.get(column))
        .and_then(ScalarValue::as_number)
        .unwrap_or(1.0)
}

// ============================================================================
// CELL ACCUMULATOR
// ============================================================================

/// Additive state for one cell: the sum of contributions and the number of
/// records that contributed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellAccumulator {
    pub sum: f64,
    pub count: u64,
}

impl CellAccumulator {
    pub fn new() -> Self {
        CellAccumulator::default()
    }

    pub fn add(&mut self, amount: f64) {
        self.sum += amount;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &CellAccumulator) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Folds a set of accumulators into one.
    pub fn merged<'a, I>(accumulators: I) -> CellAccumulator
    where
        I: IntoIterator<Item = &'a CellAccumulator>,
    {
        let mut total = CellAccumulator::new();
        for acc in accumulators {
            total.merge(acc);
        }
        total
    }

    /// Projects the raw state into the units of `mode`.
    ///
    /// `grand_sum` is the sum of the whole matrix and is only read in
    /// percentage mode. Division by zero yields 0.
    pub fn compute(&self, mode: CalculationMode, grand_sum: f64) -> f64 {
        match mode {
            CalculationMode::Sum | CalculationMode::Count => self.sum,
            CalculationMode::Average => {
                if self.count > 0 {
                    self.sum / (self.count as f64)
                } else {
                    0.0
                }
            }
            CalculationMode::Percentage => {
                if grand_sum != 0.0 {
                    self.sum / grand_sum * 100.0
                } else {
                    0.0
                }
            }
        }
    }
}

// ============================================================================
// AGGREGATION MATRIX
// ============================================================================

/// Composite key -> one accumulator per output column.
#[derive(Debug, Clone, Default)]
pub struct AggregationMatrix {
    /// Sorted distinct column-dimension values.
    pub columns: Vec<String>,

    /// Dense rows, indexed like `columns`, ordered by composite key.
    pub rows: BTreeMap<CompositeKey, Vec<CellAccumulator>>,

    /// Number of records that passed the filter.
    pub record_count: usize,
}

impl AggregationMatrix {
    /// Aggregates `records` in one pass. Records failing the filter are skipped.
    pub fn build<'r, I>(records: I, config: &ActiveConfig<'_>) -> AggregationMatrix
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut sparse: FxHashMap<CompositeKey, FxHashMap<String, CellAccumulator>> =
            FxHashMap::default();
        let mut column_values: BTreeSet<String> = BTreeSet::new();
        let mut record_count = 0;

        for record in records {
            if !config.passes_filter(record) {
                continue;
            }
            record_count += 1;

            let key = composite_key(record, &config.row_dimensions);
            let column = normalize_value(record.get(config.column_dimension));
            let amount = contribution(record, config.value_column, config.mode);

            if !column_values.contains(&column) {
                column_values.insert(column.clone());
            }
            sparse
                .entry(key)
                .or_default()
                .entry(column)
                .or_default()
                .add(amount);
        }

        let columns: Vec<String> = column_values.into_iter().collect();
        let rows = sparse
            .into_iter()
            .map(|(key, cells)| {
                let dense = columns
                    .iter()
                    .map(|c| cells.get(c).copied().unwrap_or_default())
                    .collect();
                (key, dense)
            })
            .collect();

        AggregationMatrix {
            columns,
            rows,
            record_count,
        }
    }

    /// Accumulators for one composite key.
    pub fn row(&self, key: &CompositeKey) -> Option<&[CellAccumulator]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.binary_search_by(|c| c.as_str().cmp(column)).ok()
    }

    /// Per-column totals over the whole matrix.
    pub fn column_totals(&self) -> Vec<CellAccumulator> {
        let mut totals = vec![CellAccumulator::new(); self.columns.len()];
        for cells in self.rows.values() {
            for (total, cell) in totals.iter_mut().zip(cells) {
                total.merge(cell);
            }
        }
        totals
    }

    /// The single accumulator covering every filtered record.
    pub fn grand_total(&self) -> CellAccumulator {
        CellAccumulator::merged(self.rows.values().flatten())
    }
}
