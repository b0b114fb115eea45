//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot table.
//! These structures are designed to be:
//! - Serializable (sent over the rendering bridge, stored with UI state)
//! - Hashable (the facade memoizes tables keyed by configuration)
//! - Immutable snapshots of user intent
//!
//! `ActiveConfig` is the resolved form used during a calculation: unset
//! dimension slots are dropped and every name is a borrowed `&str`.

use serde::{Deserialize, Serialize};

use crate::cache::{normalize_text, normalize_value};
use crate::error::{ColumnRole, PivotError, PivotResult};
use crate::record::{PivotSource, Record};

// ============================================================================
// CALCULATION MODE
// ============================================================================

/// How cell values are derived from the raw aggregation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    /// Sum of contributions (numeric value, or 1 when non-numeric/unset).
    #[default]
    Sum,
    /// Sum of contributions divided by the number of contributing records.
    Average,
    /// One per record, regardless of the value column.
    Count,
    /// Share of the single global sum, times 100.
    Percentage,
}

impl CalculationMode {
    pub fn label(&self) -> &'static str {
        match self {
            CalculationMode::Sum => "Sum",
            CalculationMode::Average => "Average",
            CalculationMode::Count => "Count",
            CalculationMode::Percentage => "Percentage",
        }
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// A single global filter applied before any aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PivotFilter {
    /// Column the filter tests.
    pub column: String,

    /// Value a record must hold (compared after normalization).
    pub value: String,
}

impl PivotFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        PivotFilter {
            column: column.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// The complete configuration of a pivot table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PivotConfiguration {
    /// Row dimensions, outer to inner. `None` or blank entries are unset slots.
    #[serde(default)]
    pub row_dimensions: Vec<Option<String>>,

    /// Column whose distinct values become the output columns.
    #[serde(default)]
    pub column_dimension: Option<String>,

    /// Column providing contribution amounts. Unset means unit counting.
    #[serde(default)]
    pub value_column: Option<String>,

    #[serde(default)]
    pub calculation_mode: CalculationMode,

    #[serde(default)]
    pub filter: Option<PivotFilter>,

    /// Emit one subtotal row after each internal hierarchy node.
    #[serde(default)]
    pub show_subtotals: bool,

    /// Append a single grand total row.
    #[serde(default)]
    pub show_grand_total: bool,
}

impl PivotConfiguration {
    /// Creates a configuration grouping rows by `row_dimensions` and columns
    /// by `column_dimension`, summing unit contributions.
    pub fn new<I, S>(row_dimensions: I, column_dimension: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PivotConfiguration {
            row_dimensions: row_dimensions.into_iter().map(|d| Some(d.into())).collect(),
            column_dimension: Some(column_dimension.into()),
            ..PivotConfiguration::default()
        }
    }

    pub fn with_row_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.row_dimensions.push(Some(dimension.into()));
        self
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    pub fn with_mode(mut self, mode: CalculationMode) -> Self {
        self.calculation_mode = mode;
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(PivotFilter::new(column, value));
        self
    }

    pub fn with_subtotals(mut self, show: bool) -> Self {
        self.show_subtotals = show;
        self
    }

    pub fn with_grand_total(mut self, show: bool) -> Self {
        self.show_grand_total = show;
        self
    }

    /// Row dimensions that are actually chosen, in order.
    pub fn active_row_dimensions(&self) -> Vec<&str> {
        self.row_dimensions
            .iter()
            .filter_map(|d| set_name(d.as_deref()))
            .collect()
    }

    pub fn active_column_dimension(&self) -> Option<&str> {
        set_name(self.column_dimension.as_deref())
    }

    pub fn active_value_column(&self) -> Option<&str> {
        set_name(self.value_column.as_deref())
    }

    /// Checks every configured column name against the dataset headers.
    ///
    /// Unset slots are never an error; they only produce an empty table.
    pub fn validate(&self, source: &PivotSource) -> PivotResult<()> {
        let mut named: Vec<(ColumnRole, &str)> = self
            .active_row_dimensions()
            .into_iter()
            .map(|d| (ColumnRole::RowDimension, d))
            .collect();
        if let Some(column) = self.active_column_dimension() {
            named.push((ColumnRole::ColumnDimension, column));
        }
        if let Some(value) = self.active_value_column() {
            named.push((ColumnRole::ValueColumn, value));
        }
        if let Some(filter) = &self.filter {
            named.push((ColumnRole::FilterColumn, filter.column.as_str()));
        }

        if named.is_empty() {
            return Ok(());
        }
        if source.headers.is_empty() {
            return Err(PivotError::NoHeaders);
        }

        for (role, name) in named {
            if !source.has_header(name) {
                return Err(PivotError::UnknownColumn {
                    role,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolves the configuration for a calculation.
    /// Returns `None` when no row dimension or no column dimension is set.
    pub fn resolve(&self) -> Option<ActiveConfig<'_>> {
        let row_dimensions = self.active_row_dimensions();
        let column_dimension = self.active_column_dimension()?;
        if row_dimensions.is_empty() {
            return None;
        }
        Some(ActiveConfig {
            row_dimensions,
            column_dimension,
            value_column: self.active_value_column(),
            mode: self.calculation_mode,
            filter: self
                .filter
                .as_ref()
                .map(|f| (f.column.as_str(), normalize_text(&f.value))),
        })
    }
}

fn set_name(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

// ============================================================================
// RESOLVED CONFIGURATION
// ============================================================================

/// A configuration with every unset slot removed.
#[derive(Debug, Clone)]
pub struct ActiveConfig<'a> {
    pub row_dimensions: Vec<&'a str>,
    pub column_dimension: &'a str,
    pub value_column: Option<&'a str>,
    pub mode: CalculationMode,
    /// Filter column and its normalized expected value.
    pub filter: Option<(&'a str, String)>,
}

impl ActiveConfig<'_> {
    /// Whether a record survives the global filter.
    pub fn passes_filter(&self, record: &Record) -> bool {
        match &self.filter {
            None => true,
            Some((column, expected)) => normalize_value(record.get(column)) == *expected,
        }
    }
}
