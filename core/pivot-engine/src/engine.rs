//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - The calculation core that transforms records into a table.
//!
//! This module takes a PivotConfiguration and a PivotSource and produces a
//! PivotTable (ordered rows ready for rendering), plus the reverse
//! drill-down query from a displayed cell to its source records.
//!
//! Algorithm:
//! 1. Filter and aggregate records into an additive matrix (one pass)
//! 2. Build the row hierarchy from the distinct composite keys
//! 3. Roll accumulators up the hierarchy
//! 4. Compute the global sum once (percentage normalization)
//! 5. Flatten depth-first: data rows, trailing subtotals, then grand total

use crate::cache::{
    composite_key, normalize_value, push_escaped, AggregationMatrix, CellAccumulator,
    SECTION_KEY_SEPARATOR,
};
use crate::definition::{ActiveConfig, CalculationMode, PivotConfiguration};
use crate::error::PivotResult;
use crate::logging::{log_debug, log_enter, log_exit};
use crate::record::{PivotSource, Record};
use crate::tree::{build_hierarchy, project, roll_up, RolledNode};
use crate::view::{DrillDownQuery, DrillDownResult, FlattenedRow, PivotTable};

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// Runs one full calculation over a dataset.
pub struct PivotCalculator<'a> {
    configuration: &'a PivotConfiguration,
    source: &'a PivotSource,
    active: ActiveConfig<'a>,
}

impl<'a> PivotCalculator<'a> {
    /// Returns `None` when the configuration leaves a dimension unset.
    pub fn new(configuration: &'a PivotConfiguration, source: &'a PivotSource) -> Option<Self> {
        let active = configuration.resolve()?;
        Some(PivotCalculator {
            configuration,
            source,
            active,
        })
    }

    /// Executes the full calculation and returns the flattened table.
    pub fn calculate(&self) -> PivotTable {
        log_enter!(
            "PIVOT",
            "calculate",
            "records={} dims={:?} column={} mode={:?}",
            self.source.record_count(),
            self.active.row_dimensions,
            self.active.column_dimension,
            self.active.mode
        );

        // Step 1: One pass over the filtered records
        let matrix = AggregationMatrix::build(&self.source.records, &self.active);

        // Step 2: Row hierarchy
        let roots = build_hierarchy(&matrix);

        // Step 3: Bottom-up rollup
        let column_count = matrix.columns.len();
        let rolled: Vec<RolledNode<'_>> = roots.iter().map(|n| roll_up(n, column_count)).collect();

        // Step 4: Percentage normalization, fixed before any row is emitted
        let grand = matrix.grand_total();

        // Step 5: Flatten
        let flattener = TableFlattener {
            mode: self.active.mode,
            grand_sum: grand.sum,
            show_subtotals: self.configuration.show_subtotals,
        };
        let mut rows = flattener.flatten(&rolled);
        if self.configuration.show_grand_total {
            rows.push(flattener.grand_total_row(&matrix.column_totals(), &grand));
        }

        let mut table = PivotTable::empty(self.configuration);
        table.columns = matrix.columns.clone();
        table.rows = rows;
        table.filtered_record_count = matrix.record_count;

        log_exit!(
            "PIVOT",
            "calculate",
            "rows={} columns={} filtered={}",
            table.rows.len(),
            table.columns.len(),
            table.filtered_record_count
        );
        table
    }
}

// ============================================================================
// TABLE FLATTENER
// ============================================================================

/// Depth-first traversal of the rolled tree into output rows.
#[derive(Debug, Clone, Copy)]
struct TableFlattener {
    mode: CalculationMode,
    grand_sum: f64,
    show_subtotals: bool,
}

impl TableFlattener {
    fn flatten(&self, roots: &[RolledNode<'_>]) -> Vec<FlattenedRow> {
        let mut rows = Vec::new();
        for node in roots {
            self.flatten_node(node, &mut rows);
        }
        rows
    }

    /// Emits a leaf's data row, or a branch's subtree followed by its subtotal.
    fn flatten_node(&self, node: &RolledNode<'_>, rows: &mut Vec<FlattenedRow>) {
        let (cells, total) = node.values(self.mode, self.grand_sum);

        if node.is_leaf {
            rows.push(FlattenedRow::data(node.path, cells, total));
            return;
        }

        for child in &node.children {
            self.flatten_node(child, rows);
        }

        if self.show_subtotals && !node.children.is_empty() {
            rows.push(FlattenedRow::subtotal(node.path, cells, total));
        }
    }

    /// The grand total row, over every filtered record.
    fn grand_total_row(&self, column_totals: &[CellAccumulator], grand: &CellAccumulator) -> FlattenedRow {
        let (cells, total) = project(column_totals, grand, self.mode, self.grand_sum);
        FlattenedRow::grand_total(cells, total)
    }
}

// ============================================================================
// DRILL-DOWN RESOLVER
// ============================================================================

/// Maps displayed cells back to the records that produced them.
///
/// Uses the same key derivation and filter as the aggregation pass, so the
/// records it returns re-aggregate to the displayed value.
pub struct DrillDownResolver<'a> {
    records: &'a [Record],
    active: Option<ActiveConfig<'a>>,
}

impl<'a> DrillDownResolver<'a> {
    pub fn new(records: &'a [Record], configuration: &'a PivotConfiguration) -> Self {
        DrillDownResolver {
            records,
            active: configuration.resolve(),
        }
    }

    /// Records behind a section (data row, subtotal, or "" for everything),
    /// optionally restricted to one column value.
    pub fn resolve(&self, section_key: &str, column_value: Option<&str>) -> Vec<&'a Record> {
        let records = self.records;
        let mut matched = Vec::new();
        self.for_each_match(
            |key| key_has_section(key, section_key),
            column_value,
            |i| matched.push(&records[i]),
        );
        matched
    }

    /// Like `resolve`, but addresses the section by its dimension path.
    /// Exact even when dimension values contain the section key separator.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S], column_value: Option<&str>) -> Vec<&'a Record> {
        let records = self.records;
        let mut matched = Vec::new();
        self.for_each_match(
            |key| key_has_prefix(key, path),
            column_value,
            |i| matched.push(&records[i]),
        );
        matched
    }

    /// Source row indices for a query, capped at `max_records`.
    pub fn drill_down(
        &self,
        query: &DrillDownQuery,
        headers: &[String],
        max_records: usize,
    ) -> DrillDownResult {
        let mut result = DrillDownResult::new(query.clone(), headers.to_vec());
        result.max_records = max_records;

        let mut count = 0;
        let mut source_rows = Vec::new();
        self.for_each_match(
            |key| key_has_section(key, &query.section_key),
            query.column_value.as_deref(),
            |index| {
                count += 1;
                if source_rows.len() < max_records {
                    source_rows.push(index);
                }
            },
        );

        result.source_rows = source_rows;
        result.total_count = count;
        result.is_truncated = count > max_records;
        log_debug!(
            "PIVOT",
            "drill_down section={:?} column={:?} matched={}",
            query.section_key,
            query.column_value,
            count
        );
        result
    }

    /// Calls `visit` with the index of every record that passes the filter,
    /// has the column value (when given) and whose key satisfies `key_matches`.
    fn for_each_match<F, V>(&self, key_matches: F, column_value: Option<&str>, mut visit: V)
    where
        F: Fn(&[String]) -> bool,
        V: FnMut(usize),
    {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        for (index, record) in self.records.iter().enumerate() {
            if !active.passes_filter(record) {
                continue;
            }
            if let Some(column) = column_value {
                if normalize_value(record.get(active.column_dimension)) != column {
                    continue;
                }
            }
            if key_matches(composite_key(record, &active.row_dimensions).as_slice()) {
                visit(index);
            }
        }
    }
}

/// Whether some prefix of `key`, escaped and joined, equals `section_key`.
/// The empty section key is the grand total and matches every key.
fn key_has_section(key: &[String], section_key: &str) -> bool {
    if section_key.is_empty() {
        return true;
    }
    let mut joined = String::with_capacity(section_key.len());
    for (i, part) in key.iter().enumerate() {
        if i > 0 {
            joined.push_str(SECTION_KEY_SEPARATOR);
        }
        push_escaped(&mut joined, part);
        if joined.len() > section_key.len() {
            return false;
        }
        if joined == section_key {
            return true;
        }
    }
    false
}

fn key_has_prefix<S: AsRef<str>>(key: &[String], path: &[S]) -> bool {
    path.len() <= key.len() && key.iter().zip(path).all(|(k, p)| k == p.as_ref())
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Calculates a pivot table from a configuration and dataset.
/// This is the main entry point for the calculation engine.
///
/// Fails only when the configuration names a column the dataset lacks.
/// An unset row or column dimension yields an empty table.
pub fn calculate_pivot(
    configuration: &PivotConfiguration,
    source: &PivotSource,
) -> PivotResult<PivotTable> {
    configuration.validate(source)?;
    let table = match PivotCalculator::new(configuration, source) {
        Some(calculator) => calculator.calculate(),
        None => {
            log_debug!("PIVOT", "configuration incomplete, returning empty table");
            PivotTable::empty(configuration)
        }
    };
    Ok(table)
}

/// Performs a drill-down operation to get source records for a cell.
pub fn drill_down(
    configuration: &PivotConfiguration,
    source: &PivotSource,
    query: &DrillDownQuery,
    max_records: usize,
) -> DrillDownResult {
    DrillDownResolver::new(&source.records, configuration).drill_down(query, &source.headers, max_records)
}
