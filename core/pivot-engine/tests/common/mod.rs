//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot engine integration tests.

#![allow(dead_code)]

use pivot_engine::{FlattenedRow, PivotEngine, PivotSource, Record, ScalarValue};

// ============================================================================
// FIXTURES
// ============================================================================

/// Regional sales: 3 regions x 2 products x 2 quarters.
pub struct SalesFixture;

impl SalesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Region", "Product", "Quarter", "Sales", "Quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    pub fn records() -> Vec<Record> {
        Self::data()
            .into_iter()
            .map(|(region, product, quarter, sales, quantity)| {
                Record::from_pairs([
                    ("Region", ScalarValue::from(region)),
                    ("Product", product.into()),
                    ("Quarter", quarter.into()),
                    ("Sales", sales.into()),
                    ("Quantity", quantity.into()),
                ])
            })
            .collect()
    }

    pub fn source() -> PivotSource {
        PivotSource::new(
            Self::headers().into_iter().map(str::to_string).collect(),
            Self::records(),
        )
    }

    pub fn engine() -> PivotEngine {
        PivotEngine::new(Self::source())
    }
}

/// The four-record dataset: East/West x A/B with sales 10, 20, 30, 40.
pub fn small_source() -> PivotSource {
    let rows = [
        ("East", "A", 10.0),
        ("East", "B", 20.0),
        ("West", "A", 30.0),
        ("West", "B", 40.0),
    ];
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

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert two numbers are equal within display precision.
pub fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.001,
        "expected {} but got {}",
        expected,
        actual
    );
}

/// Assert a row's cells and total.
pub fn assert_row_values(row: &FlattenedRow, cells: &[f64], total: f64) {
    assert_eq!(
        row.values.cells.len(),
        cells.len(),
        "Row '{}' has {} cells, expected {}",
        row.label(),
        row.values.cells.len(),
        cells.len()
    );
    for (i, (actual, expected)) in row.values.cells.iter().zip(cells).enumerate() {
        assert!(
            (actual - expected).abs() < 0.001,
            "Row '{}' cell {} expected {} but got {}",
            row.label(),
            i,
            expected,
            actual
        );
    }
    assert_approx(row.values.total, total);
}

/// Sum of a numeric column over a set of records.
pub fn sum_column(records: &[&Record], column: &str) -> f64 {
    records
        .iter()
        .filter_map(|r| r.get(column).and_then(ScalarValue::as_number))
        .sum()
}
