//! FILENAME: core/pivot-engine/src/lib.rs
//! Hierarchical pivot tables over tabular records.
//!
//! Records are grouped by an ordered list of row dimensions and spread
//! across the distinct values of one column dimension. Each cell holds an
//! additive sum/count, rolled up into subtotals and a grand total, then
//! shown as a sum, average, count or percentage of the grand total.
//!
//! Layers:
//! - `record`: Input records and the dataset they form
//! - `definition`: Serializable configuration (what the pivot table IS)
//! - `cache`: Composite keys and the additive aggregation matrix
//! - `tree`: Row hierarchy and bottom-up rollup
//! - `view`: Renderable output rows and drill-down types (WHAT we display)
//! - `engine`: Calculation and drill-down (HOW we calculate)
//! - `session`: Memoizing facade over a dataset

pub mod logging;

pub mod error;
pub mod record;
pub mod definition;
pub mod cache;
pub mod tree;
pub mod view;
pub mod engine;
pub mod session;

pub use error::{ColumnRole, PivotError, PivotResult};
pub use record::{PivotSource, Record, ScalarValue};
pub use definition::{CalculationMode, PivotConfiguration, PivotFilter};
pub use cache::{CellAccumulator, CompositeKey, EMPTY_SENTINEL, SECTION_KEY_SEPARATOR};
pub use view::*;
pub use engine::{calculate_pivot, drill_down, DrillDownResolver, PivotCalculator};
pub use session::PivotEngine;
