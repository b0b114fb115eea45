//! FILENAME: core/pivot-engine/src/error.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which part of the configuration named a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    RowDimension,
    ColumnDimension,
    ValueColumn,
    FilterColumn,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::RowDimension => "row dimension",
            ColumnRole::ColumnDimension => "column dimension",
            ColumnRole::ValueColumn => "value column",
            ColumnRole::FilterColumn => "filter column",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("Unknown {role}: {name}")]
    UnknownColumn { role: ColumnRole, name: String },

    #[error("Dataset has no headers to validate the configuration against")]
    NoHeaders,
}

pub type PivotResult<T> = Result<T, PivotError>;
