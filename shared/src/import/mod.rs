//! Spreadsheet import: header matching, row validation, location matching and
//! reconciliation against existing products

mod columns;
mod locations;
mod planner;
mod row;

pub use columns::*;
pub use locations::*;
pub use planner::*;
pub use row::*;

use thiserror::Error;

/// Sheet-level import errors (row problems are reported per row, not here)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("the sheet is empty")]
    EmptySheet,

    #[error("required column '{0}' is missing")]
    MissingColumn(&'static str),

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("the sheet has {found} data rows, the limit is {max}")]
    TooManyRows { max: usize, found: usize },
}
