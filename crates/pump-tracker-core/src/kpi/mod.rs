//! Spreadsheet KPI engine for the curativo (wound-care) procedure sheet.
//!
//! The sheet arrives as an `.xlsx` workbook or a delimited text export.
//! [`analyze`] cleans it into [`CurativoRow`]s and computes every KPI from
//! that one table; a processing error yields no partial report.

mod cleaning;
mod report;

pub use cleaning::*;
pub use report::*;

use thiserror::Error;

use crate::store::StoreError;

/// Blob-store path of the sheet export.
pub const DEFAULT_SOURCE_PATH: &str = "analise/bdcurativo.xlsx";

/// KPI engine errors.
#[derive(Error, Debug)]
pub enum KpiError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Workbook has no worksheet")]
    EmptyWorkbook,

    #[error("Missing column: {0}")]
    MissingColumn(&'static str),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type KpiResult<T> = Result<T, KpiError>;
