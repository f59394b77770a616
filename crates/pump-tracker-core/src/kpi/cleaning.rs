//! Sheet ingestion and cleaning.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{KpiError, KpiResult};
use crate::lifecycle::{normalize_text, parse_day_first, spreadsheet_serial_date};

/// Column headers of the procedure sheet.
pub mod columns {
    pub const PROCEDURE_DATE: &str = "Dt Procedime";
    pub const CONFIRMATION_DATE: &str = "Dt Apont Uti";
    pub const QUOTED_VALUE: &str = "Valor Cotado";
    pub const STATUS: &str = "Status Utili";
    pub const PRODUCT: &str = "Desc Produto";
    pub const CLIENT: &str = "Nome Cli";
}

/// Quoted-value cells that mean "nothing quoted".
const PLACEHOLDERS: &[&str] = &["", "-", "- 0", "-0", "--"];

/// Status labels, compared in normalized form.
const STATUS_USED: &str = "UTILIZADO";
const STATUS_FINALIZED: &str = "FINALIZADO";
const STATUS_NOT_FOUND: &str = "NAO ENCONTRADO";

/// One cleaned sheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurativoRow {
    pub procedure_date: Option<NaiveDate>,
    /// Date usage was confirmed (invoicing trigger)
    pub confirmation_date: Option<NaiveDate>,
    /// Quoted value; placeholders and garbage are 0
    pub quoted_value: f64,
    pub status: String,
    pub product: String,
    pub client: String,
}

impl CurativoRow {
    /// Product was used or the procedure was finalized.
    pub fn is_usage(&self) -> bool {
        matches!(normalize_text(&self.status).as_str(), STATUS_USED | STATUS_FINALIZED)
    }

    pub fn is_finalized(&self) -> bool {
        normalize_text(&self.status) == STATUS_FINALIZED
    }

    pub fn is_loss(&self) -> bool {
        normalize_text(&self.status) == STATUS_NOT_FOUND
    }

    /// Days from procedure to usage confirmation, when both dates exist.
    pub fn invoicing_days(&self) -> Option<i64> {
        Some((self.confirmation_date? - self.procedure_date?).num_days())
    }
}

/// Parse a currency cell such as `R$ 1.234,56`, `1.500`, `1234.56` or `- 0`.
///
/// When both separators appear, the last one is the decimal separator. A
/// lone comma is decimal. Dots are thousands separators when an `R$` prefix
/// is present or every group after a dot has exactly three digits. Anything
/// unparseable is 0.
pub fn parse_currency(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if PLACEHOLDERS.contains(&trimmed) {
        return 0.0;
    }

    let has_symbol = trimmed.contains("R$");
    let cleaned: String = trimmed
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let canonical = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if is_grouped(&cleaned, ',') && cleaned.matches(',').count() > 1 => {
            cleaned.replace(',', "")
        }
        (None, Some(_)) => cleaned.replace(',', "."),
        (Some(_), None) if has_symbol || is_grouped(&cleaned, '.') => cleaned.replace('.', ""),
        _ => cleaned,
    };

    match canonical.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            debug!(value = trimmed, "unparseable quoted value, using 0");
            0.0
        }
    }
}

/// `1.234.567`-style digit grouping: a 1-3 digit head without a leading
/// zero, then groups of exactly three digits.
fn is_grouped(number: &str, separator: char) -> bool {
    let digits = number.strip_prefix('-').unwrap_or(number);
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mut groups = digits.split(separator);
    let head = groups.next().unwrap_or("");
    (1..=3).contains(&head.len())
        && all_digits(head)
        && !head.starts_with('0')
        && groups.all(|g| g.len() == 3 && all_digits(g))
}

/// Positions of the required columns in a header row.
struct ColumnMap {
    procedure: usize,
    confirmation: usize,
    value: usize,
    status: usize,
    product: usize,
    client: usize,
}

impl ColumnMap {
    /// Match headers ignoring case and accents.
    fn locate<S: AsRef<str>>(headers: &[S]) -> KpiResult<Self> {
        let headers: Vec<String> = headers.iter().map(|h| normalize_text(h.as_ref())).collect();
        let position = |name: &'static str| -> KpiResult<usize> {
            let key = normalize_text(name);
            headers
                .iter()
                .position(|h| *h == key)
                .ok_or(KpiError::MissingColumn(name))
        };
        Ok(Self {
            procedure: position(columns::PROCEDURE_DATE)?,
            confirmation: position(columns::CONFIRMATION_DATE)?,
            value: position(columns::QUOTED_VALUE)?,
            status: position(columns::STATUS)?,
            product: position(columns::PRODUCT)?,
            client: position(columns::CLIENT)?,
        })
    }
}

/// Read and clean the sheet, either an `.xlsx` workbook (first worksheet)
/// or a delimited text export.
pub fn read_rows(bytes: &[u8]) -> KpiResult<Vec<CurativoRow>> {
    let rows = if is_workbook(bytes) {
        read_workbook_rows(bytes)?
    } else {
        read_delimited_rows(bytes)?
    };
    debug!(rows = rows.len(), "read curativo sheet");
    Ok(rows)
}

/// Zip container signature shared by every `.xlsx` file.
fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
}

fn read_workbook_rows(bytes: &[u8]) -> KpiResult<Vec<CurativoRow>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(KpiError::EmptyWorkbook)??;

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(|c| c.to_string()).collect();
    let map = ColumnMap::locate(&header)?;

    let mut rows = Vec::new();
    for cells in sheet_rows {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cell = |i: usize| cells.get(i).unwrap_or(&Data::Empty);
        rows.push(CurativoRow {
            procedure_date: cell_date(cell(map.procedure)),
            confirmation_date: cell_date(cell(map.confirmation)),
            quoted_value: cell_value(cell(map.value)),
            status: cell_text(cell(map.status)),
            product: cell_text(cell(map.product)),
            client: cell_text(cell(map.client)),
        });
    }
    Ok(rows)
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::Float(serial) => spreadsheet_serial_date(*serial),
        Data::Int(serial) => spreadsheet_serial_date(*serial as f64),
        Data::DateTime(dt) => spreadsheet_serial_date(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) => parse_day_first(s),
        _ => None,
    }
}

fn cell_value(cell: &Data) -> f64 {
    match cell {
        Data::Float(v) if v.is_finite() => *v,
        Data::Int(v) => *v as f64,
        Data::String(s) => parse_currency(s),
        _ => 0.0,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn read_delimited_rows(bytes: &[u8]) -> KpiResult<Vec<CurativoRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(detect_delimiter(bytes))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let map = ColumnMap::locate(&reader.headers()?.iter().collect::<Vec<_>>())?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        rows.push(CurativoRow {
            procedure_date: parse_day_first(cell(map.procedure)),
            confirmation_date: parse_day_first(cell(map.confirmation)),
            quoted_value: parse_currency(cell(map.value)),
            status: cell(map.status).to_string(),
            product: cell(map.product).to_string(),
            client: cell(map.client).to_string(),
        });
    }
    Ok(rows)
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or(bytes);
    if header.contains(&b';') && !header.contains(&b',') {
        b';'
    } else {
        b','
    }
}
