//! Spreadsheet loading.
//!
//! The first worksheet is read with a header row followed by one row per
//! employee. Headers are accepted in either locale. Monetary cells are coerced
//! with invalid-to-zero semantics; `total` is taken as supplied.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::path::Path;

use super::money::{coerce_amount, format_plain};
use super::PayrollError;

pub const ACCEPTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// An uploaded spreadsheet: raw bytes plus the client-supplied filename.
#[derive(Debug, Clone)]
pub struct SpreadsheetUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SpreadsheetUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn has_accepted_extension(&self) -> bool {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                ACCEPTED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

/// A statement field and its spreadsheet headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Base,
    Fee,
    Bonus,
    Commission,
    Other,
    Deduction,
    Total,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Email,
        Field::Base,
        Field::Fee,
        Field::Bonus,
        Field::Commission,
        Field::Other,
        Field::Deduction,
        Field::Total,
    ];

    pub const MONETARY: [Field; 7] = [
        Field::Base,
        Field::Fee,
        Field::Bonus,
        Field::Commission,
        Field::Other,
        Field::Deduction,
        Field::Total,
    ];

    /// Placeholder identifier, e.g. `{{bonus}}`.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Base => "base",
            Self::Fee => "fee",
            Self::Bonus => "bonus",
            Self::Commission => "commission",
            Self::Other => "other",
            Self::Deduction => "deduction",
            Self::Total => "total",
        }
    }

    /// Header aliases, zh first.
    pub fn headers(self) -> [&'static str; 2] {
        match self {
            Self::Name => ["姓名", "Name"],
            Self::Email => ["邮箱", "Email"],
            Self::Base => ["基本工资", "Base"],
            Self::Fee => ["服务费", "Fee"],
            Self::Bonus => ["奖金", "Bonus"],
            Self::Commission => ["提成", "Commission"],
            Self::Other => ["其他", "Other"],
            Self::Deduction => ["扣款", "Deduction"],
            Self::Total => ["实发工资", "Total"],
        }
    }

    pub fn is_required(self) -> bool {
        self != Self::Name
    }

    fn matches_header(self, header: &str) -> bool {
        let header = header.trim();
        self.headers()
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(header))
            || self.identifier().eq_ignore_ascii_case(header)
    }
}

/// Compensation components for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amounts {
    pub base: Decimal,
    pub fee: Decimal,
    pub bonus: Decimal,
    pub commission: Decimal,
    pub other: Decimal,
    pub deduction: Decimal,
    pub total: Decimal,
}

impl Amounts {
    pub fn get(&self, field: Field) -> Option<Decimal> {
        match field {
            Field::Base => Some(self.base),
            Field::Fee => Some(self.fee),
            Field::Bonus => Some(self.bonus),
            Field::Commission => Some(self.commission),
            Field::Other => Some(self.other),
            Field::Deduction => Some(self.deduction),
            Field::Total => Some(self.total),
            Field::Name | Field::Email => None,
        }
    }

    fn set(&mut self, field: Field, amount: Decimal) {
        match field {
            Field::Base => self.base = amount,
            Field::Fee => self.fee = amount,
            Field::Bonus => self.bonus = amount,
            Field::Commission => self.commission = amount,
            Field::Other => self.other = amount,
            Field::Deduction => self.deduction = amount,
            Field::Total => self.total = amount,
            Field::Name | Field::Email => {}
        }
    }
}

/// One employee's statement data, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompensationRow {
    pub name: Option<String>,
    pub email: Option<String>,
    pub amounts: Amounts,
    /// Every spreadsheet column as `(header, text)`, in sheet order.
    pub columns: Vec<(String, String)>,
}

impl CompensationRow {
    /// Placeholder values: field identifiers first, then original headers.
    pub fn placeholders(&self) -> Vec<(String, String)> {
        let mut values = Vec::with_capacity(Field::ALL.len() + self.columns.len());
        for field in Field::ALL {
            let value = match field {
                Field::Name => self.name.clone().unwrap_or_default(),
                Field::Email => self.email.clone().unwrap_or_default(),
                monetary => self
                    .amounts
                    .get(monetary)
                    .map(format_plain)
                    .unwrap_or_default(),
            };
            values.push((field.identifier().to_string(), value));
        }
        values.extend(self.columns.iter().cloned());
        values
    }
}

#[derive(Debug)]
pub struct LoadedTable {
    pub rows: Vec<CompensationRow>,
    pub row_count: usize,
}

/// Parse an uploaded spreadsheet into compensation rows.
pub fn load_spreadsheet(upload: &SpreadsheetUpload) -> Result<LoadedTable, PayrollError> {
    if !upload.has_accepted_extension() {
        return Err(PayrollError::Format {
            filename: upload.filename.clone(),
        });
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(upload.bytes.clone()))
        .map_err(|e| PayrollError::Parse(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PayrollError::Parse("workbook contains no worksheets".to_string()))?
        .map_err(|e| PayrollError::Parse(e.to_string()))?;

    let table: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    rows_from_table(&table)
}

/// Build rows from a header row plus data rows.
pub fn rows_from_table(table: &[Vec<Data>]) -> Result<LoadedTable, PayrollError> {
    let headers: Vec<String> = table
        .first()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default();

    let mut positions: Vec<(Field, Option<usize>)> = Vec::with_capacity(Field::ALL.len());
    for field in Field::ALL {
        let position = headers.iter().position(|h| field.matches_header(h));
        if position.is_none() && field.is_required() {
            let [zh, en] = field.headers();
            return Err(PayrollError::Schema {
                column: field.identifier().to_string(),
                headers: format!("{zh} / {en}"),
            });
        }
        positions.push((field, position));
    }

    let rows: Vec<CompensationRow> = table
        .iter()
        .skip(1)
        .filter(|cells| !is_blank_row(cells))
        .map(|cells| build_row(&headers, &positions, cells))
        .collect();

    Ok(LoadedTable {
        row_count: rows.len(),
        rows,
    })
}

fn build_row(
    headers: &[String],
    positions: &[(Field, Option<usize>)],
    cells: &[Data],
) -> CompensationRow {
    let cell = |index: usize| cells.get(index).unwrap_or(&Data::Empty);
    let mut row = CompensationRow::default();

    for &(field, position) in positions {
        let Some(index) = position else { continue };
        match field {
            Field::Name => row.name = non_empty(cell_text(cell(index))),
            Field::Email => row.email = non_empty(cell_text(cell(index))),
            monetary => row.amounts.set(monetary, coerce_amount(cell(index))),
        }
    }

    row.columns = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !header.is_empty())
        .map(|(index, header)| (header.clone(), cell_text(cell(index))))
        .collect();

    row
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn is_blank_row(cells: &[Data]) -> bool {
    cells.iter().all(|c| cell_text(c).is_empty())
}

/// Text form of a cell as it would read in the sheet.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.to_string())
            .unwrap_or_else(|| format_float(dt.as_f64())),
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
