//! The row/column model every downstream stage works on.

use crate::error::LabelError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Sheet '{0}' has no header row")]
    NoHeaderError(String),

    #[error("Row {0} has {1} values but the table has {2} columns")]
    RowWidthError(usize, usize, usize),
}

/// One cell of a [`SourceTable`].
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    fn from_cell(cell: &Cell) -> Value {
        match cell.kind {
            CellType::Empty => Value::Empty,
            CellType::Boolean => Value::Bool(cell.to_boolean()),
            CellType::Number => cell
                .to_double()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::Text(cell.value.to_owned())),
            CellType::InlineString | CellType::SharedString | CellType::Error => Value::Text(cell.value.to_owned()),
            _ => match cell.to_text() {
                Ok(text) => Value::Text(text),
                Err(e) => {
                    log::debug!("Keeping raw text of {}: {}", cell.reference(), e);
                    Value::Text(cell.value.to_owned())
                }
            },
        }
    }
}

// Numbers compare by bit pattern so values can key a hash map.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Empty => {}
            Value::Text(text) => text.hash(state),
            Value::Number(number) => number.to_bits().hash(state),
            Value::Bool(flag) => flag.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => write!(f, "{}", *number as i64),
            Value::Number(number) => write!(f, "{}", number),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            Value::Empty
        } else {
            Value::Text(text.to_owned())
        }
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

/// Upper-cased headers and the data rows beneath them, all padded to the header width.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl SourceTable {
    /// Builds a table from explicit headers and rows.
    /// Headers are upper-cased, short rows padded and blank rows dropped.
    pub fn new<H: AsRef<str>>(headers: &[H], rows: Vec<Vec<Value>>) -> Result<SourceTable, LabelError> {
        let headers: Vec<String> = headers.iter().map(|header| header.as_ref().to_uppercase()).collect();
        let width = headers.len();
        let mut kept = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                Err(TableError::RowWidthError(index + 1, row.len(), width))?;
            }
            if row.iter().all(Value::is_empty) {
                continue;
            }
            row.resize(width, Value::Empty);
            kept.push(row);
        }
        Ok(SourceTable { headers, rows: kept })
    }

    /// The first row of the sheet's used range is the header row.
    pub(crate) fn from_sheet(sheet: &Sheet) -> Result<SourceTable, LabelError> {
        let grid = sheet.grid();
        let Some((header_row, data_rows)) = grid.split_first() else {
            return Err(TableError::NoHeaderError(sheet.name.to_owned()).into());
        };
        if header_row.iter().all(Option::is_none) {
            Err(TableError::NoHeaderError(sheet.name.to_owned()))?;
        }

        let headers = unique_headers(header_row.iter().enumerate().map(|(index, cell)| match cell {
            Some(cell) => {
                let name = Value::from_cell(cell).to_string();
                let name = name.trim();
                if name.is_empty() {
                    format!("Unnamed: {index}")
                } else {
                    name.to_owned()
                }
            }
            None => format!("Unnamed: {index}"),
        }));

        let rows = data_rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(Value::from_cell).unwrap_or_default())
                    .collect()
            })
            .collect();
        SourceTable::new(&headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|it| it == header)
    }
}

/// Repeated names get `.1`, `.2`, ... suffixes in order of appearance.
fn unique_headers<I: Iterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .map(|name| {
            let count = seen.entry(name.to_owned()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}
