//! Comma-separated text, read into the same [`Sheet`] shape as the workbook formats.

use crate::error::LabelError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use csv::ByteRecord;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use encoding_rs::WINDOWS_1252;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum CsvReadError {
    #[error("Line {0}: expected {1} fields, saw {2}")]
    FieldCountError(u64, usize, usize),

    #[error("Line {0}, field {1}: invalid {2} text")]
    DecodeError(u64, usize, &'static str),

    #[error("Line {0}: binary content")]
    BinaryContentError(u64),
}

/// Text encoding applied to every field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CsvEncoding {
    /// Strict UTF-8; a leading byte order mark is dropped.
    Utf8,
    /// Windows-1252, the usual superset of Latin-1 spreadsheet exports use.
    Latin1,
}

impl CsvEncoding {
    fn encoding(self) -> &'static Encoding {
        match self {
            CsvEncoding::Utf8 => UTF_8,
            CsvEncoding::Latin1 => WINDOWS_1252,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CsvEncoding::Utf8 => "UTF-8",
            CsvEncoding::Latin1 => "Latin-1",
        }
    }
}

/// Reads a CSV file as a single sheet named after the file.
/// The first record sets the width; shorter records are padded, longer ones rejected.
/// NUL bytes mark a binary file and fail the read in either encoding.
pub(crate) fn read_csv(path: &Path, encoding: CsvEncoding) -> Result<Sheet, LabelError> {
    let file_name = path.to_string_lossy().to_string();
    let sheet_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(File::open(path)?));

    let mut sheet = Sheet::new(&file_name, &sheet_name);
    let mut record = ByteRecord::new();
    let mut width: Option<usize> = None;
    let mut row = 0usize;
    while reader.read_byte_record(&mut record)? {
        let line = record.position().map(|position| position.line()).unwrap_or(row as u64 + 1);
        let expected = *width.get_or_insert(record.len());
        if record.len() > expected {
            Err(CsvReadError::FieldCountError(line, expected, record.len()))?;
        }
        for (col, raw) in record.iter().enumerate() {
            let raw = if row == 0 && col == 0 {
                raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
            } else {
                raw
            };
            if raw.contains(&0) {
                Err(CsvReadError::BinaryContentError(line))?;
            }
            let value = decode_field(raw, encoding)
                .ok_or(CsvReadError::DecodeError(line, col + 1, encoding.label()))?;
            sheet.push(Cell {
                row,
                col,
                kind: CellType::InlineString,
                value,
            });
        }
        row += 1;
    }
    Ok(sheet)
}

fn decode_field(raw: &[u8], encoding: CsvEncoding) -> Option<String> {
    match encoding {
        CsvEncoding::Utf8 => encoding
            .encoding()
            .decode_without_bom_handling_and_without_replacement(raw)
            .map(|text| text.into_owned()),
        CsvEncoding::Latin1 => {
            let (text, _) = encoding.encoding().decode_without_bom_handling(raw);
            Some(text.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn values(sheet: &Sheet) -> Vec<(usize, usize, &str)> {
        sheet.cells.iter().map(|cell| (cell.row, cell.col, cell.value.as_str())).collect()
    }

    #[test]
    fn reads_utf8_with_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parts.csv");
        std::fs::write(&path, "\u{FEFF}Part Number,Location\n\"123,45\",Bäck_01\n").unwrap();

        let sheet = read_csv(&path, CsvEncoding::Utf8).unwrap();
        assert_eq!(sheet.name, "parts");
        assert_eq!(values(&sheet), vec![
            (0, 0, "Part Number"),
            (0, 1, "Location"),
            (1, 0, "123,45"),
            (1, 1, "Bäck_01"),
        ]);
    }

    #[test]
    fn strict_utf8_rejects_latin1_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parts.csv");
        std::fs::write(&path, b"Location\nB\xE4ck\n").unwrap();

        let error = read_csv(&path, CsvEncoding::Utf8).unwrap_err();
        assert_eq!(error.to_string(), "Line 2, field 1: invalid UTF-8 text");

        let sheet = read_csv(&path, CsvEncoding::Latin1).unwrap();
        assert_eq!(values(&sheet), vec![(0, 0, "Location"), (1, 0, "Bäck")]);
    }

    #[test]
    fn short_rows_pass_and_long_rows_fail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parts.csv");
        std::fs::write(&path, "a,b,c\n1\n1,2,3,4\n").unwrap();

        let error = read_csv(&path, CsvEncoding::Utf8).unwrap_err();
        assert_eq!(error.to_string(), "Line 3: expected 3 fields, saw 4");
    }

    #[test]
    fn binary_files_are_not_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parts.xlsx");
        std::fs::write(&path, b"PK\x03\x04\x00\x00").unwrap();

        let error = read_csv(&path, CsvEncoding::Latin1).unwrap_err();
        assert_eq!(error.to_string(), "Line 1: binary content");
    }
}
