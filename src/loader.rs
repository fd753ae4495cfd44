//! Turns an input file into a [`SourceTable`], trying one decoder after another.

use crate::error::LabelError;
use crate::report::Channel;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::csv::read_csv;
use crate::spreadsheet::csv::CsvEncoding;
use crate::spreadsheet::read_first_sheet;
use crate::spreadsheet::WorkbookFormat;
use crate::table::SourceTable;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFoundError(String),

    #[error("Could not read '{0}' with any decoder ({1})")]
    UndecodableError(String, String),
}

/// One way of decoding an input file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decoder {
    Workbook(WorkbookFormat),
    Csv(CsvEncoding),
}

impl fmt::Display for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoder::Workbook(WorkbookFormat::Xlsx) => f.write_str("Excel workbook (xlsx)"),
            Decoder::Workbook(WorkbookFormat::Xls) => f.write_str("Excel 97-2003 workbook (xls)"),
            Decoder::Workbook(WorkbookFormat::Ods) => f.write_str("OpenDocument spreadsheet (ods)"),
            Decoder::Csv(encoding) => write!(f, "CSV ({})", encoding.label()),
        }
    }
}

impl Decoder {
    /// The extension's own decoder first, then every workbook reader, then CSV in both encodings.
    /// Unknown extensions start with xlsx.
    pub fn chain(path: &Path) -> Vec<Decoder> {
        let is_csv = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let first = if is_csv {
            Decoder::Csv(CsvEncoding::Utf8)
        } else {
            Decoder::Workbook(WorkbookFormat::from_path(path).unwrap_or(WorkbookFormat::Xlsx))
        };

        let mut chain = vec![first];
        for decoder in [
            Decoder::Workbook(WorkbookFormat::Xlsx),
            Decoder::Workbook(WorkbookFormat::Xls),
            Decoder::Workbook(WorkbookFormat::Ods),
            Decoder::Csv(CsvEncoding::Utf8),
            Decoder::Csv(CsvEncoding::Latin1),
        ] {
            if !chain.contains(&decoder) {
                chain.push(decoder);
            }
        }
        chain
    }

    pub fn read(self, path: &Path, criteria: &Criteria) -> Result<SourceTable, LabelError> {
        let sheet = match self {
            Decoder::Workbook(format) => read_first_sheet(format, path, criteria)?,
            Decoder::Csv(encoding) => read_csv(path, encoding)?,
        };
        SourceTable::from_sheet(&sheet)
    }
}

/// Reads `path` with the first decoder that succeeds.
/// Every failed attempt is narrated; nothing partial is returned.
pub(crate) fn load_table(path: &Path, criteria: &Criteria, channel: &mut Channel) -> Result<SourceTable, LabelError> {
    let file_name = path.to_string_lossy().to_string();
    if !path.is_file() {
        channel.status(&format!("Error: File not found: {file_name}"));
        Err(LoaderError::FileNotFoundError(file_name.to_owned()))?;
    }

    let chain = Decoder::chain(path);
    let mut failures = Vec::with_capacity(chain.len());
    for (index, decoder) in chain.iter().enumerate() {
        if index == 0 {
            channel.status(&format!("Reading '{}' as {}", file_name, decoder));
        } else {
            channel.status(&format!("Trying {} instead", decoder));
        }
        match decoder.read(path, criteria) {
            Ok(table) => {
                channel.status(&format!("Loaded {} rows", table.len()));
                channel.status(&format!("Columns: {}", table.headers().join(", ")));
                return Ok(table);
            }
            Err(e) => {
                log::debug!("{} failed on '{}': {:?}", decoder, file_name, e);
                channel.status(&format!("{} failed: {}", decoder, e));
                failures.push(format!("{decoder}: {e}"));
            }
        }
    }

    channel.status(&format!("Error: could not read '{}' in any supported format", file_name));
    Err(LoaderError::UndecodableError(file_name, failures.join("; ")).into())
}
