//! Workbook readers.
//!
//! Each format produces [`Sheet`]s of raw [`Cell`]s. Shared strings are resolved inside the
//! reader, so consumers only see inline text, numbers, booleans and date serials.

pub(crate) mod cell;
pub mod criteria;
pub(crate) mod csv;
mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::error::LabelError;
use crate::error::ResultMessage;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported file extension for '{0}'")]
    FileExtensionError(String),

    #[error("Missing '{0}' inside the workbook")]
    FileError(String),

    #[error("Workbook '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("No worksheet in '{0}' matches the requested sheet name")]
    SheetNotFoundError(String),

    #[error("Workbook '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),
}

/// A workbook opened for reading.
pub(crate) trait Spreadsheet {
    fn name(&self) -> String;

    fn sheet_names(&self) -> Vec<String>;

    /// Reads the sheets selected by `criteria`, in workbook order.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, LabelError>;
}

/// Workbook formats with a dedicated reader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xls,
    Ods,
}

impl WorkbookFormat {
    /// Chooses a reader by file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<WorkbookFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xltx" | "xltm" | "xlam" => Some(WorkbookFormat::Xlsx),
            "xls" | "xla" | "xlt" => Some(WorkbookFormat::Xls),
            "ods" => Some(WorkbookFormat::Ods),
            _ => None,
        }
    }

    pub(crate) fn open(self, path: &Path) -> Result<Box<dyn Spreadsheet>, LabelError> {
        let spreadsheet: Box<dyn Spreadsheet> = match self {
            WorkbookFormat::Xlsx => Box::new(XlsxSpreadsheet::open(path)?),
            WorkbookFormat::Xls => Box::new(XlsSpreadsheet::open(path)?),
            WorkbookFormat::Ods => Box::new(OdsSpreadsheet::open(path)?),
        };
        Ok(spreadsheet)
    }
}

/// Opens `path` with the given reader and returns the first sheet `criteria` selects.
pub(crate) fn read_first_sheet(format: WorkbookFormat, path: &Path, criteria: &Criteria) -> Result<Sheet, LabelError> {
    let mut spreadsheet = format.open(path)?;
    let name = spreadsheet.name();
    log::debug!("'{}' has sheets {:?}", name, spreadsheet.sheet_names());
    let sheet = spreadsheet
        .read_sheets(criteria)
        .with_prefix(&format!("Reading '{}'", name))?
        .into_iter()
        .next()
        .ok_or_else(|| SpreadsheetError::SheetNotFoundError(name))?;
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(WorkbookFormat::from_path(Path::new("parts.XLSX")), Some(WorkbookFormat::Xlsx));
        assert_eq!(WorkbookFormat::from_path(Path::new("parts.xlsm")), Some(WorkbookFormat::Xlsx));
        assert_eq!(WorkbookFormat::from_path(Path::new("parts.xls")), Some(WorkbookFormat::Xls));
        assert_eq!(WorkbookFormat::from_path(Path::new("parts.ods")), Some(WorkbookFormat::Ods));
        assert_eq!(WorkbookFormat::from_path(Path::new("parts.csv")), None);
        assert_eq!(WorkbookFormat::from_path(Path::new("parts")), None);
    }
}
