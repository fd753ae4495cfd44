use thiserror::Error;

/// Main error type for the label generator.
/// Aggregates errors from the standard library, third-party decoders and the internal modules
/// so that `?` works across reader, layout and rendering code.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    CellError(#[from] crate::spreadsheet::cell::CellError),

    #[error("{0}")]
    CsvReadError(#[from] crate::spreadsheet::csv::CsvReadError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),

    #[error("{0}")]
    TableError(#[from] crate::table::TableError),

    #[error("{0}")]
    LoaderError(#[from] crate::loader::LoaderError),

    // Label module errors
    #[error("{0}")]
    ColumnError(#[from] crate::labels::columns::ColumnError),

    #[error("{0}")]
    RenderError(#[from] crate::render::RenderError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, LabelError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| LabelError::WithContextError(format!("{}: {}", message, e)))
    }
}
