use crate::error::LabelError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const SPREADSHEET: QName = QName(b"office:spreadsheet");
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
const SPACE: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");

/// Repeats beyond this are trailing filler (LibreOffice pads rows to 1,048,576).
const MAX_REPEAT: usize = 4_096;

#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

/// OpenDocument spreadsheet (`.ods`).
pub(crate) struct OdsSpreadsheet {
    pub(crate) name: String,
    zip: ZipArchive<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<Self, LabelError> {
        let file_name = path.to_string_lossy().to_string();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
        }
        let sheet_names = load_sheet_names(&mut zip)?;
        if sheet_names.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        }
        Ok(OdsSpreadsheet {
            name: file_name,
            zip,
            sheet_names,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheet_names.clone()
    }

    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, LabelError> {
        let mut sheets = Vec::<Sheet>::new();
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;

        // Current sheet, or `None` while skipping a table the criteria reject.
        let mut sheet: Option<Sheet> = None;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut text_context = false;
        let mut annotation_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                let name = event.get_attribute_value("table:name")?.unwrap_or_default().to_string();
                row = 0;
                sheet = criteria.accept(&name).then(|| Sheet::new(&self.name, &name));
            }
            Event::End(event) if event.name() == TABLE => {
                if let Some(sheet) = sheet.take() {
                    sheets.push(sheet);
                    if criteria.is_full(sheets.len()) {
                        break;
                    }
                }
            }
            Event::Start(event) if sheet.is_some() && event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if sheet.is_some() && event.name() == TABLE_ROW => row += row_count,
            Event::Start(event) if sheet.is_some() && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                value.clear();
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.get_attribute_value("office:value-type")?;
                kind = match value_type.as_deref() {
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") if event.get_attribute_value("calcext:value-type")?.as_deref() == Some("error") => CellType::Error,
                    Some("string") => CellType::InlineString,
                    Some(_) => CellType::Number,
                    None => CellType::Empty,
                };
                match kind {
                    CellType::Boolean => {
                        let truth = event.get_attribute_value("office:boolean-value")?
                            .map(|cow| cow != "false" && cow != "0")
                            .unwrap_or(false);
                        value.push_str(if truth { "1" } else { "0" });
                    }
                    CellType::IsoDateTime => value.push_str(&event.get_attribute_value("office:date-value")?.unwrap_or_default()),
                    CellType::IsoDuration => value.push_str(&event.get_attribute_value("office:time-value")?.unwrap_or_default()),
                    CellType::Number => value.push_str(&event.get_attribute_value("office:value")?.unwrap_or_default()),
                    _ => (),
                }
                text_context = matches!(kind, CellType::InlineString | CellType::Error);
            }
            Event::End(event) if sheet.is_some() && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                if let Some(sheet) = sheet.as_mut().filter(|_| !value.is_empty()) {
                    for row_number in row..row + row_count.min(MAX_REPEAT) {
                        for col_number in col..col + col_count.min(MAX_REPEAT) {
                            sheet.push(Cell {
                                row: row_number,
                                col: col_number,
                                kind,
                                value: value.to_owned(),
                            });
                        }
                    }
                }
                col += col_count;
                text_context = false;
                annotation_context = false;
            }
            Event::Start(event) if text_context && event.name() == ANNOTATION => annotation_context = true,
            Event::End(event) if text_context && event.name() == ANNOTATION => annotation_context = false,
            Event::Start(event) if text_context && !annotation_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == SPACE => {
                let count: usize = event.parse_attribute_value("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == TAB => value.push('\t'),
            Event::Start(event) if text_context && !annotation_context && event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) if text_context && !annotation_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if text_context && !annotation_context => value.push_bytes_ref(&event)?,
        });

        Ok(sheets)
    }
}

fn check_mime(zip: &mut ZipArchive<BufReader<File>>) -> Result<(), LabelError> {
    if let Some(mut file) = zip.file("mimetype")? {
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Encrypted members are declared in the manifest.
fn is_password_protected(zip: &mut ZipArchive<BufReader<File>>) -> Result<bool, LabelError> {
    let Some(mut reader) = zip.xml_reader("META-INF/manifest.xml")? else {
        return Ok(false);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:encryption-data") => return Ok(true),
    });
    Ok(false)
}

fn load_sheet_names(zip: &mut ZipArchive<BufReader<File>>) -> Result<Vec<String>, LabelError> {
    let mut reader = zip
        .xml_reader("content.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
    let mut names = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            names.push(event.get_attribute_value("table:name")?.unwrap_or_default().to_string());
        }
    });
    Ok(names)
}
