//! Pieces shared by the Office Open XML readers.
use crate::error::LabelError;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Whole workbook held in memory.
pub(super) type ExcelArchive = ZipArchive<Cursor<Vec<u8>>>;

/// Worksheet `(name, member path)` pairs and whether the workbook counts days from 1904.
pub(super) type Workbook = (Vec<(String, String)>, bool);

/// Opens the archive, then loads the sheet list and the number formats.
pub(super) fn open<W, F>(path: &Path, load_workbook: W, load_number_formats: F) -> Result<(
    ExcelArchive,
    Vec<CellType>,
    Vec<(String, String)>
), LabelError>
where
    W: Fn(&mut ExcelArchive) -> Result<Workbook, LabelError>,
    F: Fn(&mut ExcelArchive, bool) -> Result<Vec<CellType>, LabelError>,
{
    let file_name = path.to_string_lossy().to_string();
    let data = std::fs::read(path)?;

    // Encrypted packages are wrapped in a compound file instead of a ZIP.
    if data.starts_with(OLE_SIGNATURE) && Cfb::new(data.clone())?.exists("EncryptedPackage") {
        Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
    }

    let mut zip = ZipArchive::new(Cursor::new(data))?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok((zip, number_formats, sheets))
}

/// Relationship id -> worksheet member path.
pub(super) fn load_relationships(zip: &mut ExcelArchive, path: &str) -> Result<HashMap<String, String>, LabelError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each cell style's number format id to a cell type.
/// Custom formats win over built-ins; unknown ids are plain numbers.
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Relationship targets are relative to `xl/` unless absolute.
pub(super) fn to_zip_path(path: &str) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relationship_targets() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn custom_formats_override_builtins() {
        let mut custom = HashMap::new();
        custom.insert("14".to_owned(), CellType::Number);
        custom.insert("164".to_owned(), CellType::NumberDate1900);
        let formats = load_number_formats(
            vec!["0".to_owned(), "14".to_owned(), "164".to_owned(), "22".to_owned()],
            custom,
            false,
        );
        assert_eq!(formats, vec![
            CellType::Number,
            CellType::Number,
            CellType::NumberDate1900,
            CellType::NumberDateTime1900,
        ]);
    }
}
