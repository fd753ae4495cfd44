use crate::error::LabelError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::ExcelArchive;
use crate::spreadsheet::excel::Workbook;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");     // ruby annotations, not part of the value
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Office Open XML workbook (`.xlsx`, `.xlsm`).
pub(crate) struct XlsxSpreadsheet {
    pub(crate) name: String,
    zip: ExcelArchive,
    /// Cell type per style index (`s` attribute).
    number_formats: Vec<CellType>,
    /// `(sheet name, member path)` in workbook order.
    sheets: Vec<(String, String)>,
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, LabelError> {
        let (zip, number_formats, sheets) = excel::open(path, load_workbook, load_number_formats)?;
        Ok(XlsxSpreadsheet {
            name: path.to_string_lossy().to_string(),
            zip,
            number_formats,
            sheets,
            shared_strings: None,
        })
    }

    /// The shared string table, loaded on first use.
    fn shared_strings(&mut self) -> Result<&[String], LabelError> {
        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }
        Ok(self.shared_strings.as_deref().unwrap_or_default())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, LabelError> {
        let selected: Vec<(String, String)> = self.sheets
            .iter()
            .filter(|(sheet_name, _)| criteria.accept(sheet_name))
            .take(criteria.sheet_limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let mut sheets = Vec::<Sheet>::new();
        for (sheet_name, zip_path) in selected {
            let mut sheet = Sheet::new(&self.name, &sheet_name);
            let mut reader = self.zip.xml_reader(&zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut row = 0usize;
            let mut col = 0usize;
            let mut kind = CellType::default();
            let mut value = String::new();
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    // `r` is 1-based and optional
                    if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                        row_count = number.saturating_sub(1);
                    }
                    col_count = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    row_count += 1;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = event.get_attribute_value("r")?
                        .and_then(|reference| reference_to_index(&reference))
                        .unwrap_or((row_count, col_count));
                    col_count = col + 1;
                    value.clear();
                    kind = match event.get_attribute_value("t")?.as_deref() {
                        Some("inlineStr") | Some("str") => CellType::InlineString,
                        Some("s") => CellType::SharedString,
                        Some("d") => CellType::IsoDateTime,
                        Some("b") => CellType::Boolean,
                        Some("e") => CellType::Error,
                        _ => CellType::Number,
                    };
                    if kind == CellType::Number {
                        if let Some(index) = event.parse_attribute_value::<usize>("s")? {
                            kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                        }
                    }
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    if !value.is_empty() {
                        sheet.push(Cell {
                            row,
                            col,
                            kind,
                            value: std::mem::take(&mut value),
                        });
                    }
                },
            });
            drop(reader);

            if sheet.cells.iter().any(|cell| cell.kind == CellType::SharedString) {
                let shared_strings = self.shared_strings()?;
                for cell in sheet.cells.iter_mut().filter(|cell| cell.kind == CellType::SharedString) {
                    let index = cell.value.trim().parse::<usize>()?;
                    cell.value = shared_strings.get(index).cloned().unwrap_or_default();
                    cell.kind = CellType::InlineString;
                }
            }
            sheets.push(sheet);
        }

        Ok(sheets)
    }
}

fn load_shared_strings(zip: &mut ExcelArchive) -> Result<Vec<String>, LabelError> {
    let mut shared_strings = Vec::<String>::new();
    let Some(mut reader) = zip.xml_reader("xl/sharedStrings.xml")? else {
        return Ok(shared_strings);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Sheet names with member paths from `workbook.xml`, plus the 1904 date flag.
fn load_workbook(zip: &mut ExcelArchive) -> Result<Workbook, LabelError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                // `r:id` is namespaced, so match on the local part
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Cell type per style from `styles.xml`; only `numFmts` and `cellXfs` matter here.
fn load_number_formats(zip: &mut ExcelArchive, is_1904: bool) -> Result<Vec<CellType>, LabelError> {
    let Some(mut reader) = zip.xml_reader("xl/styles.xml")? else {
        return Ok(Vec::new());
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Collects the text of the element `reader` just entered, up to `end_tag`.
/// Rich text runs are concatenated and phonetic runs skipped.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, LabelError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/>
<sheets><sheet name="Notes" sheetId="1" r:id="rId2"/><sheet name="Inventory" sheetId="2" r:id="rId1"/></sheets>
</workbook>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="164"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
<si><t>Part Number</t></si>
<si><t>Description</t></si>
<si><r><t>Hex </t></r><r><t>bolt &amp; nut</t></r><rPh><t>ignored</t></rPh></si>
<si><t>Location</t></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>3</v></c><c r="D1" t="inlineStr"><is><t>Added</t></is></c></row>
<row r="2"><c r="A2"><v>1234567</v></c><c r="B2" t="s"><v>2</v></c><c r="C2" t="str"><v>A_01_02</v></c><c r="D2" s="1"><v>45292</v></c></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row><c t="b"><v>1</v></c></row>
</sheetData></worksheet>"#;

    /// Writes a minimal two-sheet workbook; the inventory sheet comes second.
    pub(crate) fn write_fixture(dir: &TempDir, file_name: &str) -> std::path::PathBuf {
        let path = dir.path().join(file_name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in [
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn lists_sheets_in_workbook_order() {
        let dir = TempDir::new().unwrap();
        let spreadsheet = XlsxSpreadsheet::open(&write_fixture(&dir, "parts.xlsx")).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Notes", "Inventory"]);
    }

    #[test]
    fn reads_selected_sheet() {
        let dir = TempDir::new().unwrap();
        let mut spreadsheet = XlsxSpreadsheet::open(&write_fixture(&dir, "parts.xlsx")).unwrap();
        let criteria = Criteria::first_sheet(Some("Inv*")).unwrap();
        let sheets = spreadsheet.read_sheets(&criteria).unwrap();

        assert_eq!(sheets.len(), 1);
        let values: Vec<(usize, usize, CellType, &str)> = sheets[0]
            .cells
            .iter()
            .map(|cell| (cell.row, cell.col, cell.kind, cell.value.as_str()))
            .collect();
        assert_eq!(values, vec![
            (0, 0, CellType::InlineString, "Part Number"),
            (0, 1, CellType::InlineString, "Description"),
            (0, 2, CellType::InlineString, "Location"),
            (0, 3, CellType::InlineString, "Added"),
            (1, 0, CellType::Number, "1234567"),
            (1, 1, CellType::InlineString, "Hex bolt & nut"),
            (1, 2, CellType::InlineString, "A_01_02"),
            (1, 3, CellType::NumberDate1900, "45292"),
        ]);
    }

    #[test]
    fn reads_cells_without_references() {
        let dir = TempDir::new().unwrap();
        let mut spreadsheet = XlsxSpreadsheet::open(&write_fixture(&dir, "parts.xlsx")).unwrap();
        let sheets = spreadsheet.read_sheets(&Criteria::default()).unwrap();

        assert_eq!(sheets[0].name, "Notes");
        assert_eq!(sheets[0].cells[0].row, 0);
        assert_eq!(sheets[0].cells[0].col, 0);
        assert_eq!(sheets[0].cells[0].kind, CellType::Boolean);
    }

    #[test]
    fn rejects_files_that_are_not_archives() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"Part Number,Location\n").unwrap();
        assert!(XlsxSpreadsheet::open(&path).is_err());
    }
}
