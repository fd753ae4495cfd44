use crate::error::LabelError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const RK: u16 = 638;
const FORMAT: u16 = 1054;
const BOF: u16 = 2057;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid formula value '{0:#018x}'")]
    FormulaValueError(u64),
}

/// Either a fixed cell type or an XF index still to be resolved through the number formats.
type CellKind = Either<CellType, usize>;

/// Excel 97-2003 workbook (`.xls`).
pub(crate) struct XlsSpreadsheet {
    pub(crate) name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    number_formats: Vec<CellType>,
    /// `(sheet name, stream offset of its BOF)`.
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Loads the workbook globals: code page, date system, formats, shared strings and sheet offsets.
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, LabelError> {
        let file_name = path.to_string_lossy().to_string();
        let cfb = Cfb::new(std::fs::read(path)?)?;
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                let encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
                reader.set_encoding(encoding);
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
            XF => {
                reader.skip(2)?;
                format_indexes.push(reader.read_u16()?.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let visibility = reader.read_u8()?;
                let kind = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                // worksheets only; chart and macro sheets carry no cells
                if kind == 0 {
                    log::trace!("Sheet '{}' at offset {} (visibility {})", sheet_name, pointer, visibility);
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }

        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            name: file_name,
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn resolve(&self, kind: CellKind) -> CellType {
        match kind {
            Either::Left(kind) => kind,
            Either::Right(index) => self.number_formats.get(index).copied().unwrap_or(CellType::Number),
        }
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, LabelError> {
        let selected: Vec<(String, usize)> = self.sheets
            .iter()
            .filter(|(sheet_name, _)| criteria.accept(sheet_name))
            .take(criteria.sheet_limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let mut sheets = Vec::<Sheet>::new();
        for (sheet_name, pointer) in selected {
            self.reader.goto(pointer);
            self.reader.next()?; // BOF of the sheet substream
            let mut sheet = Sheet::new(&self.name, &sheet_name);
            while let Some(tag) = self.reader.next()? {
                match tag {
                    BOF | EOF => break,
                    MUL_RK => {
                        let row = self.reader.read_u16()? as usize;
                        let col_lower_bound = self.reader.read_u16()? as usize;
                        let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                        for col in col_lower_bound..=col_upper_bound {
                            let index = self.reader.read_u16()? as usize;
                            let value = self.reader.read_rk_number()?;
                            let kind = self.resolve(Either::Right(index));
                            sheet.push(Cell { row, col, kind, value: value.to_string() });
                        }
                    }
                    BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                        let row = self.reader.read_u16()? as usize;
                        let col = self.reader.read_u16()? as usize;
                        let (kind, value) = match tag {
                            BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                            NUMBER => read_number_cell(&mut self.reader)?,
                            RK => read_rk_cell(&mut self.reader)?,
                            LABEL_SST => {
                                self.reader.skip(2)?;
                                let index = self.reader.read_usize()?;
                                let value = self.shared_strings.get(index).cloned().unwrap_or_default();
                                (Either::Left(CellType::InlineString), value)
                            }
                            LABEL => read_label_cell(&mut self.reader)?,
                            _ => read_formula_cell(&mut self.reader)?,
                        };
                        let kind = self.resolve(kind);
                        sheet.push(Cell { row, col, kind, value });
                    }
                    _ => (),
                }
            }
            sheets.push(sheet);
        }

        Ok(sheets)
    }
}

fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, LabelError> {
    reader.skip(4)?; // total references
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::with_capacity(count.min(65_536));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), LabelError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    if is_error {
        Ok((Either::Left(CellType::Error), to_error_value(value).to_owned()))
    } else {
        Ok((Either::Left(CellType::Boolean), value.to_string()))
    }
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), LabelError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), LabelError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), LabelError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Cached formula result. String results live in the STRING record that follows.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<(CellKind, String), LabelError> {
    let index = reader.read_u16()? as usize;
    let bytes = reader.read_f64()?.to_bits();
    let is_number = (bytes & 0xFFFF_0000_0000_0000) != 0xFFFF_0000_0000_0000;
    if is_number {
        return Ok((Either::Right(index), f64::from_bits(bytes).to_string()));
    }
    match bytes & 0xFF {
        0 => match reader.next()? {
            Some(STRING) => Ok((Either::Left(CellType::InlineString), reader.read_xl_unicode_string()?)),
            _ => Err(XlsError::FormulaValueError(bytes))?,
        },
        1 => {
            let value = if (bytes & 0xFF_0000) > 0 { "1" } else { "0" };
            Ok((Either::Left(CellType::Boolean), value.to_owned()))
        }
        2 => {
            let code = ((bytes >> 16) & 0xFF) as u8;
            Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
        }
        3 => Ok((Either::Left(CellType::InlineString), String::new())),
        _ => Err(XlsError::FormulaValueError(bytes))?,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::table::SourceTable;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SECTOR_SIZE: usize = 512;
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE_SECTOR: u32 = 0xFFFF_FFFF;
    const FAT_SECTOR: u32 = 0xFFFF_FFFD;
    const SHARED_STRINGS: [(&str, bool); 6] = [
        ("Part No", false),
        ("Qty", false),
        ("Description", false),
        ("Location", false),
        ("L1-A", false),
        ("Gear", true),
    ];

    fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
        [row.to_le_bytes(), col.to_le_bytes(), xf.to_le_bytes()].concat()
    }

    fn short_string(text: &str) -> Vec<u8> {
        [&[text.len() as u8, 0][..], text.as_bytes()].concat()
    }

    fn shared_string(text: &str, wide: bool) -> Vec<u8> {
        if wide {
            let units: Vec<u16> = text.encode_utf16().collect();
            let mut bytes = [&(units.len() as u16).to_le_bytes()[..], &[1]].concat();
            units.iter().for_each(|unit| bytes.extend_from_slice(&unit.to_le_bytes()));
            bytes
        } else {
            [&(text.len() as u16).to_le_bytes()[..], &[0], text.as_bytes()].concat()
        }
    }

    fn bof(kind: u16) -> Vec<u8> {
        record(BOF, &[&0x0600u16.to_le_bytes()[..], &kind.to_le_bytes(), &[0u8; 12]].concat())
    }

    fn bound_sheet(pointer: u32, kind: u8, name: &str) -> Vec<u8> {
        record(BOUND_SHEET8, &[&pointer.to_le_bytes()[..], &[0, kind], &short_string(name)[..]].concat())
    }

    fn globals(sheet_offset: u32, protected: bool) -> Vec<u8> {
        let mut data = bof(0x0005);
        if protected {
            data.extend(record(FILE_PASS, &[0, 0]));
        }
        data.extend(record(CODE_PAGE, &1251u16.to_le_bytes()));
        let mut sst = [8u32.to_le_bytes(), (SHARED_STRINGS.len() as u32).to_le_bytes()].concat();
        for (text, wide) in SHARED_STRINGS {
            sst.extend(shared_string(text, wide));
        }
        data.extend(record(SST, &sst));
        data.extend(bound_sheet(0, 2, "Chart1"));
        data.extend(bound_sheet(sheet_offset, 0, "Parts"));
        data.extend(record(EOF, &[]));
        data
    }

    fn label_sst(row: u16, col: u16, index: u32) -> Vec<u8> {
        record(LABEL_SST, &[&cell_header(row, col, 0)[..], &index.to_le_bytes()].concat())
    }

    /// Integer RK values for columns `0..values.len()` of `row`.
    fn mul_rk(row: u16, values: &[u32]) -> Vec<u8> {
        let mut payload = [row.to_le_bytes(), 0u16.to_le_bytes()].concat();
        for value in values {
            payload.extend_from_slice(&0u16.to_le_bytes());
            payload.extend_from_slice(&((value << 2) | 0x02).to_le_bytes());
        }
        payload.extend_from_slice(&(values.len() as u16 - 1).to_le_bytes());
        record(MUL_RK, &payload)
    }

    fn worksheet() -> Vec<u8> {
        let mut data = bof(0x0010);
        for col in 0..4 {
            data.extend(label_sst(0, col, col as u32));
        }
        data.extend(mul_rk(1, &[1001, 5]));
        // "Болт" in code page 1251
        data.extend(record(LABEL, &[&cell_header(1, 2, 0)[..], &4u16.to_le_bytes(), &[0, 0xC1, 0xEE, 0xEB, 0xF2]].concat()));
        data.extend(label_sst(1, 3, 4));
        data.extend(mul_rk(2, &[1002, 7]));
        data.extend(label_sst(2, 2, 5));
        data.extend(label_sst(2, 3, 4));
        data.extend(record(EOF, &[]));
        data
    }

    fn workbook_stream(protected: bool) -> Vec<u8> {
        let offset = globals(0, protected).len();
        let mut data = globals(offset as u32, protected);
        data.extend(worksheet());
        data
    }

    fn directory_entry(name: &str, kind: u8, start: u32, size: u64) -> Vec<u8> {
        let mut entry = vec![0u8; 128];
        let units: Vec<u16> = name.encode_utf16().chain([0]).collect();
        for (index, unit) in units.iter().enumerate() {
            entry[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        entry[64..66].copy_from_slice(&(units.len() as u16 * 2).to_le_bytes());
        entry[66] = kind;
        entry[68..80].copy_from_slice(&[0xFF; 12]);
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..128].copy_from_slice(&size.to_le_bytes());
        entry
    }

    /// Version 3 compound file: header, one FAT sector, one directory sector, then the
    /// `Workbook` stream padded past the mini stream cutoff.
    fn compound_file(mut stream: Vec<u8>) -> Vec<u8> {
        let size = stream.len().max(4096).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        stream.resize(size, 0);
        let stream_sectors = size / SECTOR_SIZE;

        let mut header = vec![0u8; SECTOR_SIZE];
        header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
        header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        header[26..28].copy_from_slice(&3u16.to_le_bytes());
        header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        header[30..32].copy_from_slice(&9u16.to_le_bytes());
        header[32..34].copy_from_slice(&6u16.to_le_bytes());
        header[44..48].copy_from_slice(&1u32.to_le_bytes());
        header[48..52].copy_from_slice(&1u32.to_le_bytes());
        header[56..60].copy_from_slice(&4096u32.to_le_bytes());
        header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        header[76..80].copy_from_slice(&0u32.to_le_bytes());
        header[80..].fill(0xFF);

        let mut fat = vec![FREE_SECTOR; SECTOR_SIZE / 4];
        fat[0] = FAT_SECTOR;
        fat[1] = END_OF_CHAIN;
        for index in 0..stream_sectors {
            fat[2 + index] = if index + 1 < stream_sectors { (3 + index) as u32 } else { END_OF_CHAIN };
        }

        let mut directory = directory_entry("Root Entry", 5, END_OF_CHAIN, 0);
        directory.extend(directory_entry("Workbook", 2, 2, size as u64));
        directory.resize(SECTOR_SIZE, 0);

        let mut data = header;
        fat.iter().for_each(|entry| data.extend_from_slice(&entry.to_le_bytes()));
        data.extend(directory);
        data.extend(stream);
        data
    }

    /// Writes a one-worksheet `.xls` workbook with shared strings, MULRK numbers and a
    /// code page 1251 label.
    pub(crate) fn write_fixture(dir: &TempDir, file_name: &str) -> PathBuf {
        let path = dir.path().join(file_name);
        std::fs::write(&path, compound_file(workbook_stream(false))).unwrap();
        path
    }

    #[test]
    fn reads_workbook_from_compound_file() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "parts.xls");

        let mut workbook = XlsSpreadsheet::open(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Parts".to_owned()]);
        let sheets = workbook.read_sheets(&Criteria::default()).unwrap();
        assert_eq!(sheets.len(), 1);

        let table = SourceTable::from_sheet(&sheets[0]).unwrap();
        assert_eq!(table.headers(), ["PART NO", "QTY", "DESCRIPTION", "LOCATION"]);
        let rows: Vec<Vec<String>> = table
            .rows()
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        assert_eq!(rows, vec![
            vec!["1001", "5", "Болт", "L1-A"],
            vec!["1002", "7", "Gear", "L1-A"],
        ]);
    }

    #[test]
    fn rejects_password_protected_workbooks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.xls");
        std::fs::write(&path, compound_file(workbook_stream(true))).unwrap();

        match XlsSpreadsheet::open(&path) {
            Err(LabelError::SpreadsheetError(SpreadsheetError::SpreadsheetPasswordProtectedError(name))) => {
                assert!(name.ends_with("locked.xls"))
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("protected workbook was opened"),
        }
    }

    #[test]
    fn reads_formula_results() {
        let mut payload = cell_header(0, 0, 0);
        payload.extend_from_slice(&2.5f64.to_le_bytes());
        let mut data = record(FORMULA, &payload);

        let mut payload = cell_header(0, 1, 0);
        payload.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        data.extend(record(FORMULA, &payload));
        data.extend(record(STRING, &[4, 0, 0, b'B', b'-', b'0', b'7']));

        let mut payload = cell_header(0, 2, 0);
        payload.extend_from_slice(&[1, 0, 1, 0, 0, 0, 0xFF, 0xFF]);
        data.extend(record(FORMULA, &payload));

        let mut reader = Biff8Reader::new(data);
        reader.next().unwrap();
        reader.skip(4).unwrap();
        assert_eq!(read_formula_cell(&mut reader).unwrap(), (Either::Right(0), "2.5".to_owned()));

        reader.next().unwrap();
        reader.skip(4).unwrap();
        assert_eq!(read_formula_cell(&mut reader).unwrap(), (Either::Left(CellType::InlineString), "B-07".to_owned()));

        reader.next().unwrap();
        reader.skip(4).unwrap();
        assert_eq!(read_formula_cell(&mut reader).unwrap(), (Either::Left(CellType::Boolean), "1".to_owned()));
    }

    #[test]
    fn reads_bool_and_error_cells() {
        let mut data = record(BOOL_ERR, &[&cell_header(0, 0, 0)[..], &[1, 0]].concat());
        data.extend(record(BOOL_ERR, &[&cell_header(0, 1, 0)[..], &[0x2A, 1]].concat()));
        let mut reader = Biff8Reader::new(data);

        reader.next().unwrap();
        reader.skip(4).unwrap();
        assert_eq!(read_bool_or_error_cell(&mut reader).unwrap(), (Either::Left(CellType::Boolean), "1".to_owned()));

        reader.next().unwrap();
        reader.skip(4).unwrap();
        assert_eq!(read_bool_or_error_cell(&mut reader).unwrap(), (Either::Left(CellType::Error), "#N/A".to_owned()));
    }

    #[test]
    fn rejects_non_compound_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("parts.xls");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        assert!(XlsSpreadsheet::open(&path).is_err());
    }
}
