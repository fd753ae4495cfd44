use crate::error::LabelError;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CellError {
    #[error("Cell {0} holds '{1}', which is not a valid {2}")]
    ValueError(String, String, &'static str),
}

/// How the raw text of a cell should be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    Boolean,
    Number,
    /// Serial day numbers; the `1904` variants count from 1904-01-01.
    NumberDateTime1900,
    NumberDate1900,
    NumberTime1900,
    NumberDateTime1904,
    NumberDate1904,
    NumberTime1904,
    /// ISO 8601 timestamps written by OpenDocument and `t="d"` cells.
    IsoDateTime,
    /// ISO 8601 durations (`PT10H30M00S`), OpenDocument's time cells.
    IsoDuration,
    InlineString,
    /// Index into the workbook's shared string table, resolved by the reader.
    SharedString,
    Error,
}

impl CellType {
    /// Built-in number formats that denote dates and times.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(Self::date_time(is_1904)),
            "14" | "15" | "16" | "17" => Some(Self::date(is_1904)),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::time(is_1904)),
            _ => None,
        }
    }

    /// Classifies a custom format code by the date and time tokens outside of
    /// quoted literals, escapes and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::date_time(is_1904),
            (true, false) => Self::date(is_1904),
            (false, true) => Self::time(is_1904),
            (false, false) => Self::Number,
        }
    }

    fn date_time(is_1904: bool) -> Self {
        if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }
    }

    fn date(is_1904: bool) -> Self {
        if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }
    }

    fn time(is_1904: bool) -> Self {
        if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }
    }
}

/// Excel error codes as shown in the grid.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// A non-empty cell as read from the workbook: position, interpretation and raw text.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Cell {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
}

impl Cell {
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub(crate) fn to_boolean(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    pub(crate) fn to_double(&self) -> Result<f64, LabelError> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| CellError::ValueError(self.reference(), self.value.to_owned(), "number").into())
    }

    /// Renders date and time cells the way a spreadsheet shows them by default.
    /// Other kinds return their raw text.
    pub(crate) fn to_text(&self) -> Result<String, LabelError> {
        let text = match self.kind {
            CellType::Boolean => if self.to_boolean() { "TRUE" } else { "FALSE" }.to_owned(),
            CellType::NumberDateTime1900 => self.format_serial(false, true, true)?,
            CellType::NumberDate1900 => self.format_serial(false, true, false)?,
            CellType::NumberTime1900 | CellType::NumberTime1904 => self.format_serial(false, false, true)?,
            CellType::NumberDateTime1904 => self.format_serial(true, true, true)?,
            CellType::NumberDate1904 => self.format_serial(true, true, false)?,
            CellType::IsoDateTime => match self.value.split_once('T') {
                Some((date, "00:00:00")) => date.to_owned(),
                Some((date, time)) => format!("{date} {time}"),
                None => self.value.to_owned(),
            },
            CellType::IsoDuration => to_duration_string(&self.value)
                .ok_or_else(|| CellError::ValueError(self.reference(), self.value.to_owned(), "duration"))?,
            _ => self.value.to_owned(),
        };
        Ok(text)
    }

    fn format_serial(&self, is_1904: bool, with_date: bool, with_time: bool) -> Result<String, LabelError> {
        let serial = self.to_double()?;
        let datetime = serial_to_datetime(serial, is_1904)
            .ok_or_else(|| CellError::ValueError(self.reference(), self.value.to_owned(), "date"))?;
        let format = match (with_date, with_time) {
            (true, true) => "%Y-%m-%d %H:%M:%S",
            (true, false) => "%Y-%m-%d",
            _ => "%H:%M:%S",
        };
        Ok(datetime.format(format).to_string())
    }
}

/// Serial day number to a timestamp, rounded to the second.
/// The 1900 system keeps Lotus 1-2-3's phantom 1900-02-29, so serials below 60 shift by a day.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(Duration::days(days + offset))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// `PT10H05M30S` -> `10:05:30`.
fn to_duration_string(value: &str) -> Option<String> {
    let body = value.strip_prefix("PT")?;
    let (hours, rest) = body.split_once('H')?;
    let (minutes, rest) = rest.split_once('M')?;
    let seconds = rest.strip_suffix('S')?;
    let seconds = seconds.parse::<f64>().ok()?.round() as u64;
    Some(format!("{:02}:{:02}:{:02}", hours.parse::<u64>().ok()?, minutes.parse::<u64>().ok()?, seconds))
}
