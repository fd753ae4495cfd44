//! Label geometry: which tables a label is made of, their sizes, fonts and colours.
//!
//! Everything here is measured in PDF points. Composition is pure; measuring text and
//! wrapping lines is left to the renderer.

use crate::labels::group::LabelRecord;
use crate::labels::group::PartFields;
use crate::labels::location::LocationTokens;
use crate::labels::location::TOKEN_COUNT;
use std::fmt;
use std::str::FromStr;

/// One centimetre in points.
pub const CM: f32 = 72.0 / 2.54;

const LABEL_COLUMN_WIDTH: f32 = 4.0 * CM;
const VALUE_COLUMN_WIDTH: f32 = 11.0 * CM;
const TOKEN_WEIGHTS: [f32; TOKEN_COUNT] = [1.8, 2.7, 1.3, 1.3, 1.3, 1.3, 1.3];
const TOKEN_COLORS: [Color; TOKEN_COUNT] = [
    Color::hex(0xE9967A),
    Color::hex(0xADD8E6),
    Color::hex(0x90EE90),
    Color::hex(0xFFD700),
    Color::hex(0xADD8E6),
    Color::hex(0xE9967A),
    Color::hex(0x90EE90),
];
const CAPTION_SIZE: f32 = 16.0;
const PART_SPLIT: usize = 5;
const DESCRIPTION_LIMIT: usize = 50;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Variant {
    /// Two part blocks per label, compact rows, truncated descriptions.
    Standard,
    /// One part block per label, large part number, wrapped description.
    #[default]
    Enhanced,
}

impl Variant {
    /// File name suffix and command-line spelling.
    pub fn tag(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Enhanced => "enhanced",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Variant::Standard => "Standard layout",
            Variant::Enhanced => "Enhanced layout",
        }
    }

    fn style(self) -> Style {
        match self {
            Variant::Standard => Style {
                part_row_height: 1.3 * CM,
                description_row_height: 0.8 * CM,
                part_sizes: (17.0, 22.0),
                part_leading: 20.0,
                part_align: HAlign::Left,
                part_valign: VAlign::Middle,
                part_caption_valign: VAlign::Middle,
                part_padding: Padding::horizontal(5.0),
                description_size: 16.0,
                description_leading: 16.0 * 1.2,
                description_limit: Some(DESCRIPTION_LIMIT),
                description_valign: VAlign::Top,
                location_row_height: 0.8 * CM,
                token_size: 14.0,
                part_tables: 2,
            },
            Variant::Enhanced => Style {
                part_row_height: 1.9 * CM,
                description_row_height: 2.1 * CM,
                part_sizes: (34.0, 40.0),
                part_leading: 12.0,
                part_align: HAlign::Center,
                part_valign: VAlign::Top,
                part_caption_valign: VAlign::Middle,
                part_padding: Padding {
                    top: 10.0,
                    bottom: 5.0,
                    ..Padding::horizontal(5.0)
                },
                description_size: 20.0,
                description_leading: 16.0,
                description_limit: None,
                description_valign: VAlign::Middle,
                location_row_height: 0.9 * CM,
                token_size: 16.0,
                part_tables: 1,
            },
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" | "v1" => Ok(Variant::Standard),
            "enhanced" | "v2" => Ok(Variant::Enhanced),
            _ => Err(format!("Unknown label variant '{value}', expected 'standard' or 'enhanced'")),
        }
    }
}

struct Style {
    part_row_height: f32,
    description_row_height: f32,
    part_sizes: (f32, f32),
    part_leading: f32,
    part_align: HAlign,
    part_valign: VAlign,
    part_caption_valign: VAlign,
    part_padding: Padding,
    description_size: f32,
    description_leading: f32,
    description_limit: Option<usize>,
    description_valign: VAlign,
    location_row_height: f32,
    token_size: f32,
    part_tables: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn hex(rgb: u32) -> Color {
        Color {
            red: (rgb >> 16) as u8,
            green: (rgb >> 8) as u8,
            blue: rgb as u8,
        }
    }
}

/// Text in a single font and size.
#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub text: String,
    pub font: Font,
    pub size: f32,
}

/// Runs laid out as one flow of text.
/// Without `wrap` the text stays on a single line however wide it is.
#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub leading: f32,
    pub wrap: bool,
}

impl Paragraph {
    fn plain(text: &str, font: Font, size: f32) -> Paragraph {
        Paragraph {
            runs: vec![Run {
                text: text.to_owned(),
                font,
                size,
            }],
            leading: size * 1.2,
            wrap: false,
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Padding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Padding {
    const fn horizontal(side: f32) -> Padding {
        Padding {
            left: side,
            right: side,
            ..Padding::DEFAULT
        }
    }

    pub const DEFAULT: Padding = Padding {
        left: 6.0,
        right: 6.0,
        top: 3.0,
        bottom: 3.0,
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellBlock {
    pub content: Paragraph,
    pub align: HAlign,
    pub valign: VAlign,
    pub padding: Padding,
    pub background: Option<Color>,
}

impl CellBlock {
    fn caption(text: &str, valign: VAlign, padding: Padding) -> CellBlock {
        CellBlock {
            content: Paragraph::plain(text, Font::Helvetica, CAPTION_SIZE),
            align: HAlign::Center,
            valign,
            padding,
            background: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowBlock {
    pub height: f32,
    pub cells: Vec<CellBlock>,
}

/// A grid with fixed column widths and row heights, drawn with 1 pt black rules.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    pub widths: Vec<f32>,
    pub rows: Vec<RowBlock>,
}

impl TableBlock {
    pub fn width(&self) -> f32 {
        self.widths.iter().sum()
    }

    pub fn height(&self) -> f32 {
        self.rows.iter().map(|row| row.height).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Flowable {
    Table(TableBlock),
    Spacer(f32),
}

impl Flowable {
    pub fn height(&self) -> f32 {
        match self {
            Flowable::Table(table) => table.height(),
            Flowable::Spacer(height) => *height,
        }
    }
}

/// Everything printed for one location, top to bottom.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelBlock {
    pub location: String,
    pub flowables: Vec<Flowable>,
}

impl LabelBlock {
    pub fn height(&self) -> f32 {
        self.flowables.iter().map(Flowable::height).sum()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.flowables.iter().filter_map(|flowable| match flowable {
            Flowable::Table(table) => Some(table),
            Flowable::Spacer(_) => None,
        })
    }
}

/// Builds the label for `record`.
/// Standard: part table, 0.3 cm, second part table, location strip, 0.2 cm.
/// Enhanced: part table, 0.3 cm, location strip, 0.2 cm.
pub fn compose(variant: Variant, record: &LabelRecord, tokens: &LocationTokens) -> LabelBlock {
    let style = variant.style();
    let mut flowables = vec![
        Flowable::Table(part_table(&style, &record.first)),
        Flowable::Spacer(0.3 * CM),
    ];
    if style.part_tables > 1 {
        flowables.push(Flowable::Table(part_table(&style, &record.second)));
    }
    flowables.push(Flowable::Table(location_strip(&style, tokens)));
    flowables.push(Flowable::Spacer(0.2 * CM));
    LabelBlock {
        location: record.location.to_owned(),
        flowables,
    }
}

fn part_table(style: &Style, part: &PartFields) -> TableBlock {
    let caption_padding = Padding::horizontal(5.0);
    let description = match style.description_limit {
        Some(limit) => part.description.chars().take(limit).collect(),
        None => part.description.to_owned(),
    };
    let mut description = Paragraph::plain(&description, Font::Helvetica, style.description_size);
    description.leading = style.description_leading;
    description.wrap = style.description_limit.is_none();

    TableBlock {
        widths: vec![LABEL_COLUMN_WIDTH, VALUE_COLUMN_WIDTH],
        rows: vec![
            RowBlock {
                height: style.part_row_height,
                cells: vec![
                    CellBlock::caption("Part No", style.part_caption_valign, caption_padding),
                    CellBlock {
                        content: part_number(&part.part_number, style.part_sizes, style.part_leading),
                        align: style.part_align,
                        valign: style.part_valign,
                        padding: style.part_padding,
                        background: None,
                    },
                ],
            },
            RowBlock {
                height: style.description_row_height,
                cells: vec![
                    CellBlock::caption("Description", style.description_valign, caption_padding),
                    CellBlock {
                        content: description,
                        align: HAlign::Left,
                        valign: style.description_valign,
                        padding: caption_padding,
                        background: None,
                    },
                ],
            },
        ],
    }
}

/// Bold part number whose last five characters print larger than the rest.
/// Five characters or fewer print in the smaller size.
fn part_number(text: &str, (prefix_size, suffix_size): (f32, f32), leading: f32) -> Paragraph {
    let length = text.chars().count();
    let runs = if length > PART_SPLIT {
        let split = text
            .char_indices()
            .nth(length - PART_SPLIT)
            .map(|(index, _)| index)
            .unwrap_or(0);
        vec![
            Run {
                text: text[..split].to_owned(),
                font: Font::HelveticaBold,
                size: prefix_size,
            },
            Run {
                text: text[split..].to_owned(),
                font: Font::HelveticaBold,
                size: suffix_size,
            },
        ]
    } else {
        vec![Run {
            text: text.to_owned(),
            font: Font::HelveticaBold,
            size: prefix_size,
        }]
    };
    Paragraph {
        runs,
        leading,
        wrap: false,
    }
}

/// Column widths of the location strip: a fixed caption column, then the token columns
/// sharing the value width by weight.
pub fn location_widths() -> Vec<f32> {
    let total: f32 = TOKEN_WEIGHTS.iter().sum();
    std::iter::once(LABEL_COLUMN_WIDTH)
        .chain(TOKEN_WEIGHTS.iter().map(|weight| weight * VALUE_COLUMN_WIDTH / total))
        .collect()
}

fn location_strip(style: &Style, tokens: &LocationTokens) -> TableBlock {
    let mut cells = vec![CellBlock::caption("Part Location", VAlign::Top, Padding::DEFAULT)];
    cells.extend(tokens.iter().zip(TOKEN_COLORS).map(|(token, color)| CellBlock {
        content: Paragraph::plain(token, Font::Helvetica, style.token_size),
        align: HAlign::Center,
        valign: VAlign::Top,
        padding: Padding::DEFAULT,
        background: Some(color),
    }));
    TableBlock {
        widths: location_widths(),
        rows: vec![RowBlock {
            height: style.location_row_height,
            cells,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::location::tokenize;
    use pretty_assertions::assert_eq;

    fn record(first: (&str, &str), second: (&str, &str)) -> LabelRecord {
        LabelRecord {
            first: PartFields {
                part_number: first.0.to_owned(),
                description: first.1.to_owned(),
            },
            second: PartFields {
                part_number: second.0.to_owned(),
                description: second.1.to_owned(),
            },
            location: "12M_ST-140_R_0_2_A_1".to_owned(),
            duplicated: false,
        }
    }

    fn texts(table: &TableBlock) -> Vec<Vec<String>> {
        table
            .rows
            .iter()
            .map(|row| row.cells.iter().map(|cell| cell.content.text()).collect())
            .collect()
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-3, "{actual} != {expected}");
    }

    #[test]
    fn parses_variant_names() {
        assert_eq!("Standard".parse::<Variant>(), Ok(Variant::Standard));
        assert_eq!("v2".parse::<Variant>(), Ok(Variant::Enhanced));
        assert!("compact".parse::<Variant>().is_err());
        assert_eq!(Variant::Enhanced.to_string(), "enhanced");
    }

    #[test]
    fn standard_label_stacks_two_part_tables() {
        let record = record(("ABC1234567", "Hex bolt"), ("XY", "Washer"));
        let label = compose(Variant::Standard, &record, &tokenize(&record.location));

        let heights: Vec<f32> = label.flowables.iter().map(Flowable::height).collect();
        let expected = [2.1 * CM, 0.3 * CM, 2.1 * CM, 0.8 * CM, 0.2 * CM];
        assert_eq!(heights.len(), expected.len());
        for (actual, expected) in heights.iter().zip(expected) {
            assert_close(*actual, expected);
        }

        let tables: Vec<&TableBlock> = label.tables().collect();
        assert_eq!(texts(tables[0]), vec![vec!["Part No", "ABC1234567"], vec!["Description", "Hex bolt"]]);
        assert_eq!(texts(tables[1]), vec![vec!["Part No", "XY"], vec!["Description", "Washer"]]);
        assert_eq!(texts(tables[2]), vec![vec!["Part Location", "12M", "ST-140", "R", "0", "2", "A", "1"]]);
        assert_eq!(label.location, "12M_ST-140_R_0_2_A_1");
    }

    #[test]
    fn enhanced_label_shows_first_record_only() {
        let record = record(("ABC1234567", "Hex bolt"), ("XY", "Washer"));
        let label = compose(Variant::Enhanced, &record, &tokenize(&record.location));

        let heights: Vec<f32> = label.flowables.iter().map(Flowable::height).collect();
        let expected = [4.0 * CM, 0.3 * CM, 0.9 * CM, 0.2 * CM];
        assert_eq!(heights.len(), expected.len());
        for (actual, expected) in heights.iter().zip(expected) {
            assert_close(*actual, expected);
        }
        let tables: Vec<&TableBlock> = label.tables().collect();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows[0].cells[1].align, HAlign::Center);
        assert_eq!(tables[0].rows[0].cells[1].padding.top, 10.0);
        assert!(tables[0].rows[1].cells[1].content.wrap);
    }

    #[test]
    fn part_number_splits_last_five_characters() {
        let paragraph = part_number("ABC1234567", (17.0, 22.0), 20.0);
        assert_eq!(paragraph.runs, vec![
            Run { text: "ABC12".to_owned(), font: Font::HelveticaBold, size: 17.0 },
            Run { text: "34567".to_owned(), font: Font::HelveticaBold, size: 22.0 },
        ]);

        let paragraph = part_number("12345", (34.0, 40.0), 12.0);
        assert_eq!(paragraph.runs, vec![
            Run { text: "12345".to_owned(), font: Font::HelveticaBold, size: 34.0 },
        ]);

        let paragraph = part_number("ÄÖÜ-12345", (34.0, 40.0), 12.0);
        assert_eq!(paragraph.runs[0].text, "ÄÖÜ-");
        assert_eq!(paragraph.runs[1].text, "12345");
    }

    #[test]
    fn standard_descriptions_are_truncated() {
        let long = "x".repeat(80);
        let record = record(("P1", &long), ("P2", "short"));
        let standard = compose(Variant::Standard, &record, &tokenize("A"));
        let enhanced = compose(Variant::Enhanced, &record, &tokenize("A"));

        let description = |label: &LabelBlock| label.tables().next().unwrap().rows[1].cells[1].content.text();
        assert_eq!(description(&standard).chars().count(), 50);
        assert_eq!(description(&enhanced).chars().count(), 80);
    }

    #[test]
    fn location_strip_colors_and_widths() {
        let widths = location_widths();
        assert_eq!(widths.len(), 8);
        assert_close(widths[0], 4.0 * CM);
        assert_close(widths[1..].iter().sum(), 11.0 * CM);
        assert_close(widths[2] / widths[1], 2.7 / 1.8);
        assert_close(widths[3] / widths[1], 1.3 / 1.8);

        let record = record(("P1", "D1"), ("P1", "D1"));
        let label = compose(Variant::Enhanced, &record, &tokenize("A B"));
        let strip = label.tables().last().unwrap();
        let backgrounds: Vec<Option<Color>> = strip.rows[0].cells.iter().map(|cell| cell.background).collect();
        assert_eq!(backgrounds, vec![
            None,
            Some(Color { red: 0xE9, green: 0x96, blue: 0x7A }),
            Some(Color { red: 0xAD, green: 0xD8, blue: 0xE6 }),
            Some(Color { red: 0x90, green: 0xEE, blue: 0x90 }),
            Some(Color { red: 0xFF, green: 0xD7, blue: 0x00 }),
            Some(Color { red: 0xAD, green: 0xD8, blue: 0xE6 }),
            Some(Color { red: 0xE9, green: 0x96, blue: 0x7A }),
            Some(Color { red: 0x90, green: 0xEE, blue: 0x90 }),
        ]);
        assert_eq!(strip.rows[0].cells[3].content.text(), "");
    }
}
