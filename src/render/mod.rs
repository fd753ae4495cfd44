//! PDF output for a paginated [`Document`].
//!
//! Pages are A4 portrait with a 72 pt margin. Flowables stack from the top of the frame;
//! one that does not fit in what is left of the page starts a new page. Tables are centred
//! horizontally and drawn with 1 pt black rules.

pub(crate) mod font;

use crate::error::LabelError;
use crate::labels::compose::CellBlock;
use crate::labels::compose::Flowable;
use crate::labels::compose::Font;
use crate::labels::compose::HAlign;
use crate::labels::compose::Paragraph;
use crate::labels::compose::Run;
use crate::labels::compose::TableBlock;
use crate::labels::compose::VAlign;
use crate::labels::pager::Document;
use crate::labels::pager::DocumentItem;
use crate::render::font::encode;
use crate::render::font::ASCENT;
use crate::render::font::DESCENT;
use pdf_writer::Content;
use pdf_writer::Finish;
use pdf_writer::Name;
use pdf_writer::Pdf;
use pdf_writer::Rect;
use pdf_writer::Ref;
use pdf_writer::Str;
use pdf_writer::TextStr;
use std::path::Path;
use thiserror::Error;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 72.0;
const FRAME_PADDING: f32 = 6.0;
const FRAME_LEFT: f32 = MARGIN + FRAME_PADDING;
const FRAME_WIDTH: f32 = PAGE_WIDTH - 2.0 * (MARGIN + FRAME_PADDING);
const FRAME_TOP: f32 = PAGE_HEIGHT - MARGIN - FRAME_PADDING;
const FRAME_BOTTOM: f32 = MARGIN + FRAME_PADDING;
const RULE_WIDTH: f32 = 1.0;
const FONTS: [Font; 2] = [Font::Helvetica, Font::HelveticaBold];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Nothing to render: the document has no labels")]
    EmptyDocumentError,

    #[error("A {0:.1} pt block is taller than a page")]
    BlockTooTallError(f32),
}

/// A table fixed to a page position; `top` is the PDF y coordinate of its upper edge.
#[derive(Debug)]
struct Placement<'a> {
    left: f32,
    top: f32,
    table: &'a TableBlock,
}

/// Pages filled so far and the vertical position on the last one.
struct Flow<'a> {
    pages: Vec<Vec<Placement<'a>>>,
    cursor: f32,
    at_top: bool,
}

impl<'a> Flow<'a> {
    fn new() -> Self {
        Flow {
            pages: vec![Vec::new()],
            cursor: FRAME_TOP,
            at_top: true,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = FRAME_TOP;
        self.at_top = true;
    }

    /// Vertical space is dropped at the top of a page.
    fn space(&mut self, height: f32) {
        if !self.at_top {
            self.cursor -= height;
        }
    }

    fn page_break(&mut self) {
        if !self.at_top {
            self.new_page();
        }
    }

    fn table(&mut self, table: &'a TableBlock) -> Result<(), LabelError> {
        let height = table.height();
        if height > FRAME_TOP - FRAME_BOTTOM {
            Err(RenderError::BlockTooTallError(height))?;
        }
        if self.cursor - height < FRAME_BOTTOM && !self.at_top {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(Placement {
                left: FRAME_LEFT + (FRAME_WIDTH - table.width()) / 2.0,
                top: self.cursor,
                table,
            });
        }
        self.cursor -= height;
        self.at_top = false;
        Ok(())
    }
}

/// Flows the document into pages of placed tables.
fn layout(document: &Document) -> Result<Vec<Vec<Placement<'_>>>, LabelError> {
    let mut flow = Flow::new();
    for item in &document.items {
        match item {
            DocumentItem::Label(label) => {
                for flowable in &label.flowables {
                    match flowable {
                        Flowable::Table(table) => flow.table(table)?,
                        Flowable::Spacer(height) => flow.space(*height),
                    }
                }
            }
            DocumentItem::Gap(height) => flow.space(*height),
            DocumentItem::PageBreak => flow.page_break(),
        }
    }
    Ok(flow.pages)
}

/// Renders the document to PDF bytes.
pub fn render(document: &Document, title: &str) -> Result<Vec<u8>, LabelError> {
    if document.is_empty() {
        Err(RenderError::EmptyDocumentError)?;
    }
    let pages = layout(document)?;

    let mut next_id = Ref::new(1);
    let mut allocate = || next_id.bump();
    let catalog_id = allocate();
    let page_tree_id = allocate();
    let info_id = allocate();
    let font_ids: Vec<Ref> = FONTS.iter().map(|_| allocate()).collect();
    let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (allocate(), allocate())).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .kids(page_ids.iter().map(|(page_id, _)| *page_id))
        .count(page_ids.len() as i32);
    pdf.document_info(info_id)
        .title(TextStr(title))
        .producer(TextStr(concat!("rusty_label ", env!("CARGO_PKG_VERSION"))));
    for (font, font_id) in FONTS.iter().zip(&font_ids) {
        pdf.type1_font(*font_id)
            .base_font(Name(font.base_font()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    for (placements, (page_id, content_id)) in pages.iter().zip(&page_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
        page.parent(page_tree_id);
        page.contents(*content_id);
        let mut resources = page.resources();
        let mut fonts = resources.fonts();
        for (font, font_id) in FONTS.iter().zip(&font_ids) {
            fonts.pair(Name(font.resource()), *font_id);
        }
        fonts.finish();
        resources.finish();
        page.finish();

        let mut content = Content::new();
        for placement in placements {
            draw_table(&mut content, placement);
        }
        pdf.stream(*content_id, &content.finish());
    }

    Ok(pdf.finish())
}

/// Renders and writes the whole file in one call.
pub fn write_pdf(document: &Document, path: &Path) -> Result<(), LabelError> {
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "Part labels".to_owned());
    let bytes = render(document, &title)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn draw_table(content: &mut Content, placement: &Placement) {
    let table = placement.table;
    let mut row_top = placement.top;
    for row in &table.rows {
        let mut cell_left = placement.left;
        for (cell, width) in row.cells.iter().zip(&table.widths) {
            let frame = CellFrame {
                left: cell_left,
                bottom: row_top - row.height,
                width: *width,
                height: row.height,
            };
            if let Some(color) = cell.background {
                content.save_state();
                content.set_fill_rgb(
                    color.red as f32 / 255.0,
                    color.green as f32 / 255.0,
                    color.blue as f32 / 255.0,
                );
                content.rect(frame.left, frame.bottom, frame.width, frame.height);
                content.fill_nonzero();
                content.restore_state();
            }
            draw_cell_text(content, cell, &frame);
            cell_left += width;
        }
        row_top -= row.height;
    }

    content.save_state();
    content.set_line_width(RULE_WIDTH);
    content.set_stroke_rgb(0.0, 0.0, 0.0);
    let mut row_top = placement.top;
    for row in &table.rows {
        let mut cell_left = placement.left;
        for width in table.widths.iter().take(row.cells.len()) {
            content.rect(cell_left, row_top - row.height, *width, row.height);
            cell_left += width;
        }
        row_top -= row.height;
    }
    content.stroke();
    content.restore_state();
}

struct CellFrame {
    left: f32,
    bottom: f32,
    width: f32,
    height: f32,
}

/// A laid-out line: encoded runs and their total width.
struct Line {
    runs: Vec<(Font, f32, Vec<u8>)>,
    width: f32,
}

impl Line {
    fn new() -> Line {
        Line { runs: Vec::new(), width: 0.0 }
    }

    fn push(&mut self, font: Font, size: f32, encoded: Vec<u8>) {
        self.width += font.measure(&encoded, size);
        match self.runs.last_mut() {
            Some((last_font, last_size, bytes)) if *last_font == font && *last_size == size => bytes.extend(encoded),
            _ => self.runs.push((font, size, encoded)),
        }
    }

    fn max_size(&self) -> f32 {
        self.runs.iter().map(|(_, size, _)| *size).fold(0.0, f32::max)
    }
}

/// Breaks a paragraph into lines no wider than `width`.
/// A word wider than the line keeps a line of its own.
fn break_lines(paragraph: &Paragraph, width: f32) -> Vec<Line> {
    if !paragraph.wrap {
        let mut line = Line::new();
        for Run { text, font, size } in &paragraph.runs {
            line.push(*font, *size, encode(text));
        }
        return vec![line];
    }

    let mut lines = Vec::new();
    let mut line = Line::new();
    for Run { text, font, size } in &paragraph.runs {
        for word in text.split_whitespace() {
            let encoded = encode(word);
            let word_width = font.measure(&encoded, *size);
            let space_width = font.measure(b" ", *size);
            if line.runs.is_empty() {
                line.push(*font, *size, encoded);
            } else if line.width + space_width + word_width <= width {
                line.push(*font, *size, b" ".to_vec());
                line.push(*font, *size, encoded);
            } else {
                lines.push(std::mem::replace(&mut line, Line::new()));
                line.push(*font, *size, encoded);
            }
        }
    }
    if !line.runs.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

fn draw_cell_text(content: &mut Content, cell: &CellBlock, frame: &CellFrame) {
    let padding = cell.padding;
    let inner_width = frame.width - padding.left - padding.right;
    let inner_height = frame.height - padding.top - padding.bottom;
    let lines = break_lines(&cell.content, inner_width);
    let line_height = lines
        .iter()
        .map(Line::max_size)
        .fold(cell.content.leading, f32::max);
    let block_height = line_height * lines.len() as f32;
    let block_top = match cell.valign {
        VAlign::Top => frame.bottom + frame.height - padding.top,
        VAlign::Middle => frame.bottom + padding.bottom + (inner_height + block_height) / 2.0,
    };

    content.begin_text();
    for (index, line) in lines.iter().enumerate() {
        let size = line.max_size();
        let line_top = block_top - line_height * index as f32;
        let glyph_height = (ASCENT + DESCENT) * size / 1000.0;
        let baseline = line_top - (line_height - glyph_height) / 2.0 - ASCENT * size / 1000.0;
        let mut x = match cell.align {
            HAlign::Left => frame.left + padding.left,
            HAlign::Center => frame.left + padding.left + (inner_width - line.width) / 2.0,
        };
        for (font, size, bytes) in &line.runs {
            content.set_font(Name(font.resource()), *size);
            content.set_text_matrix([1.0, 0.0, 0.0, 1.0, x, baseline]);
            content.show(Str(bytes));
            x += font.measure(bytes, *size);
        }
    }
    content.end_text();
}
