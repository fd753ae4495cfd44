use crate::labels::compose::LabelBlock;
use crate::labels::compose::CM;

/// Labels that fit on one A4 page.
pub const LABELS_PER_PAGE: usize = 4;

/// Vertical gap between labels on the same page.
const LABEL_GAP: f32 = 0.2 * CM;

#[derive(Clone, Debug, PartialEq)]
pub enum DocumentItem {
    Label(LabelBlock),
    Gap(f32),
    PageBreak,
}

/// Labels in print order with the page breaks and gaps between them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub items: Vec<DocumentItem>,
}

impl Document {
    pub fn labels(&self) -> impl Iterator<Item = &LabelBlock> {
        self.items.iter().filter_map(|item| match item {
            DocumentItem::Label(label) => Some(label),
            _ => None,
        })
    }

    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    pub fn page_breaks(&self) -> usize {
        self.items.iter().filter(|item| matches!(item, DocumentItem::PageBreak)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.label_count() == 0
    }
}

/// Lays labels out four to a page.
///
/// A page break precedes every label after a multiple of four, so `n` labels get
/// `(n - 1) / 4` breaks. Label `k` (1-based) is followed by a gap when `k % 4 < 3` and it is
/// not the last label.
pub fn paginate(labels: Vec<LabelBlock>) -> Document {
    let total = labels.len();
    let mut items = Vec::with_capacity(total * 2);
    for (index, label) in labels.into_iter().enumerate() {
        if index > 0 && index % LABELS_PER_PAGE == 0 {
            items.push(DocumentItem::PageBreak);
        }
        items.push(DocumentItem::Label(label));
        let count = index + 1;
        if count % LABELS_PER_PAGE < LABELS_PER_PAGE - 1 && count < total {
            items.push(DocumentItem::Gap(LABEL_GAP));
        }
    }
    Document { items }
}
