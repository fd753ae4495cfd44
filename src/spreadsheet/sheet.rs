use crate::spreadsheet::cell::Cell;

/// Cells of one worksheet in the order the reader produced them, with the used range.
#[derive(Debug)]
pub(crate) struct Sheet {
    pub(crate) file_name: String,
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell and widens the used range. Blank values are not stored.
    pub(crate) fn push(&mut self, cell: Cell) {
        if cell.value.is_empty() {
            return;
        }
        let (row, col) = (cell.row, cell.col);
        self.row_lower_bound = Some(self.row_lower_bound.map_or(row, |lower| lower.min(row)));
        self.row_upper_bound = Some(self.row_upper_bound.map_or(row, |upper| upper.max(row)));
        self.col_lower_bound = Some(self.col_lower_bound.map_or(col, |lower| lower.min(col)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(col, |upper| upper.max(col)));
        self.cells.push(cell);
    }

    /// Dense view of the used range, row by row. Gaps are `None`.
    /// When a position was written twice the later cell wins.
    pub(crate) fn grid(&self) -> Vec<Vec<Option<&Cell>>> {
        let (Some(row_lower), Some(row_upper), Some(col_lower), Some(col_upper)) = (
            self.row_lower_bound,
            self.row_upper_bound,
            self.col_lower_bound,
            self.col_upper_bound,
        ) else {
            return Vec::new();
        };
        let width = col_upper - col_lower + 1;
        let mut grid: Vec<Vec<Option<&Cell>>> = vec![vec![None; width]; row_upper - row_lower + 1];
        for cell in &self.cells {
            grid[cell.row - row_lower][cell.col - col_lower] = Some(cell);
        }
        grid
    }
}
