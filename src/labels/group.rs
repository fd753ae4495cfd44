use crate::labels::columns::ColumnIndices;
use crate::table::SourceTable;
use crate::table::Value;
use std::collections::HashMap;

/// Rows sharing one raw location value, in table order.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationGroup {
    pub location: Value,
    pub rows: Vec<usize>,
}

/// Part number and description of one source row, as printed.
#[derive(Clone, Debug, PartialEq)]
pub struct PartFields {
    pub part_number: String,
    pub description: String,
}

/// The rows printed on one label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRecord {
    pub first: PartFields,
    pub second: PartFields,
    pub location: String,
    /// The group had a single row, so `second` repeats `first`.
    pub duplicated: bool,
}

/// Groups rows by the value in column `location`, in order of first appearance.
/// Rows with an empty location belong to no group.
pub fn group_by_location(table: &SourceTable, location: usize) -> Vec<LocationGroup> {
    let mut groups: Vec<LocationGroup> = Vec::new();
    let mut positions: HashMap<&Value, usize> = HashMap::new();
    for (index, row) in table.rows().iter().enumerate() {
        let Some(value) = row.get(location).filter(|value| !value.is_empty()) else {
            continue;
        };
        match positions.get(value) {
            Some(&position) => groups[position].rows.push(index),
            None => {
                positions.insert(value, groups.len());
                groups.push(LocationGroup {
                    location: value.clone(),
                    rows: vec![index],
                });
            }
        }
    }
    groups
}

impl LocationGroup {
    /// First and second row of the group; a lone row fills both slots.
    /// `None` for a group without rows or rows outside the table.
    pub fn select(&self, table: &SourceTable, columns: &ColumnIndices) -> Option<LabelRecord> {
        let fields = |index: usize| -> Option<(PartFields, String)> {
            let row = table.rows().get(index)?;
            let text = |column: usize| row.get(column).map(ToString::to_string);
            Some((
                PartFields {
                    part_number: text(columns.part_number)?,
                    description: text(columns.description)?,
                },
                text(columns.location)?,
            ))
        };

        let (first, location) = fields(*self.rows.first()?)?;
        let (second, duplicated) = match self.rows.get(1) {
            Some(&index) => (fields(index)?.0, false),
            None => (first.clone(), true),
        };
        Some(LabelRecord {
            first,
            second,
            location,
            duplicated,
        })
    }
}
