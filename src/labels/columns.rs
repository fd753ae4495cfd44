//! Maps loose header names onto the three columns a label needs.

use crate::error::LabelError;
use crate::table::SourceTable;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("The table has no columns")]
    NoColumnsError,

    #[error("Column '{0}' is not in the table")]
    MissingColumnError(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    PartNumber,
    Description,
    Location,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::PartNumber => "part number",
            Role::Description => "description",
            Role::Location => "location",
        })
    }
}

/// A heuristic found nothing for `role`, so a positional column stands in.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnWarning {
    pub role: Role,
    pub headers: Vec<String>,
}

impl fmt::Display for ColumnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Warning: Could not find {} column in [{}]", self.role, self.headers.join(", "))
    }
}

/// Header names chosen for each role. All three exist in the table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRoles {
    pub part_number: String,
    pub description: String,
    pub location: String,
}

impl fmt::Display for ColumnRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Part No: {}, Description: {}, Location: {}",
            self.part_number, self.description, self.location,
        )
    }
}

impl ColumnRoles {
    /// Positions of the three columns in `table`.
    pub fn indices(&self, table: &SourceTable) -> Result<ColumnIndices, LabelError> {
        let index = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| ColumnError::MissingColumnError(name.to_owned()))
        };
        Ok(ColumnIndices {
            part_number: index(&self.part_number)?,
            description: index(&self.description)?,
            location: index(&self.location)?,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnIndices {
    pub part_number: usize,
    pub description: usize,
    pub location: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub roles: ColumnRoles,
    pub warnings: Vec<ColumnWarning>,
}

/// Resolves roles over upper-cased headers.
///
/// * part number: first header with `PART` and one of `NO`, `NUM`, `#`; else one named
///   exactly `PARTNO` or `PART`; else the first header.
/// * description: first header with `DESC`; else the second header, else the part number column.
/// * location: first header with `LOC` or `POS`; else the third header, else the description column.
pub fn resolve(headers: &[String]) -> Result<Resolution, LabelError> {
    let first = headers.first().ok_or(ColumnError::NoColumnsError)?;
    let mut warnings = Vec::new();
    let mut fallback = |role: Role, found: Option<&String>, positional: &String| -> String {
        match found {
            Some(name) => name.to_owned(),
            None => {
                warnings.push(ColumnWarning {
                    role,
                    headers: headers.to_vec(),
                });
                positional.to_owned()
            }
        }
    };

    let part_number = headers
        .iter()
        .find(|it| it.contains("PART") && (it.contains("NO") || it.contains("NUM") || it.contains('#')))
        .or_else(|| headers.iter().find(|it| *it == "PARTNO" || *it == "PART"));
    let part_number = fallback(Role::PartNumber, part_number, first);

    let description = headers.iter().find(|it| it.contains("DESC"));
    let description = fallback(Role::Description, description, headers.get(1).unwrap_or(&part_number));

    let location = headers.iter().find(|it| it.contains("LOC") || it.contains("POS"));
    let location = fallback(Role::Location, location, headers.get(2).unwrap_or(&description));

    Ok(Resolution {
        roles: ColumnRoles {
            part_number,
            description,
            location,
        },
        warnings,
    })
}
