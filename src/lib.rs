//! # Part Location Labels
//!
//! Turns a part inventory (spreadsheet or CSV) into printable A4 label sheets, one label per
//! storage location, each label carrying the part number, description and a colour-coded
//! location strip.
//!
//! ## Features
//!
//! - **Input formats**: Excel (`.xlsx`, `.xlsm`, `.xlam`, `.xls`, `.xla`), OpenDocument
//!   (`.ods`) and CSV in UTF-8 or Latin-1, with automatic fallback when a file does not
//!   decode as its extension suggests
//! - **Loose headers**: part number, description and location columns are found by name
//!   heuristics with positional fallback
//! - **Two layouts**: `standard` prints two parts per location, `enhanced` one part with a
//!   large part number and wrapped description
//! - **Pure Rust PDF output**: base-14 Helvetica fonts, four labels per page
//! - **Desktop shell**: egui window with one tab per layout, running each job on a worker
//!   thread (feature `gui`)
//!
//! ## Usage
//!
//! ```no_run
//! use rusty_label::labels::compose::Variant;
//! use rusty_label::pipeline::{generate, Job};
//! use rusty_label::report::Silent;
//!
//! let job = Job::new("parts.xlsx", "parts_enhanced.pdf", Variant::Enhanced);
//! let pdf = generate(&job, &mut Silent)?;
//! println!("{}", pdf.display());
//! # Ok::<(), rusty_label::pipeline::GenerateError>(())
//! ```

pub mod error;
mod helpers;
pub mod labels;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod shell;
pub mod spreadsheet;
pub mod table;

#[cfg(feature = "gui")]
pub mod gui;
