//! One generation run: read the table, build a label per location, write the PDF.

use crate::error::LabelError;
use crate::labels::columns::resolve;
use crate::labels::columns::ColumnIndices;
use crate::labels::compose::compose;
use crate::labels::compose::LabelBlock;
use crate::labels::compose::Variant;
use crate::labels::group::group_by_location;
use crate::labels::group::LocationGroup;
use crate::labels::location::tokenize;
use crate::labels::pager::paginate;
use crate::loader::load_table;
use crate::render::write_pdf;
use crate::report::Channel;
use crate::report::Reporter;
use crate::spreadsheet::criteria::Criteria;
use crate::table::SourceTable;
use anyhow::Context;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Why a run produced no file.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Error reading file: {0}")]
    ReadError(#[source] LabelError),

    #[error("No labels were generated. Check if the file has the expected columns.")]
    EmptyResultError,

    #[error("Error writing '{0}': {1}")]
    WriteError(String, #[source] LabelError),
}

/// What to generate.
#[derive(Clone, Debug)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub variant: Variant,
    pub criteria: Criteria,
}

impl Job {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, variant: Variant) -> Job {
        Job {
            input: input.into(),
            output: output.into(),
            variant,
            criteria: Criteria::default(),
        }
    }
}

/// `<stem>_<variant>.pdf` beside the input file.
pub fn default_output(input: &Path, variant: Variant) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "labels".to_owned());
    input.with_file_name(format!("{}_{}.pdf", stem, variant.tag()))
}

/// Runs the whole job, narrating through `reporter`.
///
/// Progress starts at 0, rises after every location and ends at 100 once all locations are
/// done. A location that fails is reported and skipped. Nothing is written when no label
/// was produced.
pub fn generate(job: &Job, reporter: &mut dyn Reporter) -> Result<PathBuf, GenerateError> {
    let mut channel = Channel::new(reporter);
    channel.progress(0);

    let table = load_table(&job.input, &job.criteria, &mut channel).map_err(GenerateError::ReadError)?;
    let resolution = resolve(table.headers()).map_err(GenerateError::ReadError)?;
    for warning in &resolution.warnings {
        channel.warn(&warning.to_string());
    }
    channel.status(&format!("Using columns: {}", resolution.roles));
    let columns = resolution.roles.indices(&table).map_err(GenerateError::ReadError)?;

    let groups = group_by_location(&table, columns.location);
    let total = groups.len();
    let mut labels = Vec::with_capacity(total);
    for (index, group) in groups.iter().enumerate() {
        channel.status(&format!("Processing location {}/{}: {}", index + 1, total, group.location));
        match build_label(job.variant, &table, &columns, group, &mut channel)
            .with_context(|| format!("Error processing location {}", group.location))
        {
            Ok(Some(label)) => labels.push(label),
            Ok(None) => {}
            Err(e) => {
                channel.warn(&format!("{:#}", e));
                log::debug!("{:?}", e);
            }
        }
        channel.progress(((index + 1) * 100 / total) as u8);
    }
    channel.progress(100);

    let document = paginate(labels);
    if document.is_empty() {
        channel.status(&GenerateError::EmptyResultError.to_string());
        return Err(GenerateError::EmptyResultError);
    }

    channel.status(&format!(
        "Building PDF document: {} labels on {} pages...",
        document.label_count(),
        document.page_breaks() + 1,
    ));
    let output = job.output.to_string_lossy().to_string();
    if let Err(e) = write_pdf(&document, &job.output) {
        let error = GenerateError::WriteError(output, e);
        channel.status(&error.to_string());
        return Err(error);
    }
    channel.status(&format!("PDF generated successfully: {}", output));
    Ok(job.output.to_owned())
}

/// Composes one location's label, or `None` when the group has no rows.
fn build_label(
    variant: Variant,
    table: &SourceTable,
    columns: &ColumnIndices,
    group: &LocationGroup,
    channel: &mut Channel,
) -> anyhow::Result<Option<LabelBlock>> {
    if group.rows.is_empty() {
        channel.status(&format!("No parts found for location {}. Skipping.", group.location));
        return Ok(None);
    }
    let record = group
        .select(table, columns)
        .with_context(|| format!("rows {:?} are missing from the table", group.rows))?;
    if record.duplicated {
        channel.status(&format!("Only one part found for location {}. Proceeding with single part.", group.location));
    }

    let tokens = tokenize(&record.location);
    log::debug!("Parsed location '{}' into: {:?}", record.location, tokens);
    match variant {
        Variant::Standard => channel.status(&format!(
            "Creating label for location {} with parts: {} and {}",
            group.location, record.first.part_number, record.second.part_number,
        )),
        Variant::Enhanced => channel.status(&format!(
            "Creating label for location {} with part: {}",
            group.location, record.first.part_number,
        )),
    }
    Ok(Some(compose(variant, &record, &tokens)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::Recorder;
    use crate::table::Value;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("parts.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn derives_default_output_names() {
        assert_eq!(
            default_output(Path::new("/data/parts.xlsx"), Variant::Enhanced),
            PathBuf::from("/data/parts_enhanced.pdf")
        );
        assert_eq!(
            default_output(Path::new("stock.v2.csv"), Variant::Standard),
            PathBuf::from("stock.v2_standard.pdf")
        );
    }

    #[test]
    fn generates_one_label_per_location() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(&dir, "Part No,Description,Location\nA1,Widget,L1\nA2,Gadget,L1\nA3,Sprocket,L2\n");
        let output = dir.path().join("parts_standard.pdf");
        let mut recorder = Recorder::default();

        let written = generate(&Job::new(&input, &output, Variant::Standard), &mut recorder).unwrap();
        assert_eq!(written, output);
        assert!(std::fs::read(&output).unwrap().starts_with(b"%PDF-"));
        assert_eq!(recorder.percents, vec![0, 50, 100, 100]);

        let messages = &recorder.messages;
        assert!(messages.contains(&"Using columns: Part No: PART NO, Description: DESCRIPTION, Location: LOCATION".to_owned()));
        assert!(messages.contains(&"Processing location 1/2: L1".to_owned()));
        assert!(messages.contains(&"Creating label for location L1 with parts: A1 and A2".to_owned()));
        assert!(messages.contains(&"Only one part found for location L2. Proceeding with single part.".to_owned()));
        assert!(messages.contains(&"Building PDF document: 2 labels on 1 pages...".to_owned()));
        assert_eq!(messages.last().unwrap(), &format!("PDF generated successfully: {}", output.display()));
    }

    #[test]
    fn column_fallbacks_are_reported() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(&dir, "A,B\nP1,L1\nP2,L1\n");
        let output = dir.path().join("parts_standard.pdf");
        let mut recorder = Recorder::default();

        generate(&Job::new(&input, &output, Variant::Standard), &mut recorder).unwrap();
        let messages = &recorder.messages;
        for role in ["part number", "description", "location"] {
            let warning = format!("Warning: Could not find {role} column in [A, B]");
            assert!(messages.contains(&warning), "{warning}");
        }
        assert!(messages.contains(&"Using columns: Part No: A, Description: B, Location: B".to_owned()));
        assert!(output.exists());
    }

    #[test]
    fn labels_follow_group_order() {
        let table = SourceTable::new(&["Part No", "Description", "Location"], vec![
            vec![Value::from("A1"), Value::from("Widget"), Value::from("L1")],
            vec![Value::from("A2"), Value::from("Gadget"), Value::from("L1")],
            vec![Value::from("A3"), Value::from("Sprocket"), Value::from("L2")],
        ]).unwrap();
        let columns = resolve(table.headers()).unwrap().roles.indices(&table).unwrap();
        let mut recorder = Recorder::default();
        let mut channel = Channel::new(&mut recorder);

        let labels: Vec<LabelBlock> = group_by_location(&table, columns.location)
            .iter()
            .filter_map(|group| build_label(Variant::Standard, &table, &columns, group, &mut channel).unwrap())
            .collect();
        let document = paginate(labels);
        let locations: Vec<&str> = document.labels().map(|label| label.location.as_str()).collect();
        assert_eq!(locations, vec!["L1", "L2"]);
        assert_eq!(document.page_breaks(), 0);
    }

    #[test]
    fn header_only_table_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(&dir, "Part No,Description,Location\n");
        let output = dir.path().join("parts_enhanced.pdf");
        let mut recorder = Recorder::default();

        let error = generate(&Job::new(&input, &output, Variant::Enhanced), &mut recorder).unwrap_err();
        assert!(matches!(error, GenerateError::EmptyResultError));
        assert!(!output.exists());
        assert_eq!(recorder.percents, vec![0, 100]);
        assert_eq!(
            recorder.messages.last().unwrap(),
            "No labels were generated. Check if the file has the expected columns."
        );
    }

    #[test]
    fn missing_input_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let mut recorder = Recorder::default();
        let job = Job::new(dir.path().join("nope.xlsx"), dir.path().join("nope.pdf"), Variant::Enhanced);

        let error = generate(&job, &mut recorder).unwrap_err();
        assert!(matches!(error, GenerateError::ReadError(_)));
        assert!(error.to_string().starts_with("Error reading file: File not found"));
        assert_eq!(recorder.percents, vec![0]);
    }

    #[test]
    fn unwritable_output_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let input = write_csv(&dir, "Part No,Description,Location\nA1,Widget,L1\n");
        let output = dir.path().join("missing-dir").join("labels.pdf");
        let mut recorder = Recorder::default();

        let error = generate(&Job::new(&input, &output, Variant::Enhanced), &mut recorder).unwrap_err();
        assert!(matches!(error, GenerateError::WriteError(_, _)));
        assert_eq!(recorder.percents.last(), Some(&100));
    }

    #[test]
    fn stale_group_is_reported_with_its_location() {
        let table = SourceTable::new(&["Part No", "Location"], vec![
            vec![Value::from("A1"), Value::from("L1")],
        ]).unwrap();
        let columns = ColumnIndices {
            part_number: 0,
            description: 0,
            location: 1,
        };
        let stale = LocationGroup {
            location: Value::from("L9"),
            rows: vec![5],
        };
        let mut recorder = Recorder::default();
        let error = build_label(Variant::Enhanced, &table, &columns, &stale, &mut Channel::new(&mut recorder))
            .with_context(|| format!("Error processing location {}", stale.location))
            .unwrap_err();
        assert_eq!(format!("{:#}", error), "Error processing location L9: rows [5] are missing from the table");
    }

    #[test]
    fn progress_never_decreases() {
        let dir = TempDir::new().unwrap();
        let rows: String = (0..7).map(|index| format!("P{index},Part {index},L{}\n", index % 3)).collect();
        let input = write_csv(&dir, &format!("Part No,Description,Location\n{rows}"));
        let mut recorder = Recorder::default();

        generate(&Job::new(&input, dir.path().join("out.pdf"), Variant::Standard), &mut recorder).unwrap();
        assert_eq!(recorder.percents, vec![0, 33, 66, 100, 100]);
        assert!(recorder.percents.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
