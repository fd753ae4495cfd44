use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use rusty_label::labels::compose::Variant;
use rusty_label::pipeline::default_output;
use rusty_label::pipeline::generate;
use rusty_label::pipeline::Job;
use rusty_label::report::Callbacks;
use rusty_label::shell::opener::open_in_viewer;
use rusty_label::spreadsheet::criteria::Criteria;
use std::path::PathBuf;

/// Part location label generator.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the desktop window (default).
    Gui,

    /// Generate a label PDF without the desktop window.
    Generate {
        /// Spreadsheet or CSV file with part numbers, descriptions and locations.
        input: PathBuf,

        /// Output PDF. Defaults to `<input stem>_<variant>.pdf` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Label layout: `standard` (two parts per label) or `enhanced`.
        #[arg(short, long, default_value = "enhanced")]
        variant: Variant,

        /// Glob selecting the worksheet to read; the first sheet otherwise.
        #[arg(short, long)]
        sheet: Option<String>,

        /// Open the PDF with the default viewer when done.
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command.unwrap_or(Command::Gui) {
        Command::Gui => gui(),
        Command::Generate { input, output, variant, sheet, open } => {
            let output = output.unwrap_or_else(|| default_output(&input, variant));
            let job = Job {
                input,
                output,
                variant,
                criteria: Criteria::first_sheet(sheet.as_deref())?,
            };
            let mut reporter = Callbacks::new(|_: &str| {}, |percent| log::debug!("Progress: {}%", percent));
            let path = generate(&job, &mut reporter)?;
            if open {
                if let Err(e) = open_in_viewer(&path) {
                    log::warn!("{:#}", e);
                }
            }
            Ok(())
        }
    }
}

#[cfg(feature = "gui")]
fn gui() -> Result<()> {
    rusty_label::gui::run()
}

#[cfg(not(feature = "gui"))]
fn gui() -> Result<()> {
    anyhow::bail!("This build has no desktop window; use `rusty_label generate <INPUT>`")
}
