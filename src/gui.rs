//! Desktop front end: one tab per layout variant, each driving its own session.

use crate::labels::compose::Variant;
use crate::shell::opener::open_in_viewer;
use crate::shell::session::Outcome;
use crate::shell::session::Session;
use eframe::egui;
use eframe::egui::Context;
use eframe::egui::ProgressBar;
use eframe::egui::TextEdit;
use eframe::App;
use eframe::Frame;
use eframe::NativeOptions;
use rfd::MessageButtons;
use rfd::MessageDialog;
use rfd::MessageLevel;
use std::path::Path;

const TITLE: &str = "Combined Part Label Generator";

struct LabelApp {
    tab: Variant,
    enhanced: Session,
    standard: Session,
}

impl LabelApp {
    fn new() -> Self {
        LabelApp {
            tab: Variant::Enhanced,
            enhanced: Session::new(Variant::Enhanced),
            standard: Session::new(Variant::Standard),
        }
    }

    fn session(&mut self) -> &mut Session {
        match self.tab {
            Variant::Enhanced => &mut self.enhanced,
            Variant::Standard => &mut self.standard,
        }
    }
}

impl App for LabelApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        for session in [&mut self.enhanced, &mut self.standard] {
            if let Some(outcome) = session.poll() {
                show_outcome(outcome);
            }
        }

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for variant in [Variant::Enhanced, Variant::Standard] {
                    ui.selectable_value(&mut self.tab, variant, variant.title());
                }
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| form(ui, self.session()));
    }
}

fn form(ui: &mut egui::Ui, session: &mut Session) {
    ui.heading(format!("{} labels", session.variant.title()));
    ui.separator();

    egui::Grid::new("paths").num_columns(3).spacing([8.0, 6.0]).show(ui, |ui| {
        ui.label("Input file:");
        ui.add(TextEdit::singleline(&mut session.input).desired_width(480.0));
        if ui.button("Browse...").clicked() {
            let picked = rfd::FileDialog::new()
                .set_title("Select input file")
                .add_filter("Excel files", &["xlsx", "xls", "csv"])
                .add_filter("All files", &["*"])
                .pick_file();
            if let Some(path) = picked {
                session.set_input(&path);
            }
        }
        ui.end_row();

        ui.label("Output PDF:");
        ui.add(TextEdit::singleline(&mut session.output).desired_width(480.0));
        if ui.button("Browse...").clicked() {
            let name = Path::new(&session.output)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let picked = rfd::FileDialog::new()
                .set_title("Save PDF as")
                .add_filter("PDF files", &["pdf"])
                .set_file_name(name)
                .save_file();
            if let Some(mut path) = picked {
                if path.extension().is_none() {
                    path.set_extension("pdf");
                }
                session.set_output(&path);
            }
        }
        ui.end_row();
    });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        if ui.add_enabled(!session.is_running(), egui::Button::new("Generate PDF")).clicked() {
            let ctx = ui.ctx().clone();
            if let Err(e) = session.start(move || ctx.request_repaint()) {
                log::warn!("{}", e);
                message(MessageLevel::Error, "Error", &e.to_string());
            }
        }
        if ui.button("Clear").clicked() {
            session.clear();
        }
        if ui.button("Exit").clicked() {
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
        }
    });

    ui.add_space(8.0);
    ui.add(ProgressBar::new(f32::from(session.progress) / 100.0).show_percentage());

    ui.add_space(8.0);
    ui.label("Log:");
    egui::Frame::group(ui.style()).show(ui, |ui| {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &session.log {
                    ui.monospace(line);
                }
            });
    });
}

fn show_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Succeeded(path) => {
            message(
                MessageLevel::Info,
                "Success",
                &format!("PDF generated successfully:\n{}", path.display()),
            );
            if let Err(e) = open_in_viewer(&path) {
                log::warn!("{:#}", e);
            }
        }
        Outcome::Failed(reason) => {
            log::error!("{}", reason);
            message(
                MessageLevel::Error,
                "Error",
                "Failed to generate PDF. Check the log for details.",
            );
        }
    }
}

fn message(level: MessageLevel, title: &str, description: &str) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// Opens the desktop window and blocks until it is closed.
pub fn run() -> anyhow::Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITLE)
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };
    eframe::run_native(TITLE, options, Box::new(|_cc| Ok(Box::new(LabelApp::new()))))
        .map_err(|e| anyhow::anyhow!("Cannot start the desktop shell: {}", e))
}
