use anyhow::Context;
use std::path::Path;
use std::process::Command;

/// The platform's "open with default application" command for `path`.
pub fn viewer_command(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.arg("/C").arg("start").arg("").arg(path);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(path);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    }
}

/// Launches the default viewer without waiting for it.
pub fn open_in_viewer(path: &Path) -> anyhow::Result<()> {
    viewer_command(path)
        .spawn()
        .with_context(|| format!("Could not open PDF automatically: {}", path.display()))?;
    Ok(())
}
