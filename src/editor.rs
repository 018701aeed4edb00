//! Editing entry text in an external editor.
//!
//! The text is written to a temporary `.md` file, the editor command runs
//! through `sh -c` so commands with arguments (`code --wait`) work, and the
//! file is read back once the editor exits.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Open `initial` in `command` and return the edited text.
///
/// Returns `None` when the text came back unchanged.
pub fn edit_text(command: &str, initial: &str) -> Result<Option<String>> {
    let mut file = tempfile::Builder::new()
        .prefix("apunto-")
        .suffix(".md")
        .tempfile()
        .context("Failed to create temporary file")?;
    file.write_all(initial.as_bytes())
        .and_then(|()| file.flush())
        .context("Failed to write temporary file")?;

    run_editor(command, file.path())?;

    let edited = std::fs::read_to_string(file.path()).context("Failed to read edited text")?;
    if edited == initial {
        tracing::debug!("Editor returned unchanged text");
        return Ok(None);
    }
    Ok(Some(edited))
}

fn run_editor(command: &str, path: &Path) -> Result<()> {
    let path_text = path.to_string_lossy();
    if path_text.starts_with('-') {
        bail!("Refusing to pass option-like path to editor");
    }

    tracing::debug!(editor = %command, "Launching editor");
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} {}", command, shell_quote(&path_text)))
        .status()
        .with_context(|| format!("Failed to run editor `{}`", command))?;

    if !status.success() {
        bail!("Editor `{}` exited with {}", command, status);
    }
    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
