use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use converter_core::{
    ActionControl, ConverterPresenter, FallbackPresenter, FallbackSections, Presenter, ProbePhase,
};
use shared::domain::{DownloadArtifact, FileInfo};
use tracing::debug;

/// Renders controller output as terminal lines and saves downloads into a
/// directory.
pub struct TerminalPresenter<W> {
    out: W,
    out_dir: PathBuf,
    last_progress: Option<u8>,
    saved: Vec<PathBuf>,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout(out_dir: impl Into<PathBuf>) -> Self {
        Self::new(std::io::stdout(), out_dir)
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out,
            out_dir: out_dir.into(),
            last_progress: None,
            saved: Vec::new(),
        }
    }

    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // A closed stdout must not abort a conversion.
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render_file_info(&mut self, info: Option<&FileInfo>) {
        if let Some(info) = info {
            self.line(&format!("File: {} ({})", info.name, info.size_label));
        }
    }

    fn render_error(&mut self, message: Option<&str>) {
        if let Some(message) = message {
            self.line(&format!("Error: {message}"));
        }
    }

    fn render_notice(&mut self, message: &str) {
        self.line(message);
    }

    fn deliver(&mut self, artifact: &DownloadArtifact) -> anyhow::Result<()> {
        let path = save_artifact(&self.out_dir, artifact)?;
        self.line(&format!("Saved {} ({})", path.display(), artifact.media_type));
        self.saved.push(path);
        Ok(())
    }
}

impl<W: Write> ConverterPresenter for TerminalPresenter<W> {
    fn render_status(&mut self, message: &str) {
        self.line(message);
    }

    fn render_conversion(&mut self, visible: bool) {
        if !visible {
            self.last_progress = None;
        }
    }

    fn render_progress(&mut self, percent: u8, message: &str) {
        if self.last_progress == Some(percent) {
            return;
        }
        self.last_progress = Some(percent);
        self.line(&format!("[{percent:>3}%] {message}"));
    }

    fn render_action(&mut self, action: ActionControl) {
        debug!(enabled = action.enabled, label = action.label, "action control");
    }

    fn render_download(&mut self, visible: bool) {
        if visible {
            self.line("Conversion finished, result ready to save.");
        }
    }
}

impl<W: Write> FallbackPresenter for TerminalPresenter<W> {
    fn render_probe(&mut self, phase: ProbePhase, message: &str) {
        debug!(?phase, "probe phase");
        self.line(message);
    }

    fn render_sections(&mut self, sections: FallbackSections) {
        if sections.alternatives {
            self.line(
                "Alternatives: install ffmpeg and run `movconv convert`, or use a desktop converter such as HandBrake or VLC.",
            );
        }
    }

    fn render_rename(&mut self, visible: bool) {
        debug!(visible, "rename control");
    }
}

fn save_artifact(out_dir: &Path, artifact: &DownloadArtifact) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create '{}'", out_dir.display()))?;
    let path = out_dir.join(&artifact.file_name);
    fs::write(&path, &artifact.bytes[..])
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
