//! Presentation capabilities the controllers render through.

use shared::domain::{DownloadArtifact, FileInfo};

use crate::{fallback::ProbePhase, state::ActionControl};

/// Regions both controllers share.
pub trait Presenter {
    fn render_file_info(&mut self, info: Option<&FileInfo>);
    /// `None` hides the error region.
    fn render_error(&mut self, message: Option<&str>);
    fn render_notice(&mut self, message: &str);
    /// Hands the bytes to the host for saving. The artifact is dropped as
    /// soon as this returns.
    fn deliver(&mut self, artifact: &DownloadArtifact) -> anyhow::Result<()>;
}

pub trait ConverterPresenter: Presenter {
    fn render_status(&mut self, message: &str);
    fn render_conversion(&mut self, visible: bool);
    fn render_progress(&mut self, percent: u8, message: &str);
    fn render_action(&mut self, action: ActionControl);
    fn render_download(&mut self, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FallbackSections {
    pub status: bool,
    pub upload: bool,
    pub alternatives: bool,
}

pub trait FallbackPresenter: Presenter {
    fn render_probe(&mut self, phase: ProbePhase, message: &str);
    fn render_sections(&mut self, sections: FallbackSections);
    fn render_rename(&mut self, visible: bool);
}
