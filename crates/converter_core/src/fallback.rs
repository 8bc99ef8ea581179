//! Degraded converter: capability probe plus an extension-only rename.

use std::time::Duration;

use shared::{
    domain::{CapabilityReport, DownloadArtifact, FileInfo, SelectedFile},
    format::{renamed_file_name, validate_selection},
};
use tracing::{debug, info, warn};

use crate::{
    error::ConverterError,
    presenter::{FallbackPresenter, FallbackSections},
};

pub const RENAME_NOTICE: &str = "File renamed and downloaded! Note: This only changes the extension - actual conversion may still be needed for compatibility.";

pub trait CapabilityProbe {
    fn probe(&self) -> CapabilityReport;
}

/// A fixed report, for hosts that detect capabilities up front.
impl CapabilityProbe for CapabilityReport {
    fn probe(&self) -> CapabilityReport {
        *self
    }
}

pub struct NativeProbe;

impl CapabilityProbe for NativeProbe {
    fn probe(&self) -> CapabilityReport {
        CapabilityReport::native()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Probing,
    TestingEngine,
    Limited,
    AlternativesOffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackTimings {
    pub initial: Duration,
    pub engine_test: Duration,
    pub reveal: Duration,
}

impl Default for FallbackTimings {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            engine_test: Duration::from_millis(2000),
            reveal: Duration::from_millis(1500),
        }
    }
}

impl FallbackTimings {
    pub fn immediate() -> Self {
        Self {
            initial: Duration::ZERO,
            engine_test: Duration::ZERO,
            reveal: Duration::ZERO,
        }
    }
}

pub struct FallbackConverter<P, C> {
    presenter: P,
    probe: C,
    timings: FallbackTimings,
    phase: ProbePhase,
    file: Option<SelectedFile>,
}

impl<P: FallbackPresenter, C: CapabilityProbe> FallbackConverter<P, C> {
    pub fn new(presenter: P, probe: C, timings: FallbackTimings) -> Self {
        Self {
            presenter,
            probe,
            timings,
            phase: ProbePhase::Probing,
            file: None,
        }
    }

    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Checks host capabilities and then offers the alternatives. The report is
    /// diagnostic only: alternatives are offered whatever it says.
    pub async fn probe_capabilities(&mut self) -> CapabilityReport {
        self.presenter.render_sections(FallbackSections {
            status: true,
            ..FallbackSections::default()
        });
        self.enter(ProbePhase::Probing, "Checking browser capabilities...");

        let report = self.probe.probe();
        info!(
            webassembly = report.webassembly,
            shared_memory = report.shared_memory,
            workers = report.workers,
            file_reading = report.file_reading,
            "browser capabilities"
        );

        tokio::time::sleep(self.timings.initial).await;
        if report.all_present() {
            self.enter(ProbePhase::TestingEngine, "Testing video converter...");
            tokio::time::sleep(self.timings.engine_test).await;
        }

        self.show_alternatives().await;
        report
    }

    /// Same as the initial probe.
    pub async fn retry(&mut self) -> CapabilityReport {
        self.presenter.render_error(None);
        self.probe_capabilities().await
    }

    async fn show_alternatives(&mut self) {
        self.enter(ProbePhase::Limited, "Browser-based conversion has limitations");
        tokio::time::sleep(self.timings.reveal).await;
        self.phase = ProbePhase::AlternativesOffered;
        self.presenter.render_sections(FallbackSections {
            status: false,
            upload: true,
            alternatives: true,
        });
    }

    fn enter(&mut self, phase: ProbePhase, message: &str) {
        debug!(?phase, "probe phase");
        self.phase = phase;
        self.presenter.render_probe(phase, message);
    }

    /// Extension check only; there is no size limit on this path.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), ConverterError> {
        if let Err(err) = validate_selection(&file, None) {
            warn!(name = file.name(), %err, "file rejected");
            let err = ConverterError::from(err);
            self.presenter.render_error(Some(&err.user_message()));
            return Err(err);
        }

        info!(name = file.name(), size = file.size(), "file selected");
        self.presenter.render_file_info(Some(&FileInfo::from(&file)));
        self.presenter.render_rename(true);
        self.presenter.render_error(None);
        self.file = Some(file);
        Ok(())
    }

    pub fn remove_file(&mut self) {
        self.file = None;
        self.presenter.render_file_info(None);
        self.presenter.render_rename(false);
        self.presenter.render_error(None);
    }

    /// Delivers the original bytes under a `.mp4` name. No transcoding
    /// happens. Returns whether anything was delivered.
    pub fn rename_only(&mut self) -> Result<bool, ConverterError> {
        let Some(file) = self.file.as_ref() else {
            debug!("rename ignored without a file");
            return Ok(false);
        };

        let artifact = DownloadArtifact::mp4(renamed_file_name(file.name()), file.shared_bytes());
        self.presenter
            .deliver(&artifact)
            .map_err(|source| ConverterError::Delivery {
                source: source.into(),
            })?;
        info!(file_name = %artifact.file_name, "extension-only rename delivered");
        self.presenter.render_notice(RENAME_NOTICE);
        Ok(true)
    }

    /// Real conversion is never available on this path.
    pub fn convert(&mut self) -> Result<(), ConverterError> {
        let err = ConverterError::ConversionUnavailable;
        self.presenter.render_error(Some(&err.user_message()));
        Err(err)
    }
}
