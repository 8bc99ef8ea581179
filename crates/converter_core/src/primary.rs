//! Engine-backed converter: file intake, two-tier conversion, download.

use std::sync::Arc;

use shared::{
    domain::{CapabilityReport, DownloadArtifact, FileInfo, SelectedFile, MAX_INPUT_BYTES},
    format::{converted_file_name, validate_selection},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use transcoder::{
    args::{self, ReencodeProfile, INPUT_FILE, OUTPUT_FILE},
    EngineAssets, EngineError, EngineEvent, TranscodingEngine,
};

use crate::{
    compat::{check_host, Compatibility},
    error::ConverterError,
    presenter::ConverterPresenter,
    state::{ActionControl, ConverterState, EngineStatus, Event},
};

/// Lowest percentage shown once the engine starts reporting progress.
const ENGINE_PROGRESS_FLOOR: u8 = 15;

#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub max_input_bytes: u64,
    pub assets: EngineAssets,
    pub input_name: String,
    pub output_name: String,
    pub reencode: ReencodeProfile,
    /// Checked against the browser gate before loading, when known.
    pub user_agent: Option<String>,
    /// Host capabilities, when the host can report them.
    pub capabilities: Option<CapabilityReport>,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            max_input_bytes: MAX_INPUT_BYTES,
            assets: EngineAssets::default(),
            input_name: INPUT_FILE.into(),
            output_name: OUTPUT_FILE.into(),
            reencode: ReencodeProfile::default(),
            user_agent: None,
            capabilities: None,
        }
    }
}

pub struct PrimaryConverter<P> {
    engine: Arc<dyn TranscodingEngine>,
    presenter: P,
    settings: ConverterSettings,
    state: ConverterState,
    status: String,
    progress: u8,
    /// Last rejected selection, shown until a file is accepted or cleared.
    rejection: Option<String>,
}

impl<P: ConverterPresenter> PrimaryConverter<P> {
    pub fn new(
        engine: Arc<dyn TranscodingEngine>,
        presenter: P,
        settings: ConverterSettings,
    ) -> Self {
        let mut converter = Self {
            engine,
            presenter,
            settings,
            state: ConverterState::default(),
            status: String::new(),
            progress: 0,
            rejection: None,
        };
        converter.refresh_view();
        converter
    }

    pub fn state(&self) -> &ConverterState {
        &self.state
    }

    pub fn status_message(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn action_control(&self) -> ActionControl {
        ActionControl::for_state(&self.state)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Loads the engine. Failures land in the `Error` state with a diagnostic
    /// picked from the engine's error kind.
    pub async fn initialize(&mut self) -> Result<(), ConverterError> {
        let gate = check_host(
            self.settings.user_agent.as_deref(),
            self.settings.capabilities.as_ref(),
        );
        let refused = match gate {
            Compatibility::Unsupported {
                family,
                version,
                minimum,
            } => {
                warn!(%family, version, minimum, "browser below supported version");
                Some(ConverterError::IncompatibleBrowser {
                    family,
                    version,
                    minimum,
                })
            }
            Compatibility::MissingWebAssembly => {
                warn!("host has no WebAssembly runtime");
                Some(ConverterError::MissingWebAssembly)
            }
            Compatibility::Supported(_) | Compatibility::Unrecognized => None,
        };
        if let Some(err) = refused {
            self.apply(Event::LoadFailed {
                message: err.user_message(),
            });
            return Err(err);
        }

        if !self.apply(Event::LoadStarted) {
            debug!(state = self.state.name(), "engine load already started");
            return Ok(());
        }
        self.set_status("Loading video converter...");

        let engine = Arc::clone(&self.engine);
        match engine.load(&self.settings.assets).await {
            Ok(()) => {
                self.apply(Event::LoadSucceeded);
                self.set_status("Ready to convert");
                info!("transcoding engine ready");
                Ok(())
            }
            Err(source) => {
                error!(kind = ?source.kind(), error = %source, "failed to load transcoding engine");
                let err = ConverterError::EngineLoad { source };
                self.apply(Event::LoadFailed {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    /// Validates and stores a picked or dropped file. A rejected file leaves
    /// the state untouched.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), ConverterError> {
        if let Err(err) = validate_selection(&file, Some(self.settings.max_input_bytes)) {
            warn!(name = file.name(), size = file.size(), %err, "file rejected");
            let err = ConverterError::from(err);
            self.rejection = Some(err.user_message());
            self.refresh_view();
            return Err(err);
        }

        let (name, size) = (file.name().to_string(), file.size());
        if !self.apply(Event::FileAccepted(file)) {
            return Err(ConverterError::Busy);
        }
        info!(%name, size, "file selected");
        Ok(())
    }

    pub fn remove_file(&mut self) {
        if self.apply(Event::FileRemoved) {
            debug!("file removed");
        }
    }

    /// Runs the conversion for the selected file. Does nothing unless a file is
    /// selected and the engine is ready.
    pub async fn convert(&mut self) -> Result<(), ConverterError> {
        let Some(file) = self.state.convertible_file().cloned() else {
            debug!(state = self.state.name(), "convert ignored");
            return Ok(());
        };

        self.progress = 0;
        self.apply(Event::ConversionStarted);
        info!(name = file.name(), size = file.size(), "conversion started");

        match self.run_conversion(&file).await {
            Ok(bytes) => {
                info!(name = file.name(), output_size = bytes.len(), "conversion finished");
                self.apply(Event::ConversionSucceeded {
                    result: Arc::from(bytes),
                });
                Ok(())
            }
            Err(source) => {
                error!(name = file.name(), error = %source, "conversion failed");
                let err = ConverterError::Conversion { source };
                self.apply(Event::ConversionFailed {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    async fn run_conversion(&mut self, file: &SelectedFile) -> Result<Vec<u8>, EngineError> {
        let engine = Arc::clone(&self.engine);
        let input = self.settings.input_name.clone();
        let output = self.settings.output_name.clone();

        self.report_progress(0, "Preparing conversion...");
        engine.write_file(&input, file.bytes()).await?;
        self.report_progress(10, "File loaded...");

        let mut events = engine.subscribe_events();
        self.report_progress(ENGINE_PROGRESS_FLOOR, "Analyzing video streams...");

        let copy = args::stream_copy(&input, &output);
        if let Err(err) = self.exec_tracking(engine.as_ref(), &copy, &mut events).await {
            warn!(error = %err, "stream copy rejected; re-encoding");
            self.report_progress(20, "Re-encoding required for compatibility...");
            let reencode = args::reencode(&input, &output, &self.settings.reencode);
            self.exec_tracking(engine.as_ref(), &reencode, &mut events)
                .await?;
        }

        self.report_progress(90, "Finalizing conversion...");
        let bytes = engine.read_file(&output).await?;

        for name in [&input, &output] {
            if let Err(err) = engine.delete_file(name).await {
                warn!(file = %name, error = %err, "failed to clean up virtual file");
            }
        }

        self.report_progress(100, "Conversion completed!");
        Ok(bytes)
    }

    /// Awaits one `exec`, applying engine events as they arrive.
    async fn exec_tracking(
        &mut self,
        engine: &dyn TranscodingEngine,
        args: &[String],
        events: &mut broadcast::Receiver<EngineEvent>,
    ) -> Result<(), EngineError> {
        let exec = engine.exec(args);
        tokio::pin!(exec);

        loop {
            tokio::select! {
                result = &mut exec => {
                    while let Ok(event) = events.try_recv() {
                        self.on_engine_event(event);
                    }
                    return result;
                }
                event = events.recv() => match event {
                    Ok(event) => self.on_engine_event(event),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "engine events lagged"),
                    Err(RecvError::Closed) => return (&mut exec).await,
                },
            }
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Log(message) => debug!(target: "engine", "{message}"),
            EngineEvent::Progress(fraction) => {
                let percent = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;
                self.report_progress(percent.max(ENGINE_PROGRESS_FLOOR), "Converting video...");
            }
        }
    }

    /// Hands the converted file to the presenter as `<name>_converted.mp4`.
    /// Returns whether anything was delivered.
    pub fn download(&mut self) -> Result<bool, ConverterError> {
        let ConverterState::Done { file, result } = &self.state else {
            debug!(state = self.state.name(), "download ignored");
            return Ok(false);
        };

        let artifact = DownloadArtifact::mp4(converted_file_name(file.name()), Arc::clone(result));
        self.presenter
            .deliver(&artifact)
            .map_err(|source| ConverterError::Delivery {
                source: source.into(),
            })?;
        info!(file_name = %artifact.file_name, size = artifact.size(), "download delivered");
        Ok(true)
    }

    /// Back to the idle presentation: no file, no result, no error. The
    /// engine stays loaded.
    pub fn reset(&mut self) {
        self.progress = 0;
        self.apply(Event::Reset);
        if self.state.engine_status() == EngineStatus::Ready {
            self.set_status("Ready to convert");
        }
        debug!(state = self.state.name(), "converter reset");
    }

    fn apply(&mut self, event: Event) -> bool {
        let clears_rejection = matches!(
            event,
            Event::FileAccepted(_) | Event::FileRemoved | Event::ConversionStarted | Event::Reset
        );
        match self.state.next(event) {
            Some(next) => {
                debug!(from = self.state.name(), to = next.name(), "state transition");
                self.state = next;
                if clears_rejection {
                    self.rejection = None;
                }
                self.refresh_view();
                true
            }
            None => false,
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.presenter.render_status(message);
    }

    fn report_progress(&mut self, percent: u8, message: &str) {
        let percent = percent.clamp(self.progress, 100);
        self.progress = percent;
        self.status = message.to_string();
        self.presenter.render_progress(percent, message);
    }

    fn refresh_view(&mut self) {
        let info = self.state.selected_file().map(FileInfo::from);
        self.presenter.render_file_info(info.as_ref());
        self.presenter
            .render_conversion(matches!(self.state, ConverterState::Converting { .. }));
        self.presenter.render_download(self.state.result().is_some());
        let error = self.state.error_message().or(self.rejection.as_deref());
        self.presenter.render_error(error);
        self.presenter.render_action(ActionControl::for_state(&self.state));
    }
}
