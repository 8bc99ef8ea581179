//! Primary converter states and the single transition function between them.

use std::sync::Arc;

use shared::domain::SelectedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterState {
    /// Engine not loaded: never started, or its load failed.
    Idle { file: Option<SelectedFile> },
    EngineLoading { file: Option<SelectedFile> },
    Ready,
    FileSelected { file: SelectedFile },
    Converting { file: SelectedFile },
    Done { file: SelectedFile, result: Arc<[u8]> },
    Error {
        message: String,
        engine: EngineStatus,
        file: Option<SelectedFile>,
    },
}

#[derive(Debug, Clone)]
pub enum Event {
    LoadStarted,
    LoadSucceeded,
    LoadFailed { message: String },
    FileAccepted(SelectedFile),
    FileRemoved,
    ConversionStarted,
    ConversionSucceeded { result: Arc<[u8]> },
    ConversionFailed { message: String },
    Reset,
}

impl Default for ConverterState {
    fn default() -> Self {
        Self::Idle { file: None }
    }
}

impl ConverterState {
    /// The state after `event`, or `None` when the event does not apply.
    pub fn next(&self, event: Event) -> Option<ConverterState> {
        use ConverterState::*;

        let next = match (self, event) {
            (Idle { file }, Event::LoadStarted) => EngineLoading { file: file.clone() },
            (
                Error {
                    engine: EngineStatus::Unloaded,
                    file,
                    ..
                },
                Event::LoadStarted,
            ) => EngineLoading { file: file.clone() },

            (EngineLoading { file: None }, Event::LoadSucceeded) => Ready,
            (EngineLoading { file: Some(file) }, Event::LoadSucceeded) => {
                FileSelected { file: file.clone() }
            }

            (Idle { file } | EngineLoading { file }, Event::LoadFailed { message }) => Error {
                message,
                engine: EngineStatus::Unloaded,
                file: file.clone(),
            },

            (Converting { .. }, Event::FileAccepted(_) | Event::FileRemoved) => return None,
            (_, Event::FileAccepted(file)) => Self::at_rest(self.engine_status(), Some(file)),
            (_, Event::FileRemoved) => Self::at_rest(self.engine_status(), None),

            (_, Event::ConversionStarted) => Converting {
                file: self.convertible_file()?.clone(),
            },
            (Converting { file }, Event::ConversionSucceeded { result }) => Done {
                file: file.clone(),
                result,
            },
            (Converting { file }, Event::ConversionFailed { message }) => Error {
                message,
                engine: EngineStatus::Ready,
                file: Some(file.clone()),
            },

            (_, Event::Reset) => Self::at_rest(self.engine_status(), None),

            _ => return None,
        };
        Some(next)
    }

    /// Non-error state for an engine status and an optional file.
    fn at_rest(engine: EngineStatus, file: Option<SelectedFile>) -> ConverterState {
        match (engine, file) {
            (EngineStatus::Unloaded, file) => ConverterState::Idle { file },
            (EngineStatus::Loading, file) => ConverterState::EngineLoading { file },
            (EngineStatus::Ready, None) => ConverterState::Ready,
            (EngineStatus::Ready, Some(file)) => ConverterState::FileSelected { file },
        }
    }

    pub fn engine_status(&self) -> EngineStatus {
        match self {
            Self::Idle { .. } => EngineStatus::Unloaded,
            Self::EngineLoading { .. } => EngineStatus::Loading,
            Self::Ready
            | Self::FileSelected { .. }
            | Self::Converting { .. }
            | Self::Done { .. } => EngineStatus::Ready,
            Self::Error { engine, .. } => *engine,
        }
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        match self {
            Self::Idle { file } | Self::EngineLoading { file } | Self::Error { file, .. } => {
                file.as_ref()
            }
            Self::Ready => None,
            Self::FileSelected { file } | Self::Converting { file } | Self::Done { file, .. } => {
                Some(file)
            }
        }
    }

    /// The file a conversion would run on right now.
    pub fn convertible_file(&self) -> Option<&SelectedFile> {
        match self {
            Self::FileSelected { file } | Self::Done { file, .. } => Some(file),
            Self::Error {
                engine: EngineStatus::Ready,
                file: Some(file),
                ..
            } => Some(file),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&Arc<[u8]>> {
        match self {
            Self::Done { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::EngineLoading { .. } => "engine_loading",
            Self::Ready => "ready",
            Self::FileSelected { .. } => "file_selected",
            Self::Converting { .. } => "converting",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// Enabled flag and label of the convert button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionControl {
    pub enabled: bool,
    pub label: &'static str,
}

impl ActionControl {
    pub fn for_state(state: &ConverterState) -> Self {
        if matches!(state, ConverterState::Converting { .. }) {
            return Self {
                enabled: false,
                label: "Converting...",
            };
        }
        if state.convertible_file().is_some() {
            return Self {
                enabled: true,
                label: "Convert to MP4",
            };
        }
        let label = match state.engine_status() {
            EngineStatus::Ready => "Select a file first",
            EngineStatus::Loading => "Loading converter...",
            EngineStatus::Unloaded => "Converter unavailable",
        };
        Self {
            enabled: false,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> SelectedFile {
        SelectedFile::new("clip.mov", vec![1u8, 2, 3])
    }

    #[test]
    fn action_enabled_only_with_file_and_ready_engine() {
        let cases = [
            (ConverterState::EngineLoading { file: None }, false),
            (ConverterState::EngineLoading { file: Some(clip()) }, false),
            (ConverterState::Ready, false),
            (ConverterState::FileSelected { file: clip() }, true),
        ];
        for (state, enabled) in cases {
            assert_eq!(
                ActionControl::for_state(&state).enabled,
                enabled,
                "{}",
                state.name()
            );
        }
    }

    #[test]
    fn load_success_keeps_file_chosen_while_loading() {
        let loading = ConverterState::Idle { file: None }
            .next(Event::LoadStarted)
            .and_then(|s| s.next(Event::FileAccepted(clip())))
            .expect("loading with file");
        assert_eq!(
            loading,
            ConverterState::EngineLoading { file: Some(clip()) }
        );
        assert_eq!(
            loading.next(Event::LoadSucceeded),
            Some(ConverterState::FileSelected { file: clip() })
        );
    }

    #[test]
    fn conversion_requires_convertible_file() {
        assert!(ConverterState::Ready.next(Event::ConversionStarted).is_none());
        assert!(ConverterState::EngineLoading { file: Some(clip()) }
            .next(Event::ConversionStarted)
            .is_none());
        let failed_load = ConverterState::Error {
            message: "x".into(),
            engine: EngineStatus::Unloaded,
            file: Some(clip()),
        };
        assert!(failed_load.next(Event::ConversionStarted).is_none());

        let converting = ConverterState::FileSelected { file: clip() }
            .next(Event::ConversionStarted)
            .expect("converting");
        assert!(!ActionControl::for_state(&converting).enabled);
    }

    #[test]
    fn new_file_drops_previous_result() {
        let done = ConverterState::Done {
            file: clip(),
            result: Arc::from(vec![9u8]),
        };
        let other = SelectedFile::new("other.mov", vec![4u8]);
        let next = done
            .next(Event::FileAccepted(other.clone()))
            .expect("file accepted");
        assert_eq!(next, ConverterState::FileSelected { file: other });
        assert!(next.result().is_none());
    }

    #[test]
    fn selection_is_refused_while_converting() {
        let converting = ConverterState::Converting { file: clip() };
        assert!(converting.next(Event::FileAccepted(clip())).is_none());
        assert!(converting.next(Event::FileRemoved).is_none());
    }

    #[test]
    fn reset_returns_to_rest_state_for_engine_status() {
        let cases = [
            (
                ConverterState::Done {
                    file: clip(),
                    result: Arc::from(vec![1u8]),
                },
                ConverterState::Ready,
            ),
            (
                ConverterState::Converting { file: clip() },
                ConverterState::Ready,
            ),
            (
                ConverterState::Error {
                    message: "boom".into(),
                    engine: EngineStatus::Unloaded,
                    file: Some(clip()),
                },
                ConverterState::Idle { file: None },
            ),
            (
                ConverterState::EngineLoading { file: Some(clip()) },
                ConverterState::EngineLoading { file: None },
            ),
        ];
        for (state, expected) in cases {
            assert_eq!(state.next(Event::Reset), Some(expected), "{}", state.name());
        }
    }

    #[test]
    fn failed_load_can_be_retried() {
        let failed = ConverterState::EngineLoading { file: Some(clip()) }
            .next(Event::LoadFailed {
                message: "no engine".into(),
            })
            .expect("error");
        assert_eq!(failed.engine_status(), EngineStatus::Unloaded);
        assert_eq!(
            failed.next(Event::LoadStarted),
            Some(ConverterState::EngineLoading { file: Some(clip()) })
        );
    }
}
