//! Converter controllers: the engine-backed primary flow and the
//! rename-only fallback, both rendering through injected presenters.

pub mod compat;
pub mod error;
pub mod fallback;
pub mod presenter;
pub mod primary;
pub mod state;

pub use error::ConverterError;
pub use fallback::{CapabilityProbe, FallbackConverter, FallbackTimings, NativeProbe, ProbePhase};
pub use presenter::{ConverterPresenter, FallbackPresenter, FallbackSections, Presenter};
pub use primary::{ConverterSettings, PrimaryConverter};
pub use state::{ActionControl, ConverterState, EngineStatus};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
