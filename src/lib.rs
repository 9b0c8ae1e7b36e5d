mod error;
mod types;

pub mod core {
    pub mod engine;
    pub mod orchestrator;
    pub mod postprocess;
    pub mod sanitize;
    pub mod separator;
}

pub mod io {
    pub mod fetch;
    pub mod net;
    pub mod paths;
    pub mod progress;
}

pub mod catalog;
pub mod config;
pub mod web;

// Public API
pub use crate::catalog::{ArtifactCatalog, ArtifactFile, ArtifactSlot, FsCatalog, SessionEntry};
pub use crate::config::DeckConfig;
pub use crate::core::engine::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use crate::core::orchestrator::{
    CancelToken, JobReport, JobState, LabelLocks, Orchestrator, OrchestratorOptions,
};
pub use crate::core::postprocess::{
    has_format_extension, ConvertOutcome, FfmpegPostProcessor, MixOutcome, PostProcessor,
};
pub use crate::core::sanitize::{sanitize_label, SanitizedLabel, FALLBACK_LABEL};
pub use crate::core::separator::{DemucsSeparator, SeparatedStems, Stem, StemSeparator};
pub use crate::error::{
    DeckError, FetchError, GuardViolation, PipelineError, PostProcessError, Result,
    SeparationError,
};
pub use crate::io::fetch::{AudioFetcher, HttpFetcher};
pub use crate::io::paths::StorageLayout;
pub use crate::io::progress::{PipelineProgress, ProgressReporter};
pub use crate::types::{ArtifactKind, AudioArtifact, AudioFormat, Job, MIX_FILE_STEM};

/// Build the orchestrator and catalog for `cfg`, creating the storage
/// directories on the way.
pub fn open(cfg: &DeckConfig) -> Result<(Orchestrator, FsCatalog)> {
    let orchestrator = Orchestrator::from_config(cfg)?;
    orchestrator.layout().ensure()?;
    let catalog = FsCatalog::new(orchestrator.layout().sessions_root());
    Ok((orchestrator, catalog))
}
