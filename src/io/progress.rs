use std::{fmt, sync::Arc};

use crate::core::orchestrator::JobState;

/// Events a pipeline run reports while it works.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineProgress {
    /// The job entered a new state.
    Stage(JobState),
    /// Bytes received so far; `total` is known only when the server sent
    /// `content-length`. `done` never decreases within one download.
    Download { done: u64, total: Option<u64> },
    /// A non-fatal skip (missing stem, failed conversion, cleanup problem).
    Warning(String),
}

impl PipelineProgress {
    /// Fraction in `0.0..=1.0` for download events with a known total.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            PipelineProgress::Download {
                done,
                total: Some(total),
            } if *total > 0 => Some((*done as f64 / *total as f64).min(1.0)),
            _ => None,
        }
    }
}

type ProgressFn = dyn Fn(&PipelineProgress) + Send + Sync;

/// Observer handle passed explicitly into each run.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    cb: Option<Arc<ProgressFn>>,
}

impl ProgressReporter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PipelineProgress) + Send + Sync + 'static,
    {
        Self {
            cb: Some(Arc::new(f)),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, p: PipelineProgress) {
        if let Some(cb) = &self.cb {
            cb(&p);
        }
    }

    pub fn download(&self, done: u64, total: Option<u64>) {
        self.emit(PipelineProgress::Download { done, total });
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.cb.is_some())
            .finish()
    }
}
