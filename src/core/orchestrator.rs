//! Drives one job through download, separation and post-processing.
//!
//! ```text
//! SUBMITTED -> FETCHING -> FETCHED -> SEPARATING -> SEPARATED -> POST_PROCESSING -> DONE
//!      \___________\___________\___________\____________\_______________\-> FAILED
//! ```
//!
//! Stages run strictly one after another on the calling thread. Jobs for the
//! same sanitized label are serialized through [`LabelLocks`]; a
//! [`CancelToken`] is checked before each stage starts.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::SystemTime,
};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    config::{DeckConfig, OutputConfig},
    core::{
        engine::{SystemRunner, ToolRunner},
        postprocess::{FfmpegPostProcessor, MixOutcome, PostProcessor},
        sanitize::SanitizedLabel,
        separator::{DemucsSeparator, SeparatedStems, Stem, StemSeparator},
    },
    error::{GuardViolation, PipelineError, Result},
    io::{
        fetch::{AudioFetcher, HttpFetcher},
        paths::StorageLayout,
        progress::{PipelineProgress, ProgressReporter},
    },
    types::{AudioFormat, Job, MIX_FILE_STEM},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Fetching,
    Fetched,
    Separating,
    Separated,
    PostProcessing,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Fetching => "FETCHING",
            JobState::Fetched => "FETCHED",
            JobState::Separating => "SEPARATING",
            JobState::Separated => "SEPARATED",
            JobState::PostProcessing => "POST_PROCESSING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation. Cannot interrupt a running external tool; it
/// only stops the next stage from starting.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

static GLOBAL_LOCKS: Lazy<Arc<LabelLocks>> = Lazy::new(|| Arc::new(LabelLocks::default()));

/// One mutex per sanitized label, held for the whole run of a job.
#[derive(Debug, Default)]
pub struct LabelLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LabelLocks {
    /// Process-wide registry shared by every orchestrator that does not get
    /// its own.
    pub fn global() -> Arc<LabelLocks> {
        GLOBAL_LOCKS.clone()
    }

    pub fn slot(&self, label: &SanitizedLabel) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(label.as_str().to_string())
            .or_default()
            .clone()
    }

    /// Drop the slot for `label` once nobody else holds it. Callers release
    /// their own handle first.
    pub fn prune(&self, label: &SanitizedLabel) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(label.as_str())
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(label.as_str());
        }
    }

    /// Number of labels currently tracked.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Post-processing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Extension of the raw download.
    pub raw_ext: String,
    pub stem_format: Option<AudioFormat>,
    pub mix_stems: Vec<Stem>,
    pub replace_existing_session: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for OrchestratorOptions {
    fn from(cfg: &OutputConfig) -> Self {
        Self {
            raw_ext: "mp3".into(),
            stem_format: cfg.stem_format,
            mix_stems: cfg.mix_stems.clone(),
            replace_existing_session: cfg.replace_existing_session,
        }
    }
}

/// Everything known about a job once it reached a terminal state.
#[derive(Debug)]
pub struct JobReport {
    pub label: Option<SanitizedLabel>,
    pub state: JobState,
    /// Every state entered, in order, starting with `SUBMITTED`.
    pub history: Vec<JobState>,
    pub session_dir: Option<PathBuf>,
    pub stems: Vec<(Stem, PathBuf)>,
    pub mix: Option<PathBuf>,
    pub warnings: Vec<String>,
    pub error: Option<PipelineError>,
}

impl JobReport {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// One line summary for the user.
    pub fn message(&self) -> String {
        let label = self.label.as_ref().map(|l| l.as_str()).unwrap_or("job");
        match (&self.state, &self.error) {
            (JobState::Done, _) if self.warnings.is_empty() => format!("'{label}' processed."),
            (JobState::Done, _) => format!(
                "'{label}' processed with {} warning(s): {}",
                self.warnings.len(),
                self.warnings.join("; ")
            ),
            (_, Some(e)) => format!("'{label}' failed: {e}"),
            (state, None) => format!("'{label}' stopped in {state}"),
        }
    }
}

struct Run<'a> {
    report: JobReport,
    progress: &'a ProgressReporter,
}

impl<'a> Run<'a> {
    fn start(progress: &'a ProgressReporter) -> Self {
        let mut run = Self {
            report: JobReport {
                label: None,
                state: JobState::Submitted,
                history: Vec::new(),
                session_dir: None,
                stems: Vec::new(),
                mix: None,
                warnings: Vec::new(),
                error: None,
            },
            progress,
        };
        run.advance(JobState::Submitted);
        run
    }

    fn advance(&mut self, state: JobState) {
        debug!(from = %self.report.state, to = %state, "job transition");
        self.report.state = state;
        self.report.history.push(state);
        self.progress.emit(PipelineProgress::Stage(state));
    }

    fn warn(&mut self, msg: String) {
        warn!("{msg}");
        self.progress.emit(PipelineProgress::Warning(msg.clone()));
        self.report.warnings.push(msg);
    }

    fn fail(mut self, err: PipelineError) -> JobReport {
        error!(state = %self.report.state, error = %err, "job failed");
        self.advance(JobState::Failed);
        self.report.error = Some(err);
        self.report
    }

    fn finish(mut self) -> JobReport {
        self.advance(JobState::Done);
        self.report
    }
}

/// Sequences the four pipeline stages for one job at a time per label.
pub struct Orchestrator {
    layout: StorageLayout,
    fetcher: Arc<dyn AudioFetcher>,
    separator: Arc<dyn StemSeparator>,
    post: Arc<dyn PostProcessor>,
    options: OrchestratorOptions,
    locks: Arc<LabelLocks>,
}

impl Orchestrator {
    pub fn new(
        layout: StorageLayout,
        fetcher: Arc<dyn AudioFetcher>,
        separator: Arc<dyn StemSeparator>,
        post: Arc<dyn PostProcessor>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            layout,
            fetcher,
            separator,
            post,
            options,
            locks: LabelLocks::global(),
        }
    }

    /// Wire the HTTP fetcher, demucs and ffmpeg from configuration.
    pub fn from_config(cfg: &DeckConfig) -> Result<Self> {
        let layout = cfg.layout();
        let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
        let fetcher = HttpFetcher::new(&cfg.fetch).map_err(PipelineError::from)?;
        let separator = DemucsSeparator::new(
            runner.clone(),
            &cfg.tools.separator,
            &cfg.tools.model,
            layout.separated_root(),
        );
        let post = FfmpegPostProcessor::new(runner, &cfg.tools.ffmpeg);
        Ok(Self::new(
            layout,
            Arc::new(fetcher),
            Arc::new(separator),
            Arc::new(post),
            OrchestratorOptions::from(&cfg.output),
        ))
    }

    pub fn with_locks(mut self, locks: Arc<LabelLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Guard for `SUBMITTED -> FETCHING`.
    pub fn check_guards(job: &Job) -> std::result::Result<SanitizedLabel, GuardViolation> {
        if job.source_locator.trim().is_empty() {
            return Err(GuardViolation::EmptyLocator);
        }
        SanitizedLabel::new(&job.label).ok_or(GuardViolation::EmptyLabel)
    }

    /// Run `job` to a terminal state. Never panics on stage failure; the
    /// outcome is in the returned report.
    pub fn run(&self, job: &Job, cancel: &CancelToken, progress: &ProgressReporter) -> JobReport {
        let mut run = Run::start(progress);

        let label = match Self::check_guards(job) {
            Ok(label) => label,
            Err(violation) => return run.fail(violation.into()),
        };
        run.report.label = Some(label.clone());

        let slot = self.locks.slot(&label);
        let report = {
            let _exclusive = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.run_exclusive(run, job, &label, cancel)
        };
        drop(slot);
        self.locks.prune(&label);
        report
    }

    fn run_exclusive(
        &self,
        mut run: Run<'_>,
        job: &Job,
        label: &SanitizedLabel,
        cancel: &CancelToken,
    ) -> JobReport {
        info!(label = %label, locator = %job.source_locator, "job started");
        let raw = self.layout.raw_path(label, &self.options.raw_ext);
        match self.drive(&mut run, job, &raw, cancel) {
            Ok(()) => {
                if let Err(e) = remove_if_present(&raw) {
                    run.warn(format!("could not remove raw download {}: {e}", raw.display()));
                }
                info!(label = %label, "job done");
                run.finish()
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_present(&raw) {
                    debug!(path = %raw.display(), error = %cleanup, "raw cleanup after failure");
                }
                run.fail(e)
            }
        }
    }

    fn drive(
        &self,
        run: &mut Run<'_>,
        job: &Job,
        raw: &Path,
        cancel: &CancelToken,
    ) -> std::result::Result<(), PipelineError> {
        ensure_active(cancel, JobState::Fetching)?;
        fs::create_dir_all(self.layout.raw_dir())?;
        run.advance(JobState::Fetching);
        let bytes = self
            .fetcher
            .fetch(job.source_locator.trim(), raw, run.progress)?;
        debug!(bytes, "raw artifact stored");
        run.advance(JobState::Fetched);

        ensure_active(cancel, JobState::Separating)?;
        let target = self.separator.output_dir_for(raw);
        if self.options.replace_existing_session && target.exists() {
            info!(dir = %target.display(), "replacing previous session");
            fs::remove_dir_all(&target)?;
        }
        run.advance(JobState::Separating);
        let mut stems = self.separator.separate(raw)?;
        run.report.session_dir = Some(stems.dir.clone());
        for stem in stems.missing() {
            run.warn(format!("stem '{stem}' was not produced"));
        }
        run.advance(JobState::Separated);

        ensure_active(cancel, JobState::PostProcessing)?;
        run.advance(JobState::PostProcessing);
        self.post_process(run, &mut stems)?;
        run.report.stems = stems.iter().map(|(s, p)| (s, p.to_path_buf())).collect();
        // rewriting files in place does not bump the directory's mtime,
        // which is what the catalog orders by
        if let Err(e) = touch(&stems.dir) {
            warn!(dir = %stems.dir.display(), error = %e, "could not refresh session mtime");
        }
        Ok(())
    }

    fn post_process(
        &self,
        run: &mut Run<'_>,
        stems: &mut SeparatedStems,
    ) -> std::result::Result<(), PipelineError> {
        if let Some(format) = self.options.stem_format {
            let present: Vec<(Stem, PathBuf)> =
                stems.iter().map(|(s, p)| (s, p.to_path_buf())).collect();
            for (stem, path) in present {
                let outcome = self.post.convert(&path, format);
                if !outcome.is_converted() {
                    run.warn(format!(
                        "stem '{stem}' kept as {}: conversion to {format} failed",
                        outcome.path().display()
                    ));
                }
                stems.set(stem, outcome.into_path());
            }
        }

        if self.options.mix_stems.len() < 2 {
            return Ok(());
        }
        // untouched demucs output is 16-bit PCM
        let mix_format = self.options.stem_format.unwrap_or(AudioFormat::Wav);
        let ext = mix_format.extension();
        let inputs: Vec<PathBuf> = self
            .options
            .mix_stems
            .iter()
            .map(|s| {
                stems
                    .get(*s)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| stems.dir.join(s.file_name(ext)))
            })
            .collect();
        let refs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
        let output = stems.dir.join(format!("{MIX_FILE_STEM}.{ext}"));
        match self.post.mix(&refs, &output, Some(mix_format))? {
            MixOutcome::Mixed(path) => run.report.mix = Some(path),
            MixOutcome::Unavailable { missing } => {
                let names: Vec<String> = missing
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                run.warn(format!("mix unavailable, missing: {}", names.join(", ")));
            }
        }
        Ok(())
    }
}

fn ensure_active(cancel: &CancelToken, next: JobState) -> std::result::Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled(next));
    }
    Ok(())
}

fn touch(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.set_modified(SystemTime::now())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
