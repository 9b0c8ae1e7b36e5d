use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    core::engine::{ToolCommand, ToolRunner},
    error::SeparationError,
};

/// Available stem types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl Stem {
    /// Get all available stems
    pub fn all() -> &'static [Stem] {
        &[Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other]
    }

    /// Get stem name as string
    pub fn name(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Stem> {
        Stem::all().iter().copied().find(|s| s.name() == name)
    }

    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{ext}", self.name())
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stems found in a session directory right after separation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeparatedStems {
    pub dir: PathBuf,
    stems: Vec<(Stem, PathBuf)>,
}

impl SeparatedStems {
    pub fn new(dir: PathBuf, stems: Vec<(Stem, PathBuf)>) -> Self {
        Self { dir, stems }
    }

    /// Scan `dir` for `<stem>.<ext>` files. Absent stems are simply left out.
    pub fn scan(dir: &Path, ext: &str) -> Self {
        let stems = Stem::all()
            .iter()
            .map(|s| (*s, dir.join(s.file_name(ext))))
            .filter(|(_, p)| p.is_file())
            .collect();
        Self::new(dir.to_path_buf(), stems)
    }

    pub fn get(&self, stem: Stem) -> Option<&Path> {
        self.stems
            .iter()
            .find(|(s, _)| *s == stem)
            .map(|(_, p)| p.as_path())
    }

    pub fn set(&mut self, stem: Stem, path: PathBuf) {
        match self.stems.iter_mut().find(|(s, _)| *s == stem) {
            Some(entry) => entry.1 = path,
            None => self.stems.push((stem, path)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stem, &Path)> {
        self.stems.iter().map(|(s, p)| (*s, p.as_path()))
    }

    pub fn missing(&self) -> Vec<Stem> {
        Stem::all()
            .iter()
            .copied()
            .filter(|s| self.get(*s).is_none())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

/// Splits a local audio file into stems using some backend.
pub trait StemSeparator: Send + Sync {
    /// Directory the backend will write stems for `input` into.
    fn output_dir_for(&self, input: &Path) -> PathBuf;

    /// Run separation, blocking until the backend finishes.
    fn separate(&self, input: &Path) -> Result<SeparatedStems, SeparationError>;
}

/// Runs the demucs command line tool:
/// `demucs -n <model> -o <out_root> <input>`, which writes
/// `<out_root>/<model>/<input basename>/{vocals,drums,bass,other}.wav`.
pub struct DemucsSeparator {
    runner: Arc<dyn ToolRunner>,
    program: String,
    model: String,
    out_root: PathBuf,
    stem_ext: String,
}

impl DemucsSeparator {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        program: impl Into<String>,
        model: impl Into<String>,
        out_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            model: model.into(),
            out_root: out_root.into(),
            stem_ext: "wav".into(),
        }
    }

    pub fn command(&self, input: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .arg("-n")
            .arg(&self.model)
            .arg("-o")
            .arg(&self.out_root)
            .arg(input)
    }
}

impl StemSeparator for DemucsSeparator {
    fn output_dir_for(&self, input: &Path) -> PathBuf {
        let base = input
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "output".into());
        self.out_root.join(&self.model).join(base)
    }

    fn separate(&self, input: &Path) -> Result<SeparatedStems, SeparationError> {
        if !input.is_file() {
            return Err(SeparationError::InputMissing(input.to_path_buf()));
        }

        let cmd = self.command(input);
        info!(input = %input.display(), model = %self.model, "running separation");
        let out = self
            .runner
            .run(&cmd)
            .map_err(|source| SeparationError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !out.is_success() {
            return Err(SeparationError::ToolFailed {
                status: out.status(),
                stderr: out.stderr,
            });
        }

        let dir = self.output_dir_for(input);
        if !dir.is_dir() {
            return Err(SeparationError::OutputMissing(dir));
        }

        let stems = SeparatedStems::scan(&dir, &self.stem_ext);
        let missing = stems.missing();
        if !missing.is_empty() {
            warn!(dir = %dir.display(), ?missing, "separation produced a partial stem set");
        }
        debug!(dir = %dir.display(), count = stems.len(), "separation finished");
        Ok(stems)
    }
}
