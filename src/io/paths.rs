use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;

use crate::{core::sanitize::SanitizedLabel, error::Result, DeckError};

/// On-disk layout shared by the pipeline and the catalog:
///
/// ```text
/// <root>/<raw_dir>/<label>.<ext>                  transient downloads
/// <root>/<separated_dir>/<model>/<label>/...      one session per label
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    raw_dir: String,
    separated_dir: String,
    model: String,
}

impl StorageLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        raw_dir: impl Into<String>,
        separated_dir: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            raw_dir: raw_dir.into(),
            separated_dir: separated_dir.into(),
            model: model.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(&self.raw_dir)
    }

    /// Directory the separation tool writes into; it appends the model name.
    pub fn separated_root(&self) -> PathBuf {
        self.root.join(&self.separated_dir)
    }

    /// Parent of all session directories for the configured model.
    pub fn sessions_root(&self) -> PathBuf {
        self.separated_root().join(&self.model)
    }

    pub fn session_dir(&self, label: &SanitizedLabel) -> PathBuf {
        self.sessions_root().join(label.as_str())
    }

    pub fn raw_path(&self, label: &SanitizedLabel, ext: &str) -> PathBuf {
        self.raw_dir().join(format!("{label}.{ext}"))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Create the raw and sessions directories if they are missing.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(self.raw_dir())?;
        fs::create_dir_all(self.sessions_root())
    }
}

/// Default config file location: `<platform config dir>/stemdeck.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "stemdeck")
        .ok_or_else(|| DeckError::Config("could not determine home directory".into()))?;
    Ok(dirs.config_dir().join("stemdeck.toml"))
}
