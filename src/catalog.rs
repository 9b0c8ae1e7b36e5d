//! Read-only view of finished sessions.
//!
//! The filesystem is the database: each immediate subdirectory of the
//! sessions root is one session. Callers go through [`ArtifactCatalog`] so
//! an index file could replace the directory scan later.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::Serialize;
use tracing::debug;

use crate::{
    core::{sanitize::SanitizedLabel, separator::Stem},
    types::{ArtifactKind, AudioFormat, MIX_FILE_STEM},
};

/// Extensions looked for, in order of preference.
const ARTIFACT_EXTENSIONS: &[&str] = &["mp3", "wav", "mp4"];

/// Which fixed artifact a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "stem", rename_all = "lowercase")]
pub enum ArtifactSlot {
    Stem(Stem),
    Mix,
}

impl ArtifactSlot {
    /// All slots in display order: mix first, then the stems.
    pub fn all() -> Vec<ArtifactSlot> {
        std::iter::once(ArtifactSlot::Mix)
            .chain(Stem::all().iter().map(|s| ArtifactSlot::Stem(*s)))
            .collect()
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            ArtifactSlot::Stem(s) => s.name(),
            ArtifactSlot::Mix => MIX_FILE_STEM,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactSlot::Stem(_) => ArtifactKind::Stem,
            ArtifactSlot::Mix => ArtifactKind::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactFile {
    pub slot: ArtifactSlot,
    /// File name inside the session directory, e.g. `drums.mp3`.
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub name: String,
    #[serde(skip)]
    pub dir: PathBuf,
    #[serde(skip)]
    pub modified: SystemTime,
    pub artifacts: Vec<ArtifactFile>,
}

impl SessionEntry {
    pub fn mix(&self) -> Option<&ArtifactFile> {
        self.artifacts.iter().find(|a| a.slot == ArtifactSlot::Mix)
    }

    pub fn stems(&self) -> impl Iterator<Item = &ArtifactFile> {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.slot, ArtifactSlot::Stem(_)))
    }

    pub fn artifact(&self, file_name: &str) -> Option<&ArtifactFile> {
        self.artifacts.iter().find(|a| a.file_name == file_name)
    }
}

pub trait ArtifactCatalog: Send + Sync {
    /// All sessions, most recently modified first.
    fn list(&self) -> io::Result<Vec<SessionEntry>>;

    /// A single session by name.
    fn get(&self, name: &str) -> io::Result<Option<SessionEntry>>;
}

/// Scans a sessions root directory.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_for(dir: &Path, name: String) -> io::Result<SessionEntry> {
        let modified = fs::metadata(dir)?.modified()?;
        Ok(SessionEntry {
            name,
            dir: dir.to_path_buf(),
            modified,
            artifacts: scan_artifacts(dir),
        })
    }
}

fn scan_artifacts(dir: &Path) -> Vec<ArtifactFile> {
    let mut out = Vec::new();
    for slot in ArtifactSlot::all() {
        for ext in ARTIFACT_EXTENSIONS {
            let file_name = format!("{}.{ext}", slot.file_stem());
            let path = dir.join(&file_name);
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Some(format) = AudioFormat::from_extension(ext) else {
                continue;
            };
            out.push(ArtifactFile {
                slot,
                file_name,
                path,
                format,
                size_bytes: meta.len(),
            });
        }
    }
    out
}

impl ArtifactCatalog for FsCatalog {
    fn list(&self) -> io::Result<Vec<SessionEntry>> {
        let read = match fs::read_dir(&self.root) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut sessions = Vec::new();
        for entry in read {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match Self::entry_for(&entry.path(), name) {
                Ok(s) => sessions.push(s),
                // removed between read_dir and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }

        sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        debug!(root = %self.root.display(), count = sessions.len(), "catalog scanned");
        Ok(sessions)
    }

    fn get(&self, name: &str) -> io::Result<Option<SessionEntry>> {
        if !SanitizedLabel::is_sanitized(name) {
            return Ok(None);
        }
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(None);
        }
        Self::entry_for(&dir, name.to_string()).map(Some)
    }
}
