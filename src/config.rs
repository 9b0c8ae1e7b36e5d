//! Layered configuration.
//!
//! Resolution order for the file: explicit path, then `STEMDECK_CONFIG`, then
//! the platform config directory. A missing default file is not an error;
//! compiled defaults apply. `STEMDECK_FETCH_TOKEN` always overrides the
//! token from the file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    core::separator::Stem,
    error::{DeckError, Result},
    io::paths::{default_config_path, StorageLayout},
    types::AudioFormat,
};

pub const CONFIG_ENV: &str = "STEMDECK_CONFIG";
pub const TOKEN_ENV: &str = "STEMDECK_FETCH_TOKEN";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub raw_dir: String,
    pub separated_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".".into(),
            raw_dir: "src".into(),
            separated_dir: "separated".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub endpoint: String,
    pub locator_param: String,
    pub token_param: String,
    pub token: Option<String>,
    /// Payloads smaller than this are treated as upstream error pages.
    pub min_payload_bytes: u64,
    /// Whole-request timeout; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.clipto.com/api/youtube/mp3".into(),
            locator_param: "url".into(),
            token_param: "csrfToken".into(),
            token: None,
            min_payload_bytes: 10_000,
            timeout_secs: 600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub separator: String,
    /// Separation model; also the namespace directory under `separated/`.
    pub model: String,
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            separator: "demucs".into(),
            model: "htdemucs".into(),
            ffmpeg: "ffmpeg".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Format stems are converted to after separation; `None` keeps the
    /// tool's WAV output untouched.
    pub stem_format: Option<AudioFormat>,
    pub mix_stems: Vec<Stem>,
    pub replace_existing_session: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stem_format: Some(AudioFormat::Mp3),
            mix_stems: vec![Stem::Drums, Stem::Bass],
            replace_existing_session: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".into(),
        }
    }
}

impl DeckConfig {
    /// Resolve and load the configuration. `explicit` comes from `--config`
    /// and must exist when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(p) => Self::from_file(p)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(p) => Self::from_file(Path::new(&p))?,
                None => {
                    let p = default_config_path()?;
                    if p.is_file() {
                        Self::from_file(&p)?
                    } else {
                        debug!(path = %p.display(), "no config file, using defaults");
                        Self::default()
                    }
                }
            },
        };
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            cfg.fetch.token = Some(token);
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DeckError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let cfg = Self::from_toml(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tools.model.is_empty() {
            return Err(DeckError::Config("tools.model must not be empty".into()));
        }
        if self.output.mix_stems.len() == 1 {
            return Err(DeckError::Config(
                "output.mix_stems needs at least two stems (or none to disable mixing)".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(
            &self.storage.root,
            &self.storage.raw_dir,
            &self.storage.separated_dir,
            &self.tools.model,
        )
    }
}
