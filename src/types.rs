use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// File stem of the derived mix inside a session directory.
pub const MIX_FILE_STEM: &str = "mixed_audio";

/// One user request. Lives only for the duration of a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub source_locator: String,
    pub label: String,
}

impl Job {
    pub fn new(source_locator: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source_locator: source_locator.into(),
            label: label.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Raw,
    Stem,
    Mixed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Containers/codecs the transcoder can produce. Each has a fixed argument
/// template; nothing here is user-tunable beyond the choice itself.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AudioFormat {
    /// MP3 via libmp3lame at VBR quality 2.
    Mp3,
    /// 16-bit PCM WAV.
    Wav,
    /// IMA/MS ADPCM in a WAV container, used to shrink stems in place.
    CompressedWav,
    /// AAC at 320 kbit/s in an MP4 container.
    Mp4,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav | AudioFormat::CompressedWav => "wav",
            AudioFormat::Mp4 => "mp4",
        }
    }

    pub fn codec_args(self) -> &'static [&'static str] {
        match self {
            AudioFormat::Mp3 => &["-codec:a", "libmp3lame", "-qscale:a", "2"],
            AudioFormat::Wav => &["-codec:a", "pcm_s16le"],
            AudioFormat::CompressedWav => &["-codec:a", "adpcm_ms"],
            AudioFormat::Mp4 => &["-vn", "-codec:a", "aac", "-b:a", "320k"],
        }
    }

    /// MIME type for serving a file of this format.
    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav | AudioFormat::CompressedWav => "audio/wav",
            AudioFormat::Mp4 => "audio/mp4",
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "mp4" | "m4a" => Some(AudioFormat::Mp4),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::CompressedWav => "compressed-wav",
            AudioFormat::Mp4 => "mp4",
        };
        f.write_str(s)
    }
}
