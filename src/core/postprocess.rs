use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{info, warn};

use crate::{
    core::engine::{ToolCommand, ToolRunner},
    error::PostProcessError,
    types::AudioFormat,
};

/// Result of a mix request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MixOutcome {
    Mixed(PathBuf),
    /// One or more inputs did not exist; nothing was run.
    Unavailable { missing: Vec<PathBuf> },
}

/// Result of a format conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// The file at this path is in the requested format, either freshly
    /// encoded or because it already was.
    Converted(PathBuf),
    /// Conversion failed; the original file is untouched at this path.
    Unchanged(PathBuf),
}

impl ConvertOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ConvertOutcome::Converted(p) | ConvertOutcome::Unchanged(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            ConvertOutcome::Converted(p) | ConvertOutcome::Unchanged(p) => p,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConvertOutcome::Converted(_))
    }
}

/// Transcode and mix operations backed by an external audio tool.
pub trait PostProcessor: Send + Sync {
    /// Re-encode `input` to `format`, replacing the original on success.
    ///
    /// Never fails: when the conversion cannot be done the original is left
    /// in place and reported as [`ConvertOutcome::Unchanged`]. In-place
    /// formats keep the same path either way, so the outcome variant is the
    /// only reliable signal.
    fn convert(&self, input: &Path, format: AudioFormat) -> ConvertOutcome;

    /// Sum `inputs` into `output`, padding shorter inputs with silence up to
    /// the longest one. `format` selects the codec flags; `None` leaves the
    /// choice to the tool.
    fn mix(
        &self,
        inputs: &[&Path],
        output: &Path,
        format: Option<AudioFormat>,
    ) -> Result<MixOutcome, PostProcessError>;
}

/// True when `path` carries the extension `format` produces.
pub fn has_format_extension(path: &Path, format: AudioFormat) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(format.extension()))
}

/// ffmpeg with fixed argument templates.
pub struct FfmpegPostProcessor {
    runner: Arc<dyn ToolRunner>,
    program: String,
}

impl FfmpegPostProcessor {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// `ffmpeg -y -i <input> <codec flags> <output>`
    pub fn convert_command(&self, input: &Path, output: &Path, format: AudioFormat) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args(["-y", "-i"])
            .arg(input)
            .args(format.codec_args())
            .arg(output)
    }

    /// `ffmpeg -y -i <in1> ... -filter_complex amix=inputs=N:duration=longest [codec flags] <output>`
    pub fn mix_command(
        &self,
        inputs: &[&Path],
        output: &Path,
        format: Option<AudioFormat>,
    ) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program).arg("-y");
        for input in inputs {
            cmd = cmd.arg("-i").arg(input);
        }
        cmd = cmd
            .arg("-filter_complex")
            .arg(format!("amix=inputs={}:duration=longest", inputs.len()));
        if let Some(fmt) = format {
            cmd = cmd.args(fmt.codec_args());
        }
        cmd.arg(output)
    }

    fn run_checked(&self, cmd: &ToolCommand, output: &Path) -> Result<(), PostProcessError> {
        let out = self
            .runner
            .run(cmd)
            .map_err(|source| PostProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !out.is_success() {
            return Err(PostProcessError::ToolFailed {
                status: out.status(),
                stderr: out.stderr,
            });
        }
        let size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(PostProcessError::OutputMissing(output.to_path_buf()));
        }
        Ok(())
    }

    fn try_convert(&self, input: &Path, format: AudioFormat) -> Result<PathBuf, PostProcessError> {
        let same_ext = has_format_extension(input, format);
        if same_ext && format != AudioFormat::CompressedWav {
            return Ok(input.to_path_buf());
        }
        if !input.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", input.display()),
            )
            .into());
        }

        if same_ext {
            // same container: encode next to the original, then swap it in
            let dir = match input.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let tmp = tempfile::Builder::new()
                .prefix(".stemdeck-")
                .suffix(&format!(".{}", format.extension()))
                .tempfile_in(dir)?
                .into_temp_path();
            self.run_checked(&self.convert_command(input, &tmp, format), &tmp)?;
            tmp.persist(input).map_err(|e| e.error)?;
            return Ok(input.to_path_buf());
        }

        let output = input.with_extension(format.extension());
        if let Err(e) = self.run_checked(&self.convert_command(input, &output, format), &output) {
            let _ = fs::remove_file(&output);
            return Err(e);
        }
        if let Err(e) = fs::remove_file(input) {
            warn!(path = %input.display(), error = %e, "could not remove original after conversion");
        }
        Ok(output)
    }
}

impl PostProcessor for FfmpegPostProcessor {
    fn convert(&self, input: &Path, format: AudioFormat) -> ConvertOutcome {
        match self.try_convert(input, format) {
            Ok(path) => ConvertOutcome::Converted(path),
            Err(e) => {
                warn!(path = %input.display(), %format, error = %e, "conversion skipped");
                ConvertOutcome::Unchanged(input.to_path_buf())
            }
        }
    }

    fn mix(
        &self,
        inputs: &[&Path],
        output: &Path,
        format: Option<AudioFormat>,
    ) -> Result<MixOutcome, PostProcessError> {
        if inputs.len() < 2 {
            return Err(PostProcessError::TooFewInputs(inputs.len()));
        }
        let missing: Vec<PathBuf> = inputs
            .iter()
            .filter(|p| !p.is_file())
            .map(|p| p.to_path_buf())
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "mix unavailable");
            return Ok(MixOutcome::Unavailable { missing });
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        info!(inputs = inputs.len(), output = %output.display(), "mixing");
        self.run_checked(&self.mix_command(inputs, output, format), output)?;
        Ok(MixOutcome::Mixed(output.to_path_buf()))
    }
}
