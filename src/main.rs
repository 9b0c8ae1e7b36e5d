//! `stemdeck` - download a song, split it into stems and remix them.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use stemdeck::{
    web, ArtifactCatalog, AudioFetcher, AudioFormat, CancelToken, ConvertOutcome, DeckConfig,
    FfmpegPostProcessor, HttpFetcher, Job, MixOutcome, PipelineProgress, PostProcessor,
    ProgressReporter, SanitizedLabel, SystemRunner,
};

#[derive(Debug, Parser)]
#[command(name = "stemdeck", version, about = "Download, split and remix songs")]
struct Cli {
    /// Config file (defaults to $STEMDECK_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root holding `src/` and `separated/`
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download, separate and mix one song
    Process {
        url: String,
        #[arg(long)]
        name: String,
        /// Format stems and mix are stored in
        #[arg(long, value_enum)]
        format: Option<StemFormat>,
    },
    /// List processed sessions, most recent first
    List,
    /// Mix two or more audio files
    Mix {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Re-encode one audio file in place
    Convert {
        input: PathBuf,
        #[arg(long, value_enum)]
        format: AudioFormat,
    },
    /// Download audio only
    Fetch {
        url: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, value_enum, default_value_t = DownloadFormat::Mp3)]
        format: DownloadFormat,
    },
    /// Run the dashboard
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Formats a processed session can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StemFormat {
    Mp3,
    Wav,
    CompressedWav,
}

impl From<StemFormat> for AudioFormat {
    fn from(f: StemFormat) -> Self {
        match f {
            StemFormat::Mp3 => AudioFormat::Mp3,
            StemFormat::Wav => AudioFormat::Wav,
            StemFormat::CompressedWav => AudioFormat::CompressedWav,
        }
    }
}

/// Containers offered by the standalone download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DownloadFormat {
    Mp3,
    Wav,
    Mp4,
}

impl From<DownloadFormat> for AudioFormat {
    fn from(f: DownloadFormat) -> Self {
        match f {
            DownloadFormat::Mp3 => AudioFormat::Mp3,
            DownloadFormat::Wav => AudioFormat::Wav,
            DownloadFormat::Mp4 => AudioFormat::Mp4,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// `Ok(false)` is a detected failure that was already reported.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut cfg = DeckConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        cfg.storage.root = root;
    }

    match cli.command {
        Command::Process { url, name, format } => {
            if let Some(f) = format {
                cfg.output.stem_format = Some(f.into());
            }
            process(&cfg, url, name)
        }
        Command::List => list(&cfg),
        Command::Mix { inputs, output } => mix(&cfg, &inputs, &output),
        Command::Convert { input, format } => {
            let post = FfmpegPostProcessor::new(Arc::new(SystemRunner), &cfg.tools.ffmpeg);
            match post.convert(&input, format) {
                ConvertOutcome::Converted(out) => {
                    println!("{}", out.display());
                    Ok(true)
                }
                ConvertOutcome::Unchanged(_) => {
                    error!(input = %input.display(), %format, "conversion failed, file left unchanged");
                    Ok(false)
                }
            }
        }
        Command::Fetch { url, name, format } => fetch(&cfg, &url, &name, format.into()),
        Command::Serve { bind } => serve(&cfg, bind),
    }
}

fn console_progress() -> ProgressReporter {
    ProgressReporter::new(|p| match p {
        PipelineProgress::Stage(s) => eprintln!("> {s}"),
        PipelineProgress::Download { done, total } => {
            match p.fraction() {
                Some(f) => eprint!("\rDownload: {:>3.0}% ({done}/{})", f * 100.0, total.unwrap_or(0)),
                None => eprint!("\rDownload: {done} bytes"),
            }
            if total.is_some_and(|t| *done >= t) {
                eprintln!();
            }
            let _ = std::io::stderr().flush();
        }
        PipelineProgress::Warning(w) => eprintln!("warning: {w}"),
    })
}

fn process(cfg: &DeckConfig, url: String, name: String) -> anyhow::Result<bool> {
    let (orchestrator, _catalog) = stemdeck::open(cfg)?;
    let report = orchestrator.run(
        &Job::new(url, name),
        &CancelToken::new(),
        &console_progress(),
    );
    if report.is_done() {
        println!("{}", report.message());
        if let Some(mix) = &report.mix {
            println!("{}", mix.display());
        }
        Ok(true)
    } else {
        eprintln!("{}", report.message());
        Ok(false)
    }
}

fn list(cfg: &DeckConfig) -> anyhow::Result<bool> {
    let catalog = stemdeck::FsCatalog::new(cfg.layout().sessions_root());
    let sessions = catalog.list().context("scanning sessions")?;
    if sessions.is_empty() {
        println!("No sessions found.");
    }
    for s in sessions {
        let files: Vec<&str> = s.artifacts.iter().map(|a| a.file_name.as_str()).collect();
        println!("{}\t{}", s.name, files.join(" "));
    }
    Ok(true)
}

fn mix(cfg: &DeckConfig, inputs: &[PathBuf], output: &Path) -> anyhow::Result<bool> {
    if inputs.len() < 2 {
        bail!("at least two input files are needed to mix");
    }
    let post = FfmpegPostProcessor::new(Arc::new(SystemRunner), &cfg.tools.ffmpeg);
    let refs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
    // codec follows the output extension; unknown ones are left to ffmpeg
    let format = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension);
    match post.mix(&refs, output, format)? {
        MixOutcome::Mixed(p) => {
            info!(output = %p.display(), "mix written");
            println!("{}", p.display());
            Ok(true)
        }
        MixOutcome::Unavailable { missing } => {
            for m in missing {
                error!("input not found: {}", m.display());
            }
            Ok(false)
        }
    }
}

fn fetch(cfg: &DeckConfig, url: &str, name: &str, format: AudioFormat) -> anyhow::Result<bool> {
    let layout = cfg.layout();
    std::fs::create_dir_all(layout.raw_dir())?;
    let label = SanitizedLabel::or_fallback(name);
    let raw = layout.raw_path(&label, "mp3");

    let fetcher = HttpFetcher::new(&cfg.fetch)?;
    if let Err(e) = fetcher.fetch(url, &raw, &console_progress()) {
        let _ = std::fs::remove_file(&raw);
        error!("download failed: {e}");
        return Ok(false);
    }

    if format == AudioFormat::Mp3 {
        println!("{}", raw.display());
        return Ok(true);
    }
    let post = FfmpegPostProcessor::new(Arc::new(SystemRunner), &cfg.tools.ffmpeg);
    let outcome = post.convert(&raw, format);
    println!("{}", outcome.path().display());
    Ok(outcome.is_converted())
}

fn serve(cfg: &DeckConfig, bind: Option<String>) -> anyhow::Result<bool> {
    let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
    let (orchestrator, catalog) = stemdeck::open(cfg)?;
    let orchestrator = Arc::new(orchestrator);
    let state = web::AppState::new(orchestrator.clone(), Arc::new(catalog));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::serve(state, &bind))?;
    // the blocking HTTP client inside must be dropped outside the runtime
    drop(runtime);
    drop(orchestrator);
    info!("dashboard stopped");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_accepts_only_session_formats() {
        let cli = Cli::try_parse_from([
            "stemdeck", "process", "https://x", "--name", "a", "--format", "compressed-wav",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Process {
                format: Some(StemFormat::CompressedWav),
                ..
            }
        ));
        assert!(
            Cli::try_parse_from(["stemdeck", "process", "https://x", "--name", "a", "--format", "mp4"])
                .is_err()
        );
    }

    #[test]
    fn fetch_accepts_only_download_formats() {
        let cli = Cli::try_parse_from(["stemdeck", "fetch", "https://x", "--format", "mp4"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Fetch {
                format: DownloadFormat::Mp4,
                ..
            }
        ));
        assert!(
            Cli::try_parse_from(["stemdeck", "fetch", "https://x", "--format", "compressed-wav"])
                .is_err()
        );
        assert_eq!(AudioFormat::from(DownloadFormat::Wav), AudioFormat::Wav);
    }
}
