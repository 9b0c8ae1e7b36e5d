#![allow(dead_code)]

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, SystemTime},
};

use stemdeck::{
    AudioFetcher, DemucsSeparator, FetchError, FfmpegPostProcessor, LabelLocks, Orchestrator,
    OrchestratorOptions, ProgressReporter, Stem, StorageLayout, ToolCommand, ToolOutput,
    ToolRunner,
};

/// Writes a fixed payload, or fails with a 502 after leaving a partial file.
#[derive(Default)]
pub struct FakeFetcher {
    pub payload: Vec<u8>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            payload: vec![7u8; 32 * 1024],
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }
}

impl AudioFetcher for FakeFetcher {
    fn fetch(
        &self,
        _locator: &str,
        dest: &Path,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };
        if self.fail {
            fs::write(dest, b"partial").map_err(write_err)?;
            return Err(FetchError::Status { status: 502 });
        }
        fs::write(dest, &self.payload).map_err(write_err)?;
        let n = self.payload.len() as u64;
        progress.download(n / 2, Some(n));
        progress.download(n, Some(n));
        Ok(n)
    }
}

/// Stands in for both `demucs` and `ffmpeg`, producing the files the real
/// tools would.
#[derive(Default)]
pub struct FakeTools {
    pub stems: Vec<Stem>,
    pub demucs_exit: i32,
    /// demucs exits 0 but writes nothing
    pub demucs_silent: bool,
    pub fail_convert: bool,
    pub fail_mix: bool,
    pub delay: Duration,
    pub calls: Mutex<Vec<ToolCommand>>,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeTools {
    pub fn with_stems(stems: &[Stem]) -> Self {
        Self {
            stems: stems.to_vec(),
            ..Self::default()
        }
    }

    pub fn all_stems() -> Self {
        Self::with_stems(Stem::all())
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    pub fn mix_calls(&self) -> Vec<ToolCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.arg_strings().iter().any(|a| a == "-filter_complex"))
            .cloned()
            .collect()
    }

    fn demucs(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        let result = self.write_stems(cmd);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn write_stems(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        if self.demucs_exit != 0 {
            return Ok(ToolOutput::failure(self.demucs_exit, "CUDA out of memory"));
        }
        if self.demucs_silent {
            return Ok(ToolOutput::success());
        }
        // demucs -n <model> -o <root> <input>
        let args = cmd.arg_strings();
        let input = PathBuf::from(&args[4]);
        let dir = PathBuf::from(&args[3])
            .join(&args[1])
            .join(input.file_stem().unwrap());
        fs::create_dir_all(&dir)?;
        for s in &self.stems {
            fs::write(dir.join(s.file_name("wav")), b"RIFF-pcm")?;
        }
        Ok(ToolOutput::success())
    }

    fn ffmpeg(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        let is_mix = cmd.arg_strings().iter().any(|a| a == "-filter_complex");
        if (is_mix && self.fail_mix) || (!is_mix && self.fail_convert) {
            return Ok(ToolOutput::failure(1, "Error while decoding stream"));
        }
        let out = PathBuf::from(cmd.args.last().unwrap());
        fs::write(out, b"encoded")?;
        Ok(ToolOutput::success())
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(cmd.clone());
        match cmd.program.as_str() {
            "demucs" => self.demucs(cmd),
            "ffmpeg" => self.ffmpeg(cmd),
            other => Err(io::Error::new(io::ErrorKind::NotFound, other.to_string())),
        }
    }
}

pub fn layout(root: &Path) -> StorageLayout {
    StorageLayout::new(root, "src", "separated", "htdemucs")
}

/// Orchestrator over the real demucs/ffmpeg adapters driven by `tools`.
pub fn orchestrator(
    root: &Path,
    fetcher: Arc<dyn AudioFetcher>,
    tools: Arc<FakeTools>,
) -> Orchestrator {
    let layout = layout(root);
    let separator = DemucsSeparator::new(
        tools.clone(),
        "demucs",
        "htdemucs",
        layout.separated_root(),
    );
    let post = FfmpegPostProcessor::new(tools, "ffmpeg");
    Orchestrator::new(
        layout,
        fetcher,
        Arc::new(separator),
        Arc::new(post),
        OrchestratorOptions::default(),
    )
    .with_locks(Arc::new(LabelLocks::default()))
}

/// Create a session directory with the given files and back-date it.
pub fn make_session(root: &Path, name: &str, files: &[&str], secs_ago: u64) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for f in files {
        fs::write(dir.join(f), b"data").unwrap();
    }
    set_mtime(&dir, secs_ago);
    dir
}

pub fn set_mtime(path: &Path, secs_ago: u64) {
    let f = fs::File::open(path).unwrap();
    f.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
        .unwrap();
}
