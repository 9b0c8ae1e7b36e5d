//! Blocking invocation of external audio tools.
//!
//! Every heavy computation (separation, transcoding, mixing) happens in an
//! external binary. Components receive a [`ToolRunner`] so tests can stand in
//! a fake that fabricates output files instead of spawning processes.

use std::{
    ffi::{OsStr, OsString},
    fmt, io,
    process::{Command, Stdio},
};

use tracing::debug;

/// Outcome of one finished tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human readable exit status for error messages.
    pub fn status(&self) -> String {
        match self.code {
            Some(c) => format!("exit code {c}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// A fully specified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Arguments as lossy strings, handy for assertions and logs.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs a command to completion. `Err` means the process could not be
/// started at all; a non-zero exit is reported through [`ToolOutput`].
pub trait ToolRunner: Send + Sync {
    fn run(&self, cmd: &ToolCommand) -> io::Result<ToolOutput>;
}

/// Spawns real processes with stdout discarded and stderr captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
        debug!(command = %cmd, "spawning external tool");
        let out = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        debug!(program = %cmd.program, code = ?out.status.code(), "external tool finished");
        Ok(ToolOutput {
            code: out.status.code(),
            stderr,
        })
    }
}

/// Whether `program` can be started at all (`<program> -version` style probe).
pub fn is_tool_available(runner: &dyn ToolRunner, program: &str, probe_arg: &str) -> bool {
    runner
        .run(&ToolCommand::new(program).arg(probe_arg))
        .map(|o| o.is_success())
        .unwrap_or(false)
}
