//! External toolchain integration.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::domain::model::{CompileStatus, LaunchOutcome};
use crate::infra::config::ToolchainConfig;

/// Capability to compile a set of sources and to run a compiled entry point.
///
/// Both operations block until the child process ends. An `Err` means the process could not
/// be started at all.
pub trait Toolchain {
    fn compile(&mut self, sources: &[PathBuf], workdir: &Path) -> io::Result<CompileStatus>;

    fn run(
        &mut self,
        entry_point: &str,
        args: &[OsString],
        workdir: &Path,
    ) -> io::Result<LaunchOutcome>;

    /// Name of the program behind [`Toolchain::run`], for diagnostics.
    fn launcher_name(&self) -> &str;
}

impl<T: Toolchain + ?Sized> Toolchain for &mut T {
    fn compile(&mut self, sources: &[PathBuf], workdir: &Path) -> io::Result<CompileStatus> {
        (**self).compile(sources, workdir)
    }

    fn run(
        &mut self,
        entry_point: &str,
        args: &[OsString],
        workdir: &Path,
    ) -> io::Result<LaunchOutcome> {
        (**self).run(entry_point, args, workdir)
    }

    fn launcher_name(&self) -> &str {
        (**self).launcher_name()
    }
}

/// Toolchain backed by real child processes with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    compiler: String,
    compiler_args: Vec<String>,
    launcher: String,
    launcher_args: Vec<String>,
}

impl ProcessToolchain {
    pub fn new(compiler: impl Into<String>, launcher: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
            compiler_args: Vec::new(),
            launcher: launcher.into(),
            launcher_args: Vec::new(),
        }
    }

    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            compiler: config.compiler(),
            compiler_args: config.compiler_args(),
            launcher: config.launcher(),
            launcher_args: config.launcher_args(),
        }
    }

    pub fn with_launcher_args(mut self, args: Vec<String>) -> Self {
        self.launcher_args = args;
        self
    }
}

impl Toolchain for ProcessToolchain {
    fn compile(&mut self, sources: &[PathBuf], workdir: &Path) -> io::Result<CompileStatus> {
        tracing::debug!(compiler = %self.compiler, files = sources.len(), "spawning compiler");
        let status = Command::new(&self.compiler)
            .args(&self.compiler_args)
            .args(sources)
            .current_dir(workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        if status.success() {
            Ok(CompileStatus::Success)
        } else {
            Ok(CompileStatus::Failed(status.code()))
        }
    }

    fn run(
        &mut self,
        entry_point: &str,
        args: &[OsString],
        workdir: &Path,
    ) -> io::Result<LaunchOutcome> {
        tracing::debug!(launcher = %self.launcher, entry = entry_point, "spawning program");
        let status = Command::new(&self.launcher)
            .args(&self.launcher_args)
            .arg(entry_point)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        Ok(match status.code() {
            Some(code) => LaunchOutcome::Exited(code),
            None => LaunchOutcome::Signaled,
        })
    }

    fn launcher_name(&self) -> &str {
        &self.launcher
    }
}
