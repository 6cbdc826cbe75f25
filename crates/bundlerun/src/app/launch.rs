//! Launching the compiled program.

use std::ffi::OsString;
use std::path::Path;

use crate::domain::errors::PipelineError;
use crate::domain::model::LaunchOutcome;
use crate::infra::toolchain::Toolchain;

/// Starts the entry point and waits for it to finish.
pub struct LaunchOrchestrator<'a, T: Toolchain> {
    toolchain: &'a mut T,
    workdir: &'a Path,
}

impl<'a, T: Toolchain> LaunchOrchestrator<'a, T> {
    pub fn new(toolchain: &'a mut T, workdir: &'a Path) -> Self {
        Self { toolchain, workdir }
    }

    /// Run `entry_point` with `invocation_dir` as its only argument.
    ///
    /// However the program ends, the launch counts as complete. Only a failure to start the
    /// process is an error.
    pub fn launch(
        &mut self,
        entry_point: &str,
        invocation_dir: &Path,
    ) -> Result<LaunchOutcome, PipelineError> {
        tracing::info!(entry = entry_point, cwd = %invocation_dir.display(), "starting program");
        let args = [OsString::from(invocation_dir.as_os_str())];
        let outcome = self
            .toolchain
            .run(entry_point, &args, self.workdir)
            .map_err(|source| PipelineError::Launch {
                program: self.toolchain.launcher_name().to_owned(),
                source,
            })?;

        match outcome {
            LaunchOutcome::Exited(0) => tracing::info!("program stopped"),
            LaunchOutcome::Exited(code) => tracing::info!(code, "program stopped"),
            LaunchOutcome::Signaled => tracing::info!("program terminated by signal"),
        }
        Ok(outcome)
    }
}
