//! Compilation and entry artifact verification.

use std::path::{Path, PathBuf};

use crate::domain::errors::PipelineError;
use crate::domain::model::CompileStatus;
use crate::infra::toolchain::Toolchain;

/// Drives a single batch compile and checks for the expected entry artifact.
pub struct CompileOrchestrator<'a, T: Toolchain> {
    toolchain: &'a mut T,
    workdir: &'a Path,
}

impl<'a, T: Toolchain> CompileOrchestrator<'a, T> {
    pub fn new(toolchain: &'a mut T, workdir: &'a Path) -> Self {
        Self { toolchain, workdir }
    }

    /// Compile every source in one toolchain invocation.
    pub fn compile(&mut self, sources: &[PathBuf]) -> Result<(), PipelineError> {
        tracing::info!(files = sources.len(), "compiling sources");
        let status = self
            .toolchain
            .compile(sources, self.workdir)
            .map_err(|err| PipelineError::Compile(format!("could not start compiler: {err}")))?;

        match status {
            CompileStatus::Success => {
                tracing::info!("compilation successful");
                Ok(())
            }
            CompileStatus::Failed(Some(code)) => Err(PipelineError::Compile(format!(
                "compiler exited with status {code}"
            ))),
            CompileStatus::Failed(None) => Err(PipelineError::Compile(
                "compiler terminated by signal".into(),
            )),
        }
    }

    /// Confirm the entry artifact exists after a successful compile.
    pub fn verify_entry_artifact(&self, expected: &Path) -> Result<(), PipelineError> {
        let path = if expected.is_absolute() {
            expected.to_path_buf()
        } else {
            self.workdir.join(expected)
        };

        if path.is_file() {
            tracing::debug!(path = %path.display(), "entry artifact present");
            Ok(())
        } else {
            Err(PipelineError::Verification(expected.to_path_buf()))
        }
    }
}

/// Relative path of the compiled artifact for a dotted entry name.
///
/// `com.acme.Main` with suffix `class` becomes `com/acme/Main.class`.
pub fn entry_artifact_path(entry: &str, artifact_suffix: &str) -> PathBuf {
    let mut path: PathBuf = entry.split('.').collect();
    path.set_extension(artifact_suffix.trim_start_matches('.'));
    path
}
