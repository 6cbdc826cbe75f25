//! Build/launch pipeline state machine.
//!
//! ```text
//! Init -> Parsing -> Materializing -> Cleaning -> Compiling -> Verifying -> Launching -> Done
//!   \_____________________________ run-only _____________________________/
//! ```
//!
//! Any stage error moves the driver to `Failed(kind)`; nothing is retried.

use std::path::PathBuf;

use crate::app::bundle;
use crate::app::compile::{CompileOrchestrator, entry_artifact_path};
use crate::app::launch::LaunchOrchestrator;
use crate::app::materialize::{clean_artifacts, find_sources, materialize};
use crate::domain::errors::PipelineError;
use crate::domain::model::{LaunchOutcome, MaterializedFile, RunMode, Stage};
use crate::infra::config::Config;
use crate::infra::toolchain::Toolchain;

const TOTAL_STEPS: usize = 5;

/// Naming conventions of the project being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub delimiter: String,
    pub source_suffix: String,
    pub artifact_suffix: String,
    /// Dotted entry point name handed to the launcher.
    pub entry: String,
    pub recursive: bool,
}

impl BuildLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delimiter: config.bundle.delimiter(),
            source_suffix: config.build.source_suffix(),
            artifact_suffix: config.build.artifact_suffix(),
            entry: config.build.entry(),
            recursive: config.build.recursive(),
        }
    }

    /// Entry artifact path relative to the build directory.
    pub fn entry_artifact(&self) -> PathBuf {
        entry_artifact_path(&self.entry, &self.artifact_suffix)
    }
}

/// Everything the driver needs for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: RunMode,
    /// Directory the bundle is extracted into and compiled in.
    pub build_dir: PathBuf,
    pub bundle_path: PathBuf,
    /// Directory the operator invoked the tool from. Passed through to the program untouched.
    pub invocation_dir: PathBuf,
    pub layout: BuildLayout,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<Stage>,
    pub files: Vec<MaterializedFile>,
    pub removed_artifacts: Vec<PathBuf>,
    pub compiled_sources: usize,
    pub outcome: Option<LaunchOutcome>,
}

pub struct PipelineDriver<T: Toolchain> {
    toolchain: T,
    options: PipelineOptions,
    stage: Stage,
    trace: Vec<Stage>,
}

impl<T: Toolchain> PipelineDriver<T> {
    pub fn new(toolchain: T, options: PipelineOptions) -> Self {
        Self {
            toolchain,
            options,
            stage: Stage::Init,
            trace: vec![Stage::Init],
        }
    }

    /// Current state.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Every state entered so far, in order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Run the pipeline to a terminal state. A driver runs at most once.
    pub fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        if self.stage.is_terminal() {
            return Err(PipelineError::AlreadyFinished(self.stage));
        }
        let mut report = PipelineReport::default();

        match self.execute(&mut report) {
            Ok(()) => {
                self.enter(Stage::Done);
                report.stages = self.trace.clone();
                Ok(report)
            }
            Err(err) => {
                let failed_in = self.stage;
                self.enter(Stage::Failed(err.kind()));
                tracing::debug!(kind = %err.kind(), stage = %failed_in, "pipeline failed: {err}");
                Err(err)
            }
        }
    }

    fn execute(&mut self, report: &mut PipelineReport) -> Result<(), PipelineError> {
        let options = self.options.clone();
        let build_dir = options.build_dir.as_path();

        if !build_dir.is_dir() {
            return Err(PipelineError::MissingWorkingLocation(build_dir.to_path_buf()));
        }

        match options.mode {
            RunMode::Full => {
                if !options.bundle_path.is_file() {
                    return Err(PipelineError::MissingBundleSource(options.bundle_path.clone()));
                }
                self.build(&options, report)?;
            }
            RunMode::RunOnly => {
                tracing::info!("run-only mode: skipping extraction and compilation");
            }
        }

        self.enter(Stage::Launching);
        progress(5, "starting program");
        let outcome = LaunchOrchestrator::new(&mut self.toolchain, build_dir)
            .launch(&options.layout.entry, &options.invocation_dir)?;
        report.outcome = Some(outcome);
        Ok(())
    }

    fn build(
        &mut self,
        options: &PipelineOptions,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let layout = &options.layout;
        let build_dir = options.build_dir.as_path();

        self.enter(Stage::Parsing);
        progress(1, "unbundling source files");
        let document = bundle::parse_file(&options.bundle_path, &layout.delimiter)?;

        self.enter(Stage::Materializing);
        report.files = materialize(&document, build_dir)?;
        tracing::info!(files = report.files.len(), "extracted files");
        if find_sources(build_dir, &layout.source_suffix, layout.recursive).is_empty() {
            return Err(PipelineError::NoSources {
                dir: build_dir.to_path_buf(),
                suffix: layout.source_suffix.clone(),
            });
        }

        self.enter(Stage::Cleaning);
        progress(2, "cleaning previous compilation artifacts");
        report.removed_artifacts =
            clean_artifacts(build_dir, &layout.artifact_suffix, layout.recursive)?;

        self.enter(Stage::Compiling);
        progress(3, "compiling");
        let sources = find_sources(build_dir, &layout.source_suffix, layout.recursive);
        report.compiled_sources = sources.len();
        CompileOrchestrator::new(&mut self.toolchain, build_dir).compile(&sources)?;

        self.enter(Stage::Verifying);
        progress(4, "verifying entry artifact");
        CompileOrchestrator::new(&mut self.toolchain, build_dir)
            .verify_entry_artifact(&layout.entry_artifact())
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "pipeline transition");
        self.stage = stage;
        self.trace.push(stage);
    }
}

fn progress(step: usize, message: &str) {
    tracing::info!("[{step}/{TOTAL_STEPS}] {message}");
}
