//! Domain models for bundles, pipeline stages, and launch outcomes.

use std::fmt;
use std::path::PathBuf;

use crate::domain::errors::ErrorKind;

/// One file carried inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the build directory, `/`-separated.
    pub path: String,
    /// Raw lines in document order, whitespace preserved.
    pub lines: Vec<String>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            path: path.into(),
            lines,
        }
    }

    /// File contents as written to disk: lines joined by `\n`, no trailing newline added.
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }
}

/// Ordered sequence of records parsed from a single bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleDocument {
    pub records: Vec<FileRecord>,
}

impl BundleDocument {
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }
}

/// A file written by the materializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub path: PathBuf,
    pub bytes: usize,
}

/// How much of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Parse, materialize, clean, compile, verify, then launch.
    #[default]
    Full,
    /// Launch whatever is already built.
    RunOnly,
}

/// States of the build/launch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Parsing,
    Materializing,
    Cleaning,
    Compiling,
    Verifying,
    Launching,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => f.write_str("init"),
            Stage::Parsing => f.write_str("parsing"),
            Stage::Materializing => f.write_str("materializing"),
            Stage::Cleaning => f.write_str("cleaning"),
            Stage::Compiling => f.write_str("compiling"),
            Stage::Verifying => f.write_str("verifying"),
            Stage::Launching => f.write_str("launching"),
            Stage::Done => f.write_str("done"),
            Stage::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// Result of a toolchain compile invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Success,
    /// Nonzero exit; `None` when the compiler was killed by a signal.
    Failed(Option<i32>),
}

/// How the launched program ended. Every variant counts as normal completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Exited(i32),
    Signaled,
}
