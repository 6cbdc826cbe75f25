//! Domain-specific errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::model::Stage;

/// Fatal pipeline failures. Every variant maps to exit code 1.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("build directory does not exist: {}", .0.display())]
    MissingWorkingLocation(PathBuf),

    #[error("bundle file not found: {}", .0.display())]
    MissingBundleSource(PathBuf),

    #[error("failed to read bundle {}: {source}", .path.display())]
    ParseIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {reason}", .path.display())]
    Materialize { path: PathBuf, reason: String },

    #[error("failed to remove stale artifact {}: {source}", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no .{suffix} source files found in {}", .dir.display())]
    NoSources { dir: PathBuf, suffix: String },

    #[error("compilation failed: {0}")]
    Compile(String),

    #[error("{} not found after compilation", .0.display())]
    Verification(PathBuf),

    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("pipeline already finished ({0})")]
    AlreadyFinished(Stage),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingWorkingLocation(_) => ErrorKind::MissingWorkingLocation,
            Self::MissingBundleSource(_) => ErrorKind::MissingBundleSource,
            Self::ParseIo { .. } => ErrorKind::ParseIo,
            Self::Materialize { .. } => ErrorKind::Materialize,
            Self::Clean { .. } => ErrorKind::Clean,
            Self::NoSources { .. } => ErrorKind::NoSources,
            Self::Compile(_) => ErrorKind::Compile,
            Self::Verification(_) => ErrorKind::Verification,
            Self::Launch { .. } => ErrorKind::Launch,
            Self::AlreadyFinished(_) => ErrorKind::AlreadyFinished,
        }
    }

    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Copyable tag identifying a [`PipelineError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingWorkingLocation,
    MissingBundleSource,
    ParseIo,
    Materialize,
    Clean,
    NoSources,
    Compile,
    Verification,
    Launch,
    AlreadyFinished,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingWorkingLocation => "missing-working-location",
            ErrorKind::MissingBundleSource => "missing-bundle-source",
            ErrorKind::ParseIo => "parse-io",
            ErrorKind::Materialize => "materialize",
            ErrorKind::Clean => "clean",
            ErrorKind::NoSources => "no-sources",
            ErrorKind::Compile => "compile",
            ErrorKind::Verification => "verification",
            ErrorKind::Launch => "launch",
            ErrorKind::AlreadyFinished => "already-finished",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        let err = PipelineError::Verification(PathBuf::from("Main.class"));
        assert_eq!(err.kind(), ErrorKind::Verification);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Main.class not found after compilation");
    }

    #[test]
    fn launch_error_keeps_source() {
        let err = PipelineError::Launch {
            program: "java".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.kind().as_str(), "launch");
        assert!(std::error::Error::source(&err).is_some());
    }
}
