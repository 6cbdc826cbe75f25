//! Writing bundle records to disk and sweeping stale build outputs.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

use crate::domain::errors::PipelineError;
use crate::domain::model::{BundleDocument, FileRecord, MaterializedFile};

/// Write every record of `document` below `target_dir`.
///
/// Records are written independently in document order, so a repeated path ends up with the
/// contents of its last occurrence. Records without lines are skipped.
pub fn materialize(
    document: &BundleDocument,
    target_dir: &Path,
) -> Result<Vec<MaterializedFile>, PipelineError> {
    let mut written = Vec::with_capacity(document.len());
    for record in document.iter() {
        if record.lines.is_empty() {
            continue;
        }
        written.push(write_record(record, target_dir)?);
    }
    Ok(written)
}

fn write_record(record: &FileRecord, target_dir: &Path) -> Result<MaterializedFile, PipelineError> {
    let relative = safe_relative_path(&record.path).ok_or_else(|| PipelineError::Materialize {
        path: PathBuf::from(&record.path),
        reason: "path must be relative and stay inside the build directory".into(),
    })?;
    let path = target_dir.join(relative);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::Materialize {
            path: parent.to_path_buf(),
            reason: err.to_string(),
        })?;
    }

    let contents = record.contents();
    fs::write(&path, &contents).map_err(|err| PipelineError::Materialize {
        path: path.clone(),
        reason: err.to_string(),
    })?;

    tracing::info!(path = %record.path, bytes = contents.len(), "wrote file");
    Ok(MaterializedFile {
        path,
        bytes: contents.len(),
    })
}

fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let candidate = Path::new(raw);
    let mut cleaned = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!cleaned.as_os_str().is_empty()).then_some(cleaned)
}

/// Delete files ending in `.{suffix}` from `dir`, descending into subdirectories when
/// `recursive` is set. A missing directory is treated as already clean.
pub fn clean_artifacts(
    dir: &Path,
    suffix: &str,
    recursive: bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut removed = Vec::new();
    for path in files_with_suffix(dir, suffix, recursive) {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "deleted stale artifact");
                removed.push(path);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(PipelineError::Clean { path, source }),
        }
    }
    Ok(removed)
}

/// Source files ending in `.{suffix}`, sorted by path.
pub fn find_sources(dir: &Path, suffix: &str, recursive: bool) -> Vec<PathBuf> {
    files_with_suffix(dir, suffix, recursive)
}

fn files_with_suffix(dir: &Path, suffix: &str, recursive: bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let ending = format!(".{}", suffix.trim_start_matches('.'));
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .follow_links(false)
        .max_depth(if recursive { None } else { Some(1) });

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(|result| match result {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ty| ty.is_file()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&ending))
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}
