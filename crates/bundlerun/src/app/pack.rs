//! Producing bundles from records or from a source tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::app::bundle::HEADER_PREFIX;
use crate::domain::model::{BundleDocument, FileRecord};

/// A record that cannot be written without changing how it parses back.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("{path}:{line}: line matches the bundle delimiter")]
    DelimiterInContent { path: String, line: usize },
    #[error("{path}:{line}: line would be read as a file header")]
    HeaderInContent { path: String, line: usize },
    #[error("record has an empty path")]
    EmptyPath,
    #[error("path {0:?} has surrounding whitespace or a line break")]
    UnstablePath(String),
}

/// Render `document` as bundle text.
pub fn serialize(document: &BundleDocument, delimiter: &str) -> Result<String, PackError> {
    let delimiter = delimiter.trim();
    let mut out = String::new();
    for record in document.iter() {
        check_record(record, delimiter)?;
        out.push_str(HEADER_PREFIX);
        out.push_str(&record.path);
        out.push('\n');
        out.push_str(delimiter);
        out.push('\n');
        for line in &record.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(delimiter);
        out.push('\n');
    }
    Ok(out)
}

fn check_record(record: &FileRecord, delimiter: &str) -> Result<(), PackError> {
    if record.path.trim().is_empty() {
        return Err(PackError::EmptyPath);
    }
    if record.path != record.path.trim() || record.path.contains(['\n', '\r']) {
        return Err(PackError::UnstablePath(record.path.clone()));
    }
    for (idx, line) in record.lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed == delimiter {
            return Err(PackError::DelimiterInContent {
                path: record.path.clone(),
                line: idx + 1,
            });
        }
        if trimmed.starts_with(HEADER_PREFIX) {
            return Err(PackError::HeaderInContent {
                path: record.path.clone(),
                line: idx + 1,
            });
        }
    }
    Ok(())
}

/// Inputs for [`pack_directory`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub root: PathBuf,
    pub source_suffix: String,
    pub recursive: bool,
    /// Glob patterns, relative to `root`, to leave out.
    pub exclude: Vec<String>,
}

impl PackOptions {
    pub fn new(root: impl Into<PathBuf>, source_suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source_suffix: source_suffix.into(),
            recursive: false,
            exclude: Vec::new(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }
}

/// Collect source files under `options.root` into a document, sorted by path.
///
/// Walks with `.gitignore` rules applied, inside a git checkout or not, and hidden entries
/// skipped.
pub fn pack_directory(options: &PackOptions) -> Result<BundleDocument> {
    let root = options.root.as_path();
    anyhow::ensure!(root.is_dir(), "not a directory: {}", root.display());

    let excluded = build_exclude_set(&options.exclude)?;
    let ending = format!(".{}", options.source_suffix.trim_start_matches('.'));

    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .require_git(false)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .max_depth(if options.recursive { None } else { Some(1) });

    let mut records = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping entry while packing");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ty| ty.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if excluded.is_match(relative) {
            tracing::debug!(path = %relative.display(), "excluded");
            continue;
        }
        if !relative.to_string_lossy().ends_with(&ending) {
            continue;
        }
        records.push(read_record(path, relative)?);
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(files = records.len(), root = %root.display(), "packed sources");
    Ok(BundleDocument::new(records))
}

fn read_record(path: &Path, relative: &Path) -> Result<FileRecord> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;
    let display = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let lines = contents.split('\n').map(str::to_owned).collect();
    Ok(FileRecord::new(display, lines))
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build exclude matcher")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bundle::{DEFAULT_DELIMITER, parse};
    use crate::app::materialize::materialize;

    fn record(path: &str, lines: &[&str]) -> FileRecord {
        FileRecord::new(path, lines.iter().map(|line| line.to_string()).collect())
    }

    #[test]
    fn serialized_records_parse_back() {
        let doc = BundleDocument::new(vec![
            record("Main.java", &["class Main {", "    int x = 1;", "", "}"]),
            record("pkg/Util.java", &["  indented", "trailing  "]),
        ]);

        let text = serialize(&doc, DEFAULT_DELIMITER).unwrap();

        assert_eq!(parse(&text, DEFAULT_DELIMITER), doc);
    }

    #[test]
    fn rejects_lines_that_would_change_meaning() {
        let delimited = BundleDocument::new(vec![record("a", &["ok", DEFAULT_DELIMITER])]);
        assert_eq!(
            serialize(&delimited, DEFAULT_DELIMITER),
            Err(PackError::DelimiterInContent {
                path: "a".into(),
                line: 2
            })
        );

        let header = BundleDocument::new(vec![record("b", &["  FILE: sneaky.txt"])]);
        assert!(matches!(
            serialize(&header, DEFAULT_DELIMITER),
            Err(PackError::HeaderInContent { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_paths_that_would_not_parse_back() {
        for bad in [" Main.java", "Main.java ", "a\nb.java", "\tTab.java"] {
            let doc = BundleDocument::new(vec![record(bad, &["class X {}"])]);
            assert_eq!(
                serialize(&doc, DEFAULT_DELIMITER),
                Err(PackError::UnstablePath(bad.into())),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn gitignore_applies_outside_a_git_checkout() -> Result<()> {
        let src = tempfile::tempdir()?;
        fs::write(src.path().join(".gitignore"), "Skip.java\n")?;
        fs::write(src.path().join("Keep.java"), "class Keep {}")?;
        fs::write(src.path().join("Skip.java"), "class Skip {}")?;
        assert!(!src.path().join(".git").exists());

        let doc = pack_directory(&PackOptions::new(src.path(), "java"))?;

        let paths: Vec<_> = doc.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["Keep.java"]);
        Ok(())
    }

    #[test]
    fn pack_then_unpack_reproduces_bytes() -> Result<()> {
        let src = tempfile::tempdir()?;
        fs::create_dir_all(src.path().join("com/acme"))?;
        fs::write(src.path().join("Main.java"), "class Main {}\n")?;
        fs::write(src.path().join("com/acme/Util.java"), "package com.acme;\n\nclass Util {}")?;
        fs::write(src.path().join("notes.txt"), "skip me")?;

        let doc = pack_directory(&PackOptions::new(src.path(), "java").recursive(true))?;
        assert_eq!(
            doc.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(),
            vec!["Main.java", "com/acme/Util.java"]
        );

        let text = serialize(&doc, DEFAULT_DELIMITER)?;
        let out = tempfile::tempdir()?;
        materialize(&parse(&text, DEFAULT_DELIMITER), out.path())?;

        assert_eq!(fs::read_to_string(out.path().join("Main.java"))?, "class Main {}\n");
        assert_eq!(
            fs::read_to_string(out.path().join("com/acme/Util.java"))?,
            "package com.acme;\n\nclass Util {}"
        );
        Ok(())
    }

    #[test]
    fn pack_honours_depth_and_excludes() -> Result<()> {
        let src = tempfile::tempdir()?;
        fs::create_dir_all(src.path().join("nested"))?;
        fs::create_dir_all(src.path().join("generated"))?;
        fs::write(src.path().join("Top.java"), "class Top {}")?;
        fs::write(src.path().join("nested/Deep.java"), "class Deep {}")?;
        fs::write(src.path().join("generated/Gen.java"), "class Gen {}")?;

        let shallow = pack_directory(&PackOptions::new(src.path(), "java"))?;
        assert_eq!(shallow.len(), 1);

        let filtered = pack_directory(
            &PackOptions::new(src.path(), "java")
                .recursive(true)
                .exclude(vec!["generated/**".into()]),
        )?;
        let paths: Vec<_> = filtered.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["Top.java", "nested/Deep.java"]);
        Ok(())
    }
}
