//! Bundle text parsing.
//!
//! A bundle is a line-oriented document: a `FILE: <path>` header names the next file and a
//! delimiter line opens or closes its content block. Parsing never fails on malformed input;
//! lines that do not belong to an open block are dropped.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::domain::errors::PipelineError;
use crate::domain::model::{BundleDocument, FileRecord};

/// Prefix marking a file header line.
pub const HEADER_PREFIX: &str = "FILE: ";

/// Delimiter used when no configuration overrides it.
pub const DEFAULT_DELIMITER: &str = "|~|~|~|~|~|~|~|~|~|~|~|";

/// Per-call parser state. Reset on every header line.
#[derive(Debug, Default)]
struct ParserState {
    current_path: Option<String>,
    buffer: Vec<String>,
    in_content: bool,
}

impl ParserState {
    fn flush_into(&mut self, records: &mut Vec<FileRecord>) {
        if let Some(path) = self.current_path.take() {
            if !self.buffer.is_empty() {
                records.push(FileRecord::new(path, std::mem::take(&mut self.buffer)));
            }
        }
        self.buffer.clear();
    }

    fn start_file(&mut self, path: &str, records: &mut Vec<FileRecord>) {
        self.flush_into(records);
        self.current_path = Some(path.trim().to_owned());
        self.in_content = false;
    }

    fn accept(&mut self, raw: &str) {
        if self.in_content && self.current_path.is_some() {
            self.buffer.push(raw.to_owned());
        }
    }
}

/// Parse bundle text into its file records.
pub fn parse(text: &str, delimiter: &str) -> BundleDocument {
    let delimiter = delimiter.trim();
    let mut state = ParserState::default();
    let mut records = Vec::new();

    for raw in text.split('\n') {
        let line = raw.trim();
        if let Some(path) = line.strip_prefix(HEADER_PREFIX) {
            state.start_file(path, &mut records);
        } else if line == delimiter {
            state.in_content = !state.in_content;
        } else {
            state.accept(raw);
        }
    }

    // An unterminated final block is kept as-is.
    state.flush_into(&mut records);

    tracing::debug!(records = records.len(), "parsed bundle");
    BundleDocument::new(records)
}

/// Read the whole of `reader` and parse it. Read failures and invalid UTF-8 are fatal.
pub fn parse_reader<R: Read>(
    mut reader: R,
    origin: &Path,
    delimiter: &str,
) -> Result<BundleDocument, PipelineError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|source| PipelineError::ParseIo {
            path: origin.to_path_buf(),
            source,
        })?;
    Ok(parse(&text, delimiter))
}

/// Open and parse the bundle file at `path`.
pub fn parse_file(path: &Path, delimiter: &str) -> Result<BundleDocument, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingBundleSource(path.to_path_buf()));
    }
    let file = fs::File::open(path).map_err(|source| PipelineError::ParseIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_reader(file, path, delimiter)
}
