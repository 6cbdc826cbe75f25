use std::fs;

use anyhow::Result;
use bundlerun::app::bundle::{DEFAULT_DELIMITER, parse};
use bundlerun::app::materialize::materialize;
use bundlerun::app::pack::serialize;
use bundlerun::domain::model::{BundleDocument, FileRecord};

fn record(path: &str, lines: &[&str]) -> FileRecord {
    FileRecord::new(path, lines.iter().map(|line| line.to_string()).collect())
}

#[test]
fn materialized_bytes_match_records() -> Result<()> {
    let records = vec![
        record("Main.java", &["public class Main {", "\tint tabbed;", "}"]),
        record("res/messages.properties", &["greeting = hi  ", "", "farewell=bye"]),
        record("deep/a/b/c.txt", &["x"]),
    ];
    let text = serialize(&BundleDocument::new(records.clone()), DEFAULT_DELIMITER)?;

    let out = tempfile::tempdir()?;
    let written = materialize(&parse(&text, DEFAULT_DELIMITER), out.path())?;

    assert_eq!(written.len(), records.len());
    for rec in &records {
        let on_disk = fs::read(out.path().join(&rec.path))?;
        assert_eq!(on_disk, rec.lines.join("\n").into_bytes(), "{}", rec.path);
    }
    Ok(())
}

#[test]
fn empty_content_block_is_never_written() -> Result<()> {
    let text = [
        "FILE: A.txt",
        DEFAULT_DELIMITER,
        "line1",
        "line2",
        DEFAULT_DELIMITER,
        "FILE: B.txt",
        DEFAULT_DELIMITER,
        DEFAULT_DELIMITER,
    ]
    .join("\n");

    let out = tempfile::tempdir()?;
    materialize(&parse(&text, DEFAULT_DELIMITER), out.path())?;

    assert_eq!(fs::read_to_string(out.path().join("A.txt"))?, "line1\nline2");
    assert!(!out.path().join("B.txt").exists());
    Ok(())
}

#[test]
fn repeated_path_keeps_last_contents() -> Result<()> {
    let text = [
        "FILE: Config.java",
        DEFAULT_DELIMITER,
        "// first draft",
        DEFAULT_DELIMITER,
        "FILE: Config.java",
        DEFAULT_DELIMITER,
        "// final",
        DEFAULT_DELIMITER,
    ]
    .join("\n");

    let out = tempfile::tempdir()?;
    materialize(&parse(&text, DEFAULT_DELIMITER), out.path())?;

    assert_eq!(fs::read_to_string(out.path().join("Config.java"))?, "// final");
    Ok(())
}
