use std::fs;

use bundlerun::app::bundle::{DEFAULT_DELIMITER, parse};
use bundlerun::app::pack::{PackOptions, pack_directory, serialize};
use insta::assert_snapshot;

#[test]
fn packed_tree_renders_stable_bundle() {
    let src = tempfile::tempdir().unwrap();
    fs::create_dir_all(src.path().join("com/acme")).unwrap();
    fs::write(
        src.path().join("Main.java"),
        "public class Main {\n    public static void main(String[] args) {}\n}",
    )
    .unwrap();
    fs::write(
        src.path().join("com/acme/Util.java"),
        "package com.acme;\n\nclass Util {}",
    )
    .unwrap();

    let doc = pack_directory(&PackOptions::new(src.path(), "java").recursive(true)).unwrap();
    let text = serialize(&doc, DEFAULT_DELIMITER).unwrap();

    assert_eq!(parse(&text, DEFAULT_DELIMITER), doc);
    assert_snapshot!("packed_bundle", text.trim_end());
}
