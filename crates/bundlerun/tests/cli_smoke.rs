#![cfg(unix)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DELIM: &str = "|~|~|~|~|~|~|~|~|~|~|~|";

/// Stand-in compiler: touches `X.class` next to every `X.java` it is given.
const FAKE_JAVAC: &str = r#"for f in "$@"; do : > "${f%.java}.class"; done"#;
/// Stand-in launcher: records the entry point and the forwarded directory.
const FAKE_JAVA: &str = r#"printf "%s\n%s\n" "$0" "$1" > launched.txt"#;

fn workspace(compiler_script: &str) -> TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join(".bundlerun")).unwrap();
    fs::create_dir_all(temp.path().join("xdg")).unwrap();
    let config = format!(
        r#"
[build]
entry = "Main"

[toolchain]
compiler = "sh"
compiler_args = ["-c", '{compiler_script}', "javac"]
launcher = "sh"
launcher_args = ["-c", '{FAKE_JAVA}']
"#
    );
    fs::write(temp.path().join(".bundlerun/config.toml"), config).unwrap();
    temp
}

fn bundlerun(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bundlerun").expect("binary exists");
    cmd.current_dir(cwd)
        .env("XDG_CONFIG_HOME", cwd.join("xdg"))
        .env_remove("BUNDLERUN_DELIMITER")
        .env_remove("BUNDLERUN_ENTRY")
        .env_remove("BUNDLERUN_COMPILER")
        .env_remove("BUNDLERUN_LAUNCHER")
        .env_remove("RUST_LOG");
    cmd
}

fn write_bundle(dir: &Path, files: &[(&str, &str)]) {
    let mut text = String::new();
    for (path, body) in files {
        text.push_str(&format!("FILE: {path}\n{DELIM}\n{body}\n{DELIM}\n"));
    }
    fs::write(dir.join("bundle.txt"), text).unwrap();
}

#[test]
fn help_displays_usage() {
    Command::cargo_bin("bundlerun")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn full_build_extracts_compiles_and_launches() {
    let temp = workspace(FAKE_JAVAC);
    write_bundle(
        temp.path(),
        &[("Main.java", "class Main {}"), ("Helper.java", "class Helper {}")],
    );

    bundlerun(temp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("[3/5] compiling"));

    assert_eq!(
        fs::read_to_string(temp.path().join("Main.java")).unwrap(),
        "class Main {}"
    );
    assert!(temp.path().join("Helper.class").exists());

    let launched = fs::read_to_string(temp.path().join("launched.txt")).unwrap();
    let mut lines = launched.lines();
    assert_eq!(lines.next(), Some("Main"));
    let forwarded = Path::new(lines.next().unwrap()).canonicalize().unwrap();
    assert_eq!(forwarded, temp.path().canonicalize().unwrap());
}

#[test]
fn forwards_invocation_dir_not_build_dir() {
    let temp = workspace(FAKE_JAVAC);
    let build = temp.path().join("app");
    fs::create_dir_all(&build).unwrap();
    write_bundle(&build, &[("Main.java", "class Main {}")]);

    bundlerun(temp.path())
        .args(["--bundle", "app/bundle.txt"])
        .assert()
        .success();

    let launched = fs::read_to_string(build.join("launched.txt")).unwrap();
    let forwarded = Path::new(launched.lines().nth(1).unwrap())
        .canonicalize()
        .unwrap();
    assert_eq!(forwarded, temp.path().canonicalize().unwrap());
    assert!(build.join("Main.class").exists());
}

#[test]
fn compile_failure_exits_one_without_launching() {
    let temp = workspace("exit 3");
    write_bundle(temp.path(), &[("Main.java", "class Main {")]);

    bundlerun(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[compile]"));

    assert!(!temp.path().join("launched.txt").exists());
}

#[test]
fn missing_entry_artifact_is_reported_separately() {
    let temp = workspace(": nothing produced");
    write_bundle(temp.path(), &[("Main.java", "class Main {}")]);

    bundlerun(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[verification]"))
        .stderr(predicate::str::contains("Main.class not found"));
}

#[test]
fn missing_bundle_fails() {
    let temp = workspace(FAKE_JAVAC);

    bundlerun(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[missing-bundle-source]"));
}

#[test]
fn run_only_leaves_files_alone() {
    let temp = workspace(FAKE_JAVAC);
    fs::write(temp.path().join("Main.java"), "stale source").unwrap();
    fs::write(temp.path().join("Main.class"), "stale class").unwrap();
    write_bundle(temp.path(), &[("Main.java", "class Main {}")]);

    bundlerun(temp.path()).arg("r").assert().success();

    assert_eq!(
        fs::read_to_string(temp.path().join("Main.java")).unwrap(),
        "stale source"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("Main.class")).unwrap(),
        "stale class"
    );
    assert!(temp.path().join("launched.txt").exists());
}

#[test]
fn unstartable_launcher_is_launch_failure() {
    let temp = workspace(FAKE_JAVAC);

    bundlerun(temp.path())
        .arg("r")
        .env("BUNDLERUN_LAUNCHER", "bundlerun-test-no-such-java")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[launch]"));
}

#[test]
fn pack_writes_bundle_to_stdout() {
    let temp = workspace(FAKE_JAVAC);
    fs::write(temp.path().join("Main.java"), "class Main {}").unwrap();

    bundlerun(temp.path())
        .args(["pack", "."])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("FILE: Main.java\n"))
        .stdout(predicate::str::contains("class Main {}"));
}

#[test]
fn requests_list_and_clear() {
    let temp = workspace(FAKE_JAVAC);
    let store = temp.path().join(".bundlerun/requests.json");
    let captured = serde_json::json!([{
        "url": "https://example.test/chat",
        "options": { "method": "POST", "headers": {}, "body": "{}" },
        "timestamp": 1700000000000i64
    }]);
    let contents = serde_json::json!({ "intercepted_requests": captured.to_string() });
    fs::write(&store, contents.to_string()).unwrap();

    bundlerun(temp.path())
        .args(["requests", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.test/chat"));

    bundlerun(temp.path())
        .args(["requests", "clear"])
        .assert()
        .success();

    bundlerun(temp.path())
        .args(["requests", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}
