//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tintlog() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("tintlog").expect("Failed to find tintlog binary")
}

const LOG: &str = r#"<!DOCTYPE html>
<html><body>
<p style="color:#888888;"><span> [main]</span><span>Alice</span> : <span>Hello<br>there</span></p>
<p style="color:#888888;"><span> [雑談]</span><span>Bob</span> : <span>off topic</span></p>
<p style="color:#888888;"><span> [main]</span><span>Zed</span> : <span>Who?</span></p>
</body></html>
"#;

/// Temp dir with `log.html` and a `settings/` directory.
fn setup(characters: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("log.html"), LOG).expect("Failed to write log");
    let settings = dir.path().join("settings");
    fs::create_dir(&settings).expect("Failed to create settings dir");
    fs::write(settings.join("character.json"), characters).expect("Failed to write characters");
    dir
}

const CHARACTERS: &str = r#"[
    {"character": "Default", "color_code": "000000", "class_name": "base"},
    {"character": "Alice", "color_code": "ff0000", "class_name": "alice"}
]"#;

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("Failed to read output")
}

#[test]
fn test_help_output() {
    tintlog()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--ignore-tabs"));
}

#[test]
fn test_writes_default_output_path() {
    let dir = setup(CHARACTERS);
    tintlog()
        .arg("log.html")
        .current_dir(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Zed"))
        .stderr(predicate::str::contains(
            "No enabled character settings for some speakers",
        ));

    let out = read(&dir.path().join("output/output.txt"));
    assert_eq!(
        out,
        "<span style=\"color:#ff0000;\">Alice：Hello\nthere\n</span><span style=\"color:#000000;\">Zed：Who?</span>"
    );
    assert!(!out.contains("Bob"));
}

#[test]
fn test_stdout_and_overrides() {
    let dir = setup(CHARACTERS);
    tintlog()
        .args(["--stdout", "--ignore-tabs", "none", "log.html"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Bob：off topic"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_web_outputs() {
    let dir = setup(CHARACTERS);
    tintlog()
        .args(["--web", "--iframe-max", "60", "log.html", "out/chat.txt"])
        .current_dir(dir.path())
        .assert()
        .success();

    let out = dir.path().join("out");
    assert!(out.join("chat.txt").exists());
    let web = read(&out.join("chat.web.html"));
    assert!(web.starts_with("<span class=\"alice\">"));

    let first = read(&out.join("chat.iframe-01.html"));
    let second = read(&out.join("chat.iframe-02.html"));
    assert!(first.contains(".alice{color:#ff0000}"));
    assert!(second.contains(".base{color:#000000}"));
    assert!(!out.join("chat.iframe-03.html").exists());
}

#[test]
fn test_invalid_color_fails_without_output() {
    let dir = setup(r#"[{"character": "Alice", "color_code": "red"}]"#);
    tintlog()
        .arg("log.html")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid color code"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_missing_input_fails() {
    let dir = setup(CHARACTERS);
    tintlog()
        .arg("nope.html")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read chat log"));
}
