//! End-to-end tests of the `portage` binary.

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

const ASCII: &str = "package ascii\n\n// NUL is the zero byte.\nconst NUL byte = 0x00\n\nfunc Len(data []byte) int {\n\treturn len(data)\n}\n";

const TIED: &str = r#"
[[construct]]
id = "const-a"
kind = "constant"
pattern = "_"
template = "{{name}} = {{value}}"
confidence = "exact"

[[construct]]
id = "const-b"
kind = "constant"
pattern = "_"
template = "{{name}} = {{value}}"
confidence = "exact"
"#;

/// `portage` run inside `dir`, so no stray `portage.toml` is picked up.
fn portage(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("portage").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ascii.go"), ASCII).unwrap();
    dir
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_map_shows_constant_rendering() {
    let dir = workspace();
    let output = portage(dir.path())
        .args(["map", "ascii.go", "--compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("EXACT"));
    assert!(text.contains("NUL = 0x00_u8"));
}

#[test]
fn test_emit_prints_module() {
    let dir = workspace();
    let output = portage(dir.path()).args(["emit", "ascii.go"]).output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("module Ascii"));
    assert!(text.contains("def self.len(data : Bytes) : Int64"));
}

#[test]
fn test_emit_writes_output_file() {
    let dir = workspace();
    portage(dir.path())
        .args(["emit", "ascii.go", "-o", "out/ascii.cr", "--compact"])
        .assert()
        .success();
    let written = std::fs::read_to_string(dir.path().join("out/ascii.cr")).unwrap();
    assert!(written.contains("NUL = 0x00_u8"));
}

#[test]
fn test_extract_json_is_a_translation_unit() {
    let dir = workspace();
    let output = portage(dir.path())
        .args(["extract", "ascii.go", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let unit: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(unit["package"], "ascii");
    assert_eq!(unit["nodes"].as_array().unwrap().len(), 2);
}

#[test]
fn test_translate_continues_past_parse_failure() {
    let dir = workspace();
    std::fs::write(dir.path().join("broken.go"), "package broken\n\nfunc (\n").unwrap();
    let output = portage(dir.path())
        .args(["translate", "broken.go", "ascii.go", "--out-dir", "out", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(dir.path().join("out/ascii.cr").is_file());
    assert!(!dir.path().join("out/broken.cr").exists());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["written"].as_array().unwrap().len(), 1);
    assert_eq!(result["report"]["parse_failures"][0]["path"], "broken.go");
}

#[test]
fn test_translate_without_out_dir_fails() {
    let dir = workspace();
    portage(dir.path())
        .args(["translate", "ascii.go"])
        .assert()
        .failure();
}

#[test]
fn test_strict_tie_fails_translate() {
    let dir = workspace();
    std::fs::write(dir.path().join("tied.toml"), TIED).unwrap();
    portage(dir.path())
        .args(["translate", "ascii.go", "--out-dir", "out", "--strict", "--rules", "tied.toml"])
        .assert()
        .code(1);
    assert!(!dir.path().join("out/ascii.cr").exists());

    // Lenient batches record the tie and carry on.
    portage(dir.path())
        .args(["translate", "ascii.go", "--out-dir", "out", "--rules", "tied.toml"])
        .assert()
        .success();
}

#[test]
fn test_config_file_supplies_defaults() {
    let dir = workspace();
    std::fs::write(dir.path().join("tied.toml"), TIED).unwrap();
    std::fs::write(
        dir.path().join("portage.toml"),
        "[translate]\nrules = \"tied.toml\"\nstrict = true\nout_dir = \"crystal\"\n",
    )
    .unwrap();
    portage(dir.path())
        .args(["translate", "ascii.go"])
        .assert()
        .code(1);
}

#[test]
fn test_rules_check() {
    let dir = TempDir::new().unwrap();
    let output = portage(dir.path())
        .args(["rules", "--check", "--compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("ok <builtin>: "));
}

#[test]
fn test_invalid_rule_table_is_reported() {
    let dir = workspace();
    std::fs::write(dir.path().join("bad.toml"), "[[construct]]\nid = 3\n").unwrap();
    let output = portage(dir.path())
        .args(["rules", "--rules", "bad.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.toml"));
}

#[test]
fn test_output_schema() {
    let dir = TempDir::new().unwrap();
    let output = portage(dir.path())
        .args(["report", "x.go", "--output-schema"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("parse_failures"));
}
