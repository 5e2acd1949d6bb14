//! Integration tests driving the `stencil` binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn render_plain_text() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "Hello, World!");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("render")
        .arg(&template)
        .assert()
        .success()
        .stdout("Hello, World!");
}

#[test]
fn render_with_data_file() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "{{ a }}");
    let data = write_fixture(&dir, "data.json", r#"{"a": "A"}"#);

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("render")
        .arg(&template)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout("A");
}

#[test]
fn render_missing_variable_is_empty_by_default() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "[{{ missing }}]");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("render")
        .arg(&template)
        .assert()
        .success()
        .stdout("[]");
}

#[test]
fn render_strict_undefined_fails_with_nonzero_exit_and_stderr_message() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "{{ missing }}");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("render")
        .arg(&template)
        .arg("--strict-undefined")
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined variable"));
}

#[test]
fn render_syntax_error_fails_with_nonzero_exit() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "{% if a %}b");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("render")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("syntax error"));
}

#[test]
fn tokens_subcommand_reports_eof() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "hi");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("tokens")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("Eof"));
}

#[test]
fn ast_subcommand_dumps_text_node() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "hi");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("ast")
        .arg(&template)
        .assert()
        .success()
        .stdout(predicate::str::contains("Text"));
}

#[test]
fn disasm_subcommand_dumps_byte_exact_opcodes() {
    let dir = TempDir::new().unwrap();
    let template = write_fixture(&dir, "t.liquid", "{{ a.b }}");

    Command::cargo_bin("stencil")
        .unwrap()
        .arg("disasm")
        .arg(&template)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("GLOBAL 0")
                .and(predicate::str::contains("SELECTOR 1"))
                .and(predicate::str::contains("RENDER")),
        );
}

#[test]
fn help_flag_succeeds() {
    Command::cargo_bin("stencil").unwrap().arg("--help").assert().success().stdout(
        predicate::str::contains("Usage").or(predicate::str::contains("stencil")),
    );
}

#[test]
fn version_flag_succeeds() {
    Command::cargo_bin("stencil").unwrap().arg("--version").assert().success();
}
