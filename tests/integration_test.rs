//! End-to-end runs of the lython binary over the fixture sources.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn lython() -> Command {
    Command::cargo_bin("lython").expect("binary builds")
}

#[test]
fn precedence_evaluates_through_the_vm() {
    lython()
        .arg(fixture("precedence.ly"))
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn struct_function_and_call() {
    lython()
        .arg(fixture("mid.ly"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0"));
}

#[test]
fn undefined_name_fails_with_a_name_error() {
    lython()
        .arg(fixture("undefined.ly"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("NameError"))
        .stderr(predicate::str::contains("undeclared"));
}

#[test]
fn loops_run_to_completion() {
    lython()
        .arg(fixture("loops.ly"))
        .assert()
        .success()
        .stdout(predicate::str::contains("13"));
}

#[test]
fn dump_ast_round_trips_the_source() {
    lython()
        .arg(fixture("mid.ly"))
        .arg("--dump-ast")
        .assert()
        .success()
        .stdout(predicate::str::contains("struct Point:"))
        .stdout(predicate::str::contains("def mid(a: Float, b: Float) -> Float:"));
}

#[test]
fn dump_program_lists_labels_and_jumps() {
    lython()
        .arg(fixture("loops.ly"))
        .arg("--dump-program")
        .assert()
        .success()
        .stdout(predicate::str::contains("__main__:"))
        .stdout(predicate::str::contains("jump"));
}

#[test]
fn named_entry_point_runs() {
    lython()
        .arg(fixture("mid.ly"))
        .arg("--entry")
        .arg("__main__")
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0"));
}

#[test]
fn imports_resolve_through_pythonpath() {
    lython()
        .arg(fixture("uses_import.ly"))
        .env("PYTHONPATH", fixture("modules"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));
}

#[test]
fn import_of_a_missing_name_fails() {
    let mut cmd = lython();
    cmd.arg(fixture("uses_import.ly"));
    // helper.ly is not on the search path, so the module cannot be found
    cmd.env("PYTHONPATH", fixture("does_not_exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ModuleNotFoundError"));
}

#[test]
fn missing_module_fails_with_a_module_error() {
    lython()
        .arg(fixture("missing_import.ly"))
        .env("PYTHONPATH", fixture("modules"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ModuleNotFoundError"));
}
