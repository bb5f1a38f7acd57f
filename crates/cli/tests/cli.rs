//! Black-box CLI scenarios (spec.md §8 "end-to-end scenarios") driven
//! through the actual `luna` binary via `assert_cmd`.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn script(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".luna").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn arithmetic_print_exits_cleanly() {
    let file = script("print(1 + 2 * 3);");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::eq("7\n"));
}

#[test]
fn array_iteration_prints_each_element() {
    let file = script("let a = [1, 2, 3]; for x in a { print(x); }");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::eq("1\n2\n3\n"));
}

#[test]
fn recursive_function_call_squares_its_argument() {
    let file = script("fn f(x) { return x * x; } print(f(11));");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::eq("121\n"));
}

#[test]
fn string_concatenation_prints_the_joined_value() {
    let file = script(r#"print("foo" + "bar");"#);
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::eq("foobar\n"));
}

#[test]
fn division_by_zero_reports_an_error_and_exits_nonzero() {
    let file = script("print(1 / 0);");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Division by zero"));
}

#[test]
fn unbounded_recursion_reports_stack_overflow() {
    let file = script("fn rec(n) { return rec(n); } rec(0);");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Stack overflow"));
}

#[test]
fn process_argv_exposes_the_script_path() {
    let file = script("print(len(process.argv));");
    Command::cargo_bin("luna")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::eq("1\n"));
}
