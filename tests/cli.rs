use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn sprig_run_quickstart() {
    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("run").arg("demos/quickstart.sp");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello from sprig!"))
        .stdout(predicate::str::contains("square of 12 is 144"))
        .stdout(predicate::str::contains("threaded: 12"))
        .stdout(predicate::str::contains("counter is large"))
        .stdout(predicate::str::ends_with("42\n"));
}

#[test]
fn sprig_eval_snippet() {
    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("eval").arg("(+ 1 2 3)");
    cmd.assert().success().stdout("6\n");
}

#[test]
fn sprig_eval_renders_functions_as_placeholder() {
    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("eval").arg("(lambda [x] x)");
    cmd.assert().success().stdout("<function>\n");
}

#[test]
fn sprig_eval_reports_failures() {
    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("eval").arg("(add 1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unexpected end of input"));
}

#[test]
fn sprig_run_without_prelude() {
    let dir = tempdir().expect("create temp dir");
    let script_path = dir.path().join("bare.sp");
    fs::write(&script_path, "(do 1)").expect("write script");

    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("--no-prelude").arg("run").arg(&script_path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unable to resolve symbol `do`"));
}

#[test]
fn sprig_run_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script_path = dir.path().join("main.sp");
    fs::write(
        &script_path,
        "(global total 0)\n(let (global total (add total 5)))\n(mul total 2)\n",
    )
    .expect("write script");

    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("run").arg(&script_path);
    cmd.assert().success().stdout("10\n");
}

#[test]
fn sprig_run_reports_deep_nesting_without_aborting() {
    let dir = tempdir().expect("create temp dir");
    let script_path = dir.path().join("deep.sp");
    let source = format!("{}1{}", "(do ".repeat(3000), ")".repeat(3000));
    fs::write(&script_path, source).expect("write script");

    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("run").arg(&script_path);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("nested too deeply"));
}

#[test]
fn sprig_eval_reports_runaway_recursion() {
    let mut cmd = Command::cargo_bin("sprig").expect("binary exists");
    cmd.arg("eval")
        .arg("(do (defn f [n] (cond ((= n 0) 0) (true (add 1 (f (sub n 1)))))) (f 5000))");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("evaluation depth limit exceeded"));
}
