//! CLI behavior tests: exit codes, output formats, init.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const SAMPLE_TESTS: &str = "test-repos/sample-project/tests";
const GOOD_TEST: &str = "test-repos/sample-project/tests/test_good.py";
const WEAK_TEST: &str = "test-repos/sample-project/tests/test_weak.py";
const SMELLY_TEST: &str = "test-repos/sample-project/tests/test_smelly.py";
const TIMINGS: &str = "test-repos/sample-project/timings.json";

fn pyreview_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pyreview"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({}): {}",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn clean_file_exits_0() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("Tests: 4"));
}

#[test]
fn below_min_score_exits_1() {
    pyreview_cmd()
        .arg(WEAK_TEST)
        .arg("--min-score")
        .arg("90")
        .arg("--no-color")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("below min_score 90"));
}

#[test]
fn above_min_score_exits_0() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--min-score")
        .arg("95")
        .assert()
        .success();
}

#[test]
fn strict_exits_1_on_errors() {
    pyreview_cmd()
        .arg(WEAK_TEST)
        .arg("--strict")
        .arg("--format")
        .arg("json")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn invalid_min_score_exits_2() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--min-score")
        .arg("150")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("between 0 and 100"));
}

#[test]
fn missing_path_exits_2() {
    pyreview_cmd()
        .arg("test-repos/sample-project/no-such-dir")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Path does not exist"));
}

#[test]
fn unknown_only_analyzer_exits_2() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--only")
        .arg("widgets")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unknown analyzer 'widgets'"));
}

#[test]
fn json_output_valid() {
    let value = json_output(pyreview_cmd().arg(WEAK_TEST).arg("--format").arg("json"));
    assert_eq!(value["version"], "1");
    assert!(value["score"]["overall"].as_f64().unwrap() < 90.0);
    assert!(value["issues"].as_array().unwrap().len() >= 5);
    assert!(value["by_rule"]["assertions.missing"].as_u64().unwrap() >= 1);
}

#[test]
fn directory_scan_skips_helpers_broken_is_reported_and_legacy_ignored() {
    let value = json_output(pyreview_cmd().arg(SAMPLE_TESTS).arg("--format").arg("json"));
    let issues = value["issues"].as_array().unwrap();
    let files: Vec<&str> = issues.iter().filter_map(|i| i["file"].as_str()).collect();

    assert!(files.iter().any(|f| f.ends_with("test_broken.py")));
    assert!(!files.iter().any(|f| f.ends_with("helpers.py")));
    assert!(!files.iter().any(|f| f.contains("legacy")));
    assert!(issues.iter().any(|i| i["rule"] == "parsing.syntax_error"));
    // good (4) + weak (3) + smelly (4 reviewed, 1 skipped)
    assert_eq!(value["summary"]["tests_analyzed"], 11);
    assert_eq!(value["summary"]["skipped_review"], 1);
    assert_eq!(value["summary"]["files_analyzed"], 4);
}

#[test]
fn only_restricts_analyzers() {
    let value = json_output(
        pyreview_cmd()
            .arg(SMELLY_TEST)
            .arg("--only")
            .arg("patterns")
            .arg("--format")
            .arg("json"),
    );
    let issues = value["issues"].as_array().unwrap();
    assert!(!issues.is_empty());
    assert!(issues
        .iter()
        .all(|i| i["rule"].as_str().unwrap().starts_with("patterns.")));
    assert_eq!(value["score"]["categories"]["simplicity"]["weight"], 1.0);
    assert_eq!(value["score"]["categories"]["assertions"]["enabled"], false);
}

#[test]
fn timings_add_performance_issues() {
    let value = json_output(
        pyreview_cmd()
            .arg(SAMPLE_TESTS)
            .arg("--timings")
            .arg(TIMINGS)
            .arg("--format")
            .arg("json"),
    );
    let rules: Vec<&str> = value["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["rule"].as_str())
        .collect();
    assert!(rules.contains(&"performance.slow_test"));
    assert!(rules.contains(&"performance.very_slow_test"));
}

#[test]
fn missing_timings_file_exits_2() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--timings")
        .arg("test-repos/sample-project/no-timings.json")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn quiet_prints_score_line() {
    pyreview_cmd()
        .arg(GOOD_TEST)
        .arg("--quiet")
        .arg("--no-color")
        .assert()
        .success()
        .stdout("100.00 (A) - 4 tests, 0 issues\n");
}

#[test]
fn html_output_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.html");
    pyreview_cmd()
        .arg(SMELLY_TEST)
        .arg("--format")
        .arg("html")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report written to"));
    let html = fs::read_to_string(&out).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("smells.duplicate_assert"));
}

#[test]
fn empty_directory_reports_no_tests() {
    let dir = tempfile::tempdir().unwrap();
    let value = json_output(pyreview_cmd().arg(dir.path()).arg("--format").arg("json"));
    assert_eq!(value["issues"][0]["rule"], "run.no_tests");
    assert_eq!(value["summary"]["tests_analyzed"], 0);
    assert_eq!(value["score"]["overall"], 100.0);
}

#[test]
fn config_file_options_apply() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".pyreviewrc.json"),
        r#"{ "min_score": 100, "ignore": { "rules": ["naming"] },
             "analyzers": { "smells": { "max_call_targets": "many" } } }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("test_sample.py"),
        "def test_x():\n    assert compute() == 2\n",
    )
    .unwrap();

    let output = pyreview_cmd()
        .arg(dir.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rules: Vec<&str> = value["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["rule"].as_str())
        .collect();
    assert!(rules.contains(&"config.invalid_option"));
    assert!(rules.contains(&"smells.magic_number"));
    assert!(!rules.iter().any(|r| r.starts_with("naming.")));
}

#[test]
fn init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    pyreview_cmd()
        .arg("init")
        .arg("--min-score")
        .arg("80")
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("min_score=80"));

    let written = fs::read_to_string(dir.path().join(".pyreviewrc.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["min_score"], 80);
}

#[test]
fn init_does_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".pyreviewrc.json");
    fs::write(&path, "{}").unwrap();
    pyreview_cmd()
        .arg("init")
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
}
