#![cfg(unix)]

use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_PCB2GCODE: &str = r#"#!/bin/sh
[ "$1" = "--output-dir" ] || exit 9
out="$2"
shift 2
for arg in "$@"; do
  case "$arg" in
    --front=*) [ -f "${arg#--front=}" ] || exit 1 ;;
  esac
done
if [ -d generated ]; then
  cp -R generated/. "$out"/
fi
exit 0
"#;

const MANIFEST: &str = r#"
{
  "scenarios": [
    { "inputPath": "testing/gerbv_example/multivibrator" },
    {
      "inputPath": "testing/gerbv_example/multivibrator",
      "args": ["--front=non_existant_file"],
      "exitCode": 1
    }
  ]
}
"#;

fn harness_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_golden-harness"))
}

fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Lays out a repository root with a fake pcb2gcode, a manifest, and one
/// multivibrator fixture whose generated output is `generated`.
fn seed_root(generated: &str, expected: Option<&str>) -> TempDir {
    let temp = TempDir::new().expect("tempdir should be created");
    let root = temp.path();

    let program = root.join("pcb2gcode");
    write_file(&program, FAKE_PCB2GCODE);
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755))
        .expect("fake program should be executable");
    write_file(&root.join("scenarios.json"), MANIFEST);

    let board = root.join("testing/gerbv_example/multivibrator");
    write_file(&board.join("generated/front.ngc"), generated);
    if let Some(expected) = expected {
        write_file(&board.join("expected/front.ngc"), expected);
    }
    temp
}

fn run_harness(root: &Path, extra: &[&str]) -> Output {
    Command::new(harness_bin())
        .current_dir(root)
        .args(["--manifest", "scenarios.json"])
        .args(extra)
        .output()
        .expect("harness should run")
}

#[test]
fn matching_fixture_exits_zero() {
    let temp = seed_root("G00 X0\nM30\n", Some("G00 X0\nM30\n"));
    let report_path = temp.path().join("reports/suite.json");

    let output = run_harness(
        temp.path(),
        &["--report", report_path.to_str().expect("utf-8 path")],
    );
    assert!(
        output.status.success(),
        "harness should pass, stdout: {} stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty(), "stdout should carry no diff");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Suite status: PASS"));

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report should be readable"))
            .expect("report JSON should parse");
    assert_eq!(parsed["passed"], Value::Bool(true));
    assert_eq!(parsed["scenario_count"], 2);
}

#[test]
fn divergent_fixture_prints_diff_and_hint() {
    let temp = seed_root("G00 X0\nG01 Z-0.2\n", Some("G00 X0\nG01 Z-0.1\n"));

    let output = run_harness(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Files don't match\n"));
    assert!(stdout.contains(
        "--- expected/testing/gerbv_example/multivibrator/expected/front.ngc\n\
         +++ actual/testing/gerbv_example/multivibrator/expected/front.ngc\n"
    ));
    assert!(stdout.contains("-G01 Z-0.1\n+G01 Z-0.2\n"));
    assert!(stdout.contains("golden-harness --fix --add"));
}

#[test]
fn failure_output_keeps_raw_bytes() {
    let temp = seed_root("G00\n", Some("G00\n"));
    let generated = temp
        .path()
        .join("testing/gerbv_example/multivibrator/generated/front.ngc");
    fs::write(&generated, b"G00\xfe\n").expect("generated bytes should be written");
    let expected = temp
        .path()
        .join("testing/gerbv_example/multivibrator/expected/front.ngc");
    fs::write(&expected, b"G00\xff\n").expect("expected bytes should be written");

    let output = run_harness(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let hunk: &[u8] = b"-G00\xff\n+G00\xfe\n";
    assert!(output.stdout.windows(hunk.len()).any(|window| window == hunk));
}

#[test]
fn missing_program_is_a_process_error() {
    let temp = seed_root("G00\n", Some("G00\n"));

    let output = run_harness(temp.path(), &["--program", "no-such-program"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[RUN.CASE_SPAWN]"));
}

#[test]
fn add_requires_fix() {
    let temp = seed_root("G00\n", Some("G00\n"));

    let output = run_harness(temp.path(), &["--add"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[INPUT.CLI_USAGE]"));
}

#[test]
fn unmatched_filter_is_rejected() {
    let temp = seed_root("G00\n", Some("G00\n"));

    let output = run_harness(temp.path(), &["--filter", "*/does-not-exist"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn fix_with_clean_fixtures_has_nothing_to_do() {
    let temp = seed_root("G00\n", Some("G00\n"));

    let output = run_harness(temp.path(), &["--fix", "--patch-program", "no-such-patch"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Generating expected outputs..."));
    assert!(stdout.contains("No diffs, nothing to do."));
}

#[test]
fn fix_regenerates_expected_tree() {
    if !tool_available("patch") {
        eprintln!("skipping: `patch` is not available");
        return;
    }
    let temp = seed_root("G00 X0\nG01 Z-0.2\n", None);
    let expected = temp
        .path()
        .join("testing/gerbv_example/multivibrator/expected/front.ngc");

    let output = run_harness(temp.path(), &["--fix"]);
    assert!(
        output.status.success(),
        "fix should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("You now need to run:"));
    assert!(stdout.contains("git add testing/gerbv_example/multivibrator/expected/front.ngc"));
    assert_eq!(
        fs::read_to_string(&expected).expect("expected file should be created"),
        "G00 X0\nG01 Z-0.2\n"
    );

    let rerun = run_harness(temp.path(), &[]);
    assert!(rerun.status.success(), "suite should pass after fix");
}

#[test]
fn fix_add_stages_regenerated_files() {
    if !tool_available("patch") || !tool_available("git") {
        eprintln!("skipping: `patch` or `git` is not available");
        return;
    }
    let temp = seed_root("G00 X1\n", Some("G00 X0\n"));
    let init = Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(temp.path())
        .status()
        .expect("git init should run");
    assert!(init.success());

    let output = run_harness(temp.path(), &["--fix", "--add"]);
    assert!(
        output.status.success(),
        "fix --add should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Added to git:"));

    let staged = Command::new("git")
        .args(["diff", "--cached", "--name-only"])
        .current_dir(temp.path())
        .output()
        .expect("git diff should run");
    assert!(
        String::from_utf8_lossy(&staged.stdout)
            .contains("testing/gerbv_example/multivibrator/expected/front.ngc")
    );
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir should be created");
    }
    fs::write(path, content).expect("file should be written");
}
