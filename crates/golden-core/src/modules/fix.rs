//! Regenerates expected fixtures from the current program output.
//!
//! The suite's aggregate diff is a valid unified diff whose labels start with
//! `expected/` or `actual/`, so `patch -p1` run from the harness root applies
//! it straight onto the golden trees. Empty files present on one side only
//! have no hunk `patch` could apply, so they are created or removed directly.

use super::suite::{HarnessConfig, SuiteReport, run_suite};
use super::traits::CaseExecutor;
use super::tree_diff::FragmentKind;
use crate::domain::{HarnessError, HarnessResult, Scenario, normalize_path};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{info, warn};

const PATCHING_FILE_PREFIX: &str = "patching file ";

#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Stage the patched files with `<git_program> add`.
    pub stage: bool,
    pub patch_program: PathBuf,
    pub git_program: PathBuf,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            stage: false,
            patch_program: PathBuf::from("patch"),
            git_program: PathBuf::from("git"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    NothingToDo,
    Patched {
        files: Vec<String>,
        staged: bool,
    },
}

impl FixOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::NothingToDo => "No diffs, nothing to do.".to_string(),
            Self::Patched {
                files,
                staged: true,
            } => format!("Done.\nAdded to git:\n{}", files.join("\n")),
            Self::Patched {
                files,
                staged: false,
            } => {
                let commands = files
                    .iter()
                    .map(|file| format!("git add {}", file))
                    .collect::<Vec<_>>();
                format!("Done.\nYou now need to run:\n{}", commands.join("\n"))
            }
        }
    }
}

/// Change to an empty expected file, relative to the harness root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyFileChange {
    Create(PathBuf),
    Remove(PathBuf),
}

impl EmptyFileChange {
    pub fn path(&self) -> &Path {
        match self {
            Self::Create(path) | Self::Remove(path) => path,
        }
    }
}

/// Outcome of a fix run together with the suite report the patch came from.
#[derive(Debug, Clone)]
pub struct FixRun {
    pub report: SuiteReport,
    pub outcome: FixOutcome,
}

pub fn run_fix(
    config: &HarnessConfig,
    executor: &dyn CaseExecutor,
    scenarios: &[Scenario],
    options: &FixOptions,
) -> HarnessResult<FixRun> {
    info!("generating expected outputs");
    let report = run_suite(config, executor, scenarios)?;
    for scenario in report.exit_code_mismatches() {
        warn!(
            scenario = %scenario.name,
            expected = scenario.expected_exit_code,
            observed = %scenario.observed_exit_code,
            "exit code mismatch cannot be fixed by patching"
        );
    }

    let diff = report.patchable_diff();
    let empty_files = empty_file_changes(&report);
    let outcome = apply_diff(&config.root, &diff, &empty_files, options)?;
    Ok(FixRun { report, outcome })
}

/// Hunk-less one-sided fragments turned into direct file changes.
pub fn empty_file_changes(report: &SuiteReport) -> Vec<EmptyFileChange> {
    let mut changes = Vec::new();
    for (scenario, fragment) in report.fragments() {
        if fragment.patchable {
            continue;
        }
        let path = Path::new(&scenario.expected_dir).join(&fragment.path);
        match fragment.kind {
            FragmentKind::LeftOnly => changes.push(EmptyFileChange::Remove(path)),
            FragmentKind::RightOnly => changes.push(EmptyFileChange::Create(path)),
            FragmentKind::Modified => warn!(
                scenario = %scenario.name,
                path = %fragment.path,
                "modified file has no applicable hunk"
            ),
        }
    }
    changes
}

/// Applies `diff` and `empty_files` under `root` and optionally stages the
/// touched files.
pub fn apply_diff(
    root: &Path,
    diff: &[u8],
    empty_files: &[EmptyFileChange],
    options: &FixOptions,
) -> HarnessResult<FixOutcome> {
    if diff.is_empty() && empty_files.is_empty() {
        return Ok(FixOutcome::NothingToDo);
    }

    let mut files = if diff.is_empty() {
        Vec::new()
    } else {
        apply_patch(root, diff, &options.patch_program)?
    };
    info!(count = files.len(), "patched expected files");

    for change in empty_files {
        apply_empty_file_change(root, change)?;
        files.push(normalize_path(change.path()));
    }

    if options.stage && !files.is_empty() {
        stage_files(root, &files, &options.git_program)?;
    }

    Ok(FixOutcome::Patched {
        files,
        staged: options.stage,
    })
}

fn apply_patch(root: &Path, diff: &[u8], patch_program: &Path) -> HarnessResult<Vec<String>> {
    let mut child = Command::new(patch_program)
        .args(["-p1", "--batch"])
        .current_dir(root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            HarnessError::process(
                "RUN.PATCH_SPAWN",
                format!(
                    "failed to execute patch tool '{}': {}",
                    patch_program.display(),
                    source
                ),
            )
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(diff) {
            Ok(()) => {}
            // Early exit by the tool is reported through its status.
            Err(source) if source.kind() == ErrorKind::BrokenPipe => {}
            Err(source) => {
                return Err(HarnessError::io_system(
                    "IO.PATCH_STDIN",
                    format!("failed to write diff to patch tool: {}", source),
                ));
            }
        }
    }

    let output = child.wait_with_output().map_err(|source| {
        HarnessError::process(
            "RUN.PATCH_WAIT",
            format!("failed to wait for patch tool: {}", source),
        )
    })?;
    ensure_success(&output, "RUN.PATCH_APPLY", "patch tool")?;

    Ok(parse_patched_files(&String::from_utf8_lossy(&output.stdout)))
}

fn apply_empty_file_change(root: &Path, change: &EmptyFileChange) -> HarnessResult<()> {
    let path = root.join(change.path());
    let result = match change {
        EmptyFileChange::Create(_) => path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, b"")),
        EmptyFileChange::Remove(_) => fs::remove_file(&path),
    };
    result.map_err(|source| {
        HarnessError::io_system(
            "IO.FIX_EMPTY_FILE",
            format!("failed to update empty file '{}': {}", path.display(), source),
        )
    })
}

fn stage_files(root: &Path, files: &[String], git_program: &Path) -> HarnessResult<()> {
    info!(count = files.len(), "staging patched files");
    let output = Command::new(git_program)
        .arg("add")
        .arg("--")
        .args(files)
        .current_dir(root)
        .output()
        .map_err(|source| {
            HarnessError::process(
                "RUN.STAGE_SPAWN",
                format!(
                    "failed to execute staging command '{}': {}",
                    git_program.display(),
                    source
                ),
            )
        })?;
    ensure_success(&output, "RUN.STAGE_ADD", "staging command")
}

fn ensure_success(output: &Output, placeholder: &'static str, tool: &str) -> HarnessResult<()> {
    if output.status.success() {
        return Ok(());
    }

    let status_text = output.status.code().map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exit code {}", code),
    );
    Err(HarnessError::process(
        placeholder,
        format!(
            "{} failed with {}\n{}{}",
            tool,
            status_text,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    ))
}

/// Extracts the paths from `patching file <path>` lines of patch output.
pub fn parse_patched_files(patch_output: &str) -> Vec<String> {
    patch_output
        .lines()
        .filter_map(|line| line.strip_prefix(PATCHING_FILE_PREFIX))
        .map(|path| unquote(path.trim_end()).to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

fn unquote(path: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = path
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    path
}
