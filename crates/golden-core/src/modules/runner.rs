use super::traits::{CaseExecutor, CaseRequest};
use crate::domain::{HarnessError, HarnessResult, ObservedExit};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

const OUTPUT_DIR_FLAG: &str = "--output-dir";
const OUTPUT_DIR_PREFIX: &str = "golden-harness-";

/// Result of one program invocation. The output directory is removed when
/// this value is dropped or when [`RunResult::close`] is called.
#[derive(Debug)]
pub struct RunResult {
    pub exit: ObservedExit,
    output_dir: TempDir,
}

impl RunResult {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.path()
    }

    pub fn close(self) -> HarnessResult<()> {
        let path = self.output_dir.path().to_path_buf();
        self.output_dir.close().map_err(|source| {
            HarnessError::io_system(
                "IO.CASE_OUTPUT_CLEANUP",
                format!(
                    "failed to remove output directory '{}': {}",
                    path.display(),
                    source
                ),
            )
        })
    }
}

/// Runs the program once inside `working_dir` with a fresh output directory.
pub fn run_case(
    executor: &dyn CaseExecutor,
    working_dir: &Path,
    args: &[String],
) -> HarnessResult<RunResult> {
    let output_dir = tempfile::Builder::new()
        .prefix(OUTPUT_DIR_PREFIX)
        .tempdir()
        .map_err(|source| {
            HarnessError::io_system(
                "IO.CASE_OUTPUT_DIR",
                format!("failed to create temporary output directory: {}", source),
            )
        })?;

    let request = CaseRequest::new(working_dir, output_dir.path(), args);
    let exit = executor.execute(&request)?;
    debug!(
        working_dir = %working_dir.display(),
        output_dir = %output_dir.path().display(),
        %exit,
        "case finished"
    );
    Ok(RunResult { exit, output_dir })
}

/// Executes the real program under test as a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl CaseExecutor for ProcessExecutor {
    fn execute(&self, request: &CaseRequest) -> HarnessResult<ObservedExit> {
        let output = Command::new(&self.program)
            .arg(OUTPUT_DIR_FLAG)
            .arg(request.output_dir())
            .args(&request.args)
            .current_dir(&request.working_dir)
            .output()
            .map_err(|source| {
                HarnessError::process(
                    "RUN.CASE_SPAWN",
                    format!(
                        "failed to execute '{}' in '{}': {}",
                        self.program.display(),
                        request.working_dir.display(),
                        source
                    ),
                )
            })?;

        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout), "program stdout");
        }
        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "program stderr");
        }

        Ok(ObservedExit(output.status.code()))
    }
}
