use super::runner::run_case;
use super::traits::CaseExecutor;
use super::tree_diff::{DiffFragment, diff_trees};
use crate::domain::{HarnessError, HarnessResult, ObservedExit, Scenario, normalize_path};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub const FIX_HINT: &str = "***\nRun one of these:\n\
golden-harness --fix\n\
golden-harness --fix --add\n\
***\n";

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory that scenario input paths and diff labels are relative to.
    pub root: PathBuf,
    pub report_path: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            report_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    ExitCodeMismatch,
    TreeMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub input_path: String,
    pub expected_dir: String,
    pub args: Vec<String>,
    pub expected_exit_code: i32,
    pub observed_exit_code: ObservedExit,
    pub outcome: ScenarioOutcome,
    /// Diff text with invalid UTF-8 replaced; `fragments` keeps the raw bytes.
    pub diff: String,
    #[serde(skip)]
    pub fragments: Vec<DiffFragment>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub root: String,
    pub scenario_count: usize,
    pub passed_scenario_count: usize,
    pub exit_code_mismatch_count: usize,
    pub tree_mismatch_count: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    /// Concatenated diff text of every scenario, in table order.
    pub fn aggregate_diff(&self) -> String {
        self.scenarios
            .iter()
            .map(|scenario| scenario.diff.as_str())
            .collect()
    }

    /// Raw bytes of the aggregate diff, notices included.
    pub fn aggregate_diff_bytes(&self) -> Vec<u8> {
        self.fragments()
            .flat_map(|(_, fragment)| fragment.bytes.iter().copied())
            .collect()
    }

    /// Only the fragments `patch` can apply, as raw bytes.
    pub fn patchable_diff(&self) -> Vec<u8> {
        self.fragments()
            .filter(|(_, fragment)| fragment.patchable)
            .flat_map(|(_, fragment)| fragment.bytes.iter().copied())
            .collect()
    }

    pub fn fragments(&self) -> impl Iterator<Item = (&ScenarioReport, &DiffFragment)> {
        self.scenarios.iter().flat_map(|scenario| {
            scenario
                .fragments
                .iter()
                .map(move |fragment| (scenario, fragment))
        })
    }

    pub fn exit_code_mismatches(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios
            .iter()
            .filter(|scenario| scenario.outcome == ScenarioOutcome::ExitCodeMismatch)
    }
}

/// Runs every scenario in order and collects all divergences. Failures of
/// one scenario never stop the others.
pub fn run_suite(
    config: &HarnessConfig,
    executor: &dyn CaseExecutor,
    scenarios: &[Scenario],
) -> HarnessResult<SuiteReport> {
    let mut scenario_reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let report = run_scenario(&config.root, executor, scenario)?;
        scenario_reports.push(report);
    }

    let scenario_count = scenario_reports.len();
    let passed_scenario_count = scenario_reports
        .iter()
        .filter(|scenario| scenario.passed())
        .count();
    let exit_code_mismatch_count = scenario_reports
        .iter()
        .filter(|scenario| scenario.outcome == ScenarioOutcome::ExitCodeMismatch)
        .count();
    let tree_mismatch_count = scenario_reports
        .iter()
        .filter(|scenario| scenario.outcome == ScenarioOutcome::TreeMismatch)
        .count();

    let report = SuiteReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: passed_scenario_count == scenario_count,
        root: normalize_path(&config.root),
        scenario_count,
        passed_scenario_count,
        exit_code_mismatch_count,
        tree_mismatch_count,
        scenarios: scenario_reports,
    };

    if let Some(report_path) = &config.report_path {
        write_report_file(report_path, &report).map_err(HarnessError::from)?;
    }
    Ok(report)
}

fn run_scenario(
    root: &Path,
    executor: &dyn CaseExecutor,
    scenario: &Scenario,
) -> HarnessResult<ScenarioReport> {
    let name = scenario.display_name();
    info!(scenario = %name, "running scenario");
    let working_dir = root.join(&scenario.input_path);
    let run = run_case(executor, &working_dir, &scenario.args)?;
    let observed = run.exit;

    let mut report = ScenarioReport {
        name,
        input_path: normalize_path(&scenario.input_path),
        expected_dir: normalize_path(&scenario.expected_dir()),
        args: scenario.args.clone(),
        expected_exit_code: scenario.exit_code,
        observed_exit_code: observed,
        outcome: ScenarioOutcome::Passed,
        diff: String::new(),
        fragments: Vec::new(),
    };

    if !observed.matches(scenario.exit_code) {
        warn!(
            scenario = %report.name,
            expected = scenario.exit_code,
            observed = %observed,
            "exit code mismatch"
        );
        report.outcome = ScenarioOutcome::ExitCodeMismatch;
        run.close()?;
        return Ok(report);
    }

    if !scenario.expects_success() {
        run.close()?;
        return Ok(report);
    }

    let (expected_label, actual_label) = scenario.diff_labels();
    let diff = diff_trees(
        &root.join(scenario.expected_dir()),
        run.output_dir(),
        &expected_label,
        &actual_label,
    )?;
    run.close()?;

    if !diff.is_empty() {
        warn!(
            scenario = %report.name,
            fragments = diff.fragments.len(),
            "output differs from expected tree"
        );
        report.outcome = ScenarioOutcome::TreeMismatch;
        report.diff = diff.to_text();
        report.fragments = diff.fragments;
    }
    Ok(report)
}

/// Text shown when the suite fails: the aggregate diff, any exit-code
/// mismatches, and how to regenerate the expected files. File content in
/// the diff is kept byte for byte so the output can be piped into `patch`.
pub fn render_failure_message(report: &SuiteReport) -> Vec<u8> {
    let mut message = Vec::new();
    let diff = report.aggregate_diff_bytes();
    if !diff.is_empty() {
        message.extend_from_slice(b"Files don't match\n");
        message.extend_from_slice(&diff);
        message.push(b'\n');
    }

    let mismatches = report.exit_code_mismatches().collect::<Vec<_>>();
    if !mismatches.is_empty() {
        message.extend_from_slice(b"Exit codes don't match\n");
        for scenario in mismatches {
            let line = format!(
                "  {}: expected exit code {}, got {}\n",
                scenario.name, scenario.expected_exit_code, scenario.observed_exit_code
            );
            message.extend_from_slice(line.as_bytes());
        }
        message.push(b'\n');
    }

    message.extend_from_slice(FIX_HINT.as_bytes());
    message
}

pub fn render_human_summary(report: &SuiteReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Suite status: {}", status));
    lines.push(format!(
        "Scenarios: {} total ({} passed, {} exit code mismatches, {} tree mismatches)",
        report.scenario_count,
        report.passed_scenario_count,
        report.exit_code_mismatch_count,
        report.tree_mismatch_count
    ));

    for scenario in &report.scenarios {
        let detail = match scenario.outcome {
            ScenarioOutcome::Passed => "PASS".to_string(),
            ScenarioOutcome::ExitCodeMismatch => format!(
                "FAIL (expected exit code {}, got {})",
                scenario.expected_exit_code, scenario.observed_exit_code
            ),
            ScenarioOutcome::TreeMismatch => "FAIL (output differs)".to_string(),
        };
        lines.push(format!("Scenario {}: {}", scenario.name, detail));
    }

    lines.join("\n")
}

#[derive(Debug, thiserror::Error)]
pub enum SuiteReportError {
    #[error("failed to create report directory '{}': {source}", path.display())]
    ReportDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", path.display())]
    SerializeReport {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<SuiteReportError> for HarnessError {
    fn from(error: SuiteReportError) -> Self {
        let message = error.to_string();
        match error {
            SuiteReportError::ReportDirectory { .. } | SuiteReportError::WriteReport { .. } => {
                HarnessError::io_system("IO.SUITE_REPORT", message)
            }
            SuiteReportError::SerializeReport { .. } => {
                HarnessError::internal("SYS.SUITE_REPORT", message)
            }
        }
    }
}

pub fn write_report_file(report_path: &Path, report: &SuiteReport) -> Result<(), SuiteReportError> {
    if let Some(parent_dir) = report_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| SuiteReportError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json = serde_json::to_string_pretty(report).map_err(|source| {
        SuiteReportError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        }
    })?;
    fs::write(report_path, report_json).map_err(|source| SuiteReportError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
