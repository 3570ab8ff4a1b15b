pub mod fix;
pub mod runner;
pub mod suite;
pub mod tree_diff;

mod traits;

pub use fix::{
    EmptyFileChange, FixOptions, FixOutcome, FixRun, apply_diff, empty_file_changes,
    parse_patched_files, run_fix,
};
pub use runner::{ProcessExecutor, RunResult, run_case};
pub use suite::{
    HarnessConfig, ScenarioOutcome, ScenarioReport, SuiteReport, render_failure_message,
    render_human_summary, run_suite,
};
pub use traits::{CaseExecutor, CaseRequest};
pub use tree_diff::{DiffFragment, FragmentKind, TreeDiff, compare_directories, diff_trees};
