use crate::domain::{HarnessResult, ObservedExit};
use std::path::{Path, PathBuf};

/// Everything an executor needs for one invocation of the program under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRequest {
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    pub args: Vec<String>,
}

impl CaseRequest {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        args: &[String],
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            output_dir: output_dir.into(),
            args: args.to_vec(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

pub trait CaseExecutor {
    fn execute(&self, request: &CaseRequest) -> HarnessResult<ObservedExit>;
}
