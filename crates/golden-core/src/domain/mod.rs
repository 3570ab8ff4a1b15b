pub mod errors;

pub use errors::{HarnessError, HarnessErrorCategory, HarnessResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// One row of the scenario table: where to run the program, what to pass it,
/// and which exit status it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(rename = "inputPath")]
    pub input_path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(rename = "exitCode", default)]
    pub exit_code: i32,
}

impl Scenario {
    pub fn new(
        input_path: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
        exit_code: i32,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            args: args.into_iter().map(Into::into).collect(),
            exit_code,
        }
    }

    pub fn expects_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Checked-in golden tree for this scenario, relative to the harness root.
    pub fn expected_dir(&self) -> PathBuf {
        self.input_path.join("expected")
    }

    /// Diff labels for the expected and actual sides.
    ///
    /// Both labels end in the expected directory so that stripping the first
    /// component (`patch -p1`) lands on the on-disk golden files.
    pub fn diff_labels(&self) -> (String, String) {
        let relative = normalize_path(&self.expected_dir());
        (format!("expected/{relative}"), format!("actual/{relative}"))
    }

    pub fn display_name(&self) -> String {
        let path = normalize_path(&self.input_path);
        if self.args.is_empty() {
            path
        } else {
            format!("{} {}", path, self.args.join(" "))
        }
    }
}

/// Exit status of a child process as observed by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObservedExit(pub Option<i32>);

impl ObservedExit {
    pub fn matches(self, expected: i32) -> bool {
        self.0 == Some(expected)
    }
}

impl Display for ObservedExit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
