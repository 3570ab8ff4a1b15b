//! Scenario table for the pcb2gcode gerbv examples, plus an optional JSON
//! manifest that replaces it.

use crate::domain::{HarnessError, Scenario};
use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const EXAMPLES_PATH: &str = "testing/gerbv_example";

#[derive(Debug, Clone, Copy)]
pub struct ScenarioSpec {
    pub example: &'static str,
    pub args: &'static [&'static str],
    pub exit_code: i32,
}

pub const BUILTIN_SCENARIOS: [ScenarioSpec; 7] = [
    ScenarioSpec {
        example: "multivibrator",
        args: &[],
        exit_code: 0,
    },
    ScenarioSpec {
        example: "am-test-voronoi",
        args: &[],
        exit_code: 0,
    },
    ScenarioSpec {
        example: "slots-milldrill",
        args: &[],
        exit_code: 0,
    },
    ScenarioSpec {
        example: "multivibrator_xy_offset",
        args: &[],
        exit_code: 0,
    },
    ScenarioSpec {
        example: "multivibrator",
        args: &["--front=non_existant_file"],
        exit_code: 1,
    },
    ScenarioSpec {
        example: "multivibrator",
        args: &["--back=non_existant_file"],
        exit_code: 1,
    },
    ScenarioSpec {
        example: "multivibrator",
        args: &["--outline=non_exsistant_file"],
        exit_code: 1,
    },
];

impl ScenarioSpec {
    pub fn to_scenario(self) -> Scenario {
        Scenario::new(
            Path::new(EXAMPLES_PATH).join(self.example),
            self.args.iter().copied(),
            self.exit_code,
        )
    }
}

pub fn builtin_scenarios() -> Vec<Scenario> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|spec| spec.to_scenario())
        .collect()
}

#[derive(Debug, Deserialize)]
struct ScenarioManifest {
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioManifestError {
    #[error("failed to read scenario manifest '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse scenario manifest '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("scenario manifest '{}' does not declare any scenarios", path.display())]
    Empty { path: PathBuf },
    #[error("invalid scenario filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        source: globset::Error,
    },
}

impl From<ScenarioManifestError> for HarnessError {
    fn from(error: ScenarioManifestError) -> Self {
        let message = error.to_string();
        match error {
            ScenarioManifestError::Read { .. } => {
                HarnessError::io_system("IO.SCENARIO_MANIFEST", message)
            }
            ScenarioManifestError::Parse { .. } | ScenarioManifestError::Empty { .. } => {
                HarnessError::input_validation("INPUT.SCENARIO_MANIFEST", message)
            }
            ScenarioManifestError::InvalidFilter { .. } => {
                HarnessError::input_validation("INPUT.SCENARIO_FILTER", message)
            }
        }
    }
}

pub fn load_scenario_manifest(
    manifest_path: impl AsRef<Path>,
) -> Result<Vec<Scenario>, ScenarioManifestError> {
    let manifest_path = manifest_path.as_ref();
    let content =
        fs::read_to_string(manifest_path).map_err(|source| ScenarioManifestError::Read {
            path: manifest_path.to_path_buf(),
            source,
        })?;
    let manifest: ScenarioManifest =
        serde_json::from_str(&content).map_err(|source| ScenarioManifestError::Parse {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    if manifest.scenarios.is_empty() {
        return Err(ScenarioManifestError::Empty {
            path: manifest_path.to_path_buf(),
        });
    }
    Ok(manifest.scenarios)
}

/// Keeps scenarios whose input path matches `pattern`, preserving order.
pub fn filter_scenarios(
    scenarios: Vec<Scenario>,
    pattern: &str,
) -> Result<Vec<Scenario>, ScenarioManifestError> {
    let matcher: GlobMatcher = Glob::new(pattern)
        .map_err(|source| ScenarioManifestError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?
        .compile_matcher();

    Ok(scenarios
        .into_iter()
        .filter(|scenario| matcher.is_match(&scenario.input_path))
        .collect())
}
