use super::CliError;
use super::commands::HarnessArgs;
use anyhow::Context;
use golden_core::common::{builtin_scenarios, filter_scenarios, load_scenario_manifest};
use golden_core::domain::{HarnessError, Scenario};
use golden_core::modules::{HarnessConfig, ProcessExecutor};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";

/// Logs go to stderr so stdout only carries the diff or fix report.
pub(super) fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) struct HarnessContext {
    pub(super) config: HarnessConfig,
    pub(super) executor: ProcessExecutor,
    pub(super) scenarios: Vec<Scenario>,
    pub(super) patch_program: PathBuf,
    pub(super) git_program: PathBuf,
}

pub(super) fn load_harness_context(args: HarnessArgs) -> Result<HarnessContext, CliError> {
    let working_dir = current_working_dir()?;
    let root = resolve_cli_path(&working_dir, &args.root);
    let program = resolve_cli_path(&root, &args.program);

    let mut scenarios = match &args.manifest {
        Some(manifest) => load_scenario_manifest(resolve_cli_path(&working_dir, manifest))
            .map_err(HarnessError::from)?,
        None => builtin_scenarios(),
    };
    if let Some(pattern) = &args.filter {
        scenarios = filter_scenarios(scenarios, pattern).map_err(HarnessError::from)?;
        if scenarios.is_empty() {
            return Err(CliError::Usage(format!(
                "filter '{}' does not match any scenario",
                pattern
            )));
        }
    }

    info!(
        root = %root.display(),
        program = %program.display(),
        scenarios = scenarios.len(),
        "harness configured"
    );

    let mut config = HarnessConfig::new(root);
    config.report_path = args
        .report
        .as_deref()
        .map(|path| resolve_cli_path(&working_dir, path));

    Ok(HarnessContext {
        config,
        executor: ProcessExecutor::new(program),
        scenarios,
        patch_program: args.patch_program,
        git_program: args.git_program,
    })
}

fn current_working_dir() -> Result<PathBuf, CliError> {
    std::env::current_dir()
        .context("failed to read current working directory")
        .map_err(CliError::from)
}

pub(super) fn resolve_cli_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_cli_path;
    use std::path::{Path, PathBuf};

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/work/repo");
        assert_eq!(
            resolve_cli_path(base, Path::new("pcb2gcode")),
            PathBuf::from("/work/repo/pcb2gcode")
        );
        assert_eq!(
            resolve_cli_path(base, Path::new("/usr/bin/pcb2gcode")),
            PathBuf::from("/usr/bin/pcb2gcode")
        );
    }
}
