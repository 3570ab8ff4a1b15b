use super::CliError;
use super::helpers::{HarnessContext, load_harness_context};
use anyhow::Context;
use golden_core::modules::{
    FixOptions, render_failure_message, render_human_summary, run_fix, run_suite,
};
use std::io::Write;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct HarnessArgs {
    /// Directory that scenario input paths are relative to
    #[arg(long, default_value = ".")]
    pub(super) root: PathBuf,

    /// Program under test, resolved against the root unless absolute
    #[arg(long, default_value = "pcb2gcode")]
    pub(super) program: PathBuf,

    /// JSON scenario manifest used instead of the built-in table
    #[arg(long)]
    pub(super) manifest: Option<PathBuf>,

    /// Only run scenarios whose input path matches this glob
    #[arg(long)]
    pub(super) filter: Option<String>,

    /// JSON report output path
    #[arg(long)]
    pub(super) report: Option<PathBuf>,

    /// Patch tool used by --fix
    #[arg(long, default_value = "patch")]
    pub(super) patch_program: PathBuf,

    /// Version-control command used by --add
    #[arg(long, default_value = "git")]
    pub(super) git_program: PathBuf,
}

pub(super) fn run_check_command(args: HarnessArgs) -> Result<i32, CliError> {
    let HarnessContext {
        config,
        executor,
        scenarios,
        ..
    } = load_harness_context(args)?;

    let report = run_suite(&config, &executor, &scenarios)?;
    eprintln!("{}", render_human_summary(&report));
    if let Some(report_path) = &config.report_path {
        eprintln!("JSON report: {}", report_path.display());
    }

    if report.passed {
        return Ok(0);
    }
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&render_failure_message(&report))
        .and_then(|()| stdout.flush())
        .context("failed to write failure message to stdout")?;
    Ok(1)
}

pub(super) fn run_fix_command(args: HarnessArgs, stage: bool) -> Result<i32, CliError> {
    let HarnessContext {
        config,
        executor,
        scenarios,
        patch_program,
        git_program,
    } = load_harness_context(args)?;
    let options = FixOptions {
        stage,
        patch_program,
        git_program,
    };

    println!("Generating expected outputs...");
    let run = run_fix(&config, &executor, &scenarios, &options)?;
    println!("{}", run.outcome.render());

    if run.report.exit_code_mismatch_count > 0 {
        eprintln!("{}", render_human_summary(&run.report));
        eprintln!("Exit code mismatches cannot be fixed by regenerating expected outputs.");
        return Ok(1);
    }
    Ok(0)
}
