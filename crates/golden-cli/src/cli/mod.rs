mod commands;
mod helpers;

use clap::Parser;
use golden_core::domain::HarnessError;

pub fn run_from_env() -> i32 {
    helpers::init_logging();
    match parse_and_dispatch(std::env::args()) {
        Ok(code) => code,
        Err(error) => {
            let harness_error = error.as_harness_error();
            eprintln!("{}", harness_error.diagnostic_line());
            harness_error.exit_code()
        }
    }
}

fn parse_and_dispatch<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => dispatch_parsed(cli),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "golden-harness",
    version,
    about = "Golden-file integration tests for pcb2gcode"
)]
struct Cli {
    /// Generate expected outputs automatically
    #[arg(long)]
    fix: bool,

    /// Stage regenerated expected outputs with git
    #[arg(long, requires = "fix")]
    add: bool,

    #[command(flatten)]
    harness: commands::HarnessArgs,
}

fn dispatch_parsed(cli: Cli) -> Result<i32, CliError> {
    if cli.fix {
        commands::run_fix_command(cli.harness, cli.add)
    } else {
        commands::run_check_command(cli.harness)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Harness(HarnessError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<HarnessError> for CliError {
    fn from(error: HarnessError) -> Self {
        Self::Harness(error)
    }
}

impl CliError {
    fn as_harness_error(&self) -> HarnessError {
        match self {
            Self::Usage(message) => {
                HarnessError::input_validation("INPUT.CLI_USAGE", message.trim_end())
            }
            Self::Harness(error) => error.clone(),
            Self::Internal(error) => HarnessError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
