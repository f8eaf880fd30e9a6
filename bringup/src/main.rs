mod cli;
mod plan;

use std::process::ExitCode;

use anyhow::Result;
use bootcheck::exit_codes;
use bootcheck::io::config::HarnessConfig;
use bootcheck::logging;
use clap::Parser;

use crate::plan::ScenarioSelection;

#[derive(Parser)]
#[command(
    name = "bringup",
    version,
    about = "Boot bring-up runner: builds once, then runs the console checks in order"
)]
struct Cli {
    /// Run only the interactive smoke scenario.
    #[arg(long)]
    smoke_only: bool,
    /// Leave out the virtio disk scenario.
    #[arg(long)]
    skip_virtio_disk: bool,
}

fn main() -> ExitCode {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::for_error(&err)
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let selection = ScenarioSelection {
        smoke_only: cli.smoke_only,
        skip_virtio_disk: cli.skip_virtio_disk,
    };
    let cfg = HarnessConfig::from_env()?;
    cli::run_selected(
        &cfg,
        &selection.scenario_ids(),
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
}
