//! Boot console check for a single scenario.
//!
//! Configuration comes from the environment (see `io::config`); the only
//! argument is the scenario to run.

use std::io;
use std::process::ExitCode;

use anyhow::{Result, bail};
use bootcheck::exit_codes;
use bootcheck::io::build::configured_build;
use bootcheck::io::config::HarnessConfig;
use bootcheck::logging;
use bootcheck::run::run_scenario;
use bootcheck::scenario::{builtin_ids, resolve};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "bootcheck",
    version,
    about = "Scripted boot console check against an emulated machine"
)]
struct Cli {
    /// Built-in scenario id (`smoke`, `full-boot`, `virtio-disk`) or a path
    /// to a scenario TOML file.
    #[arg(required_unless_present = "list")]
    scenario: Option<String>,
    /// Print the built-in scenario ids and exit.
    #[arg(long)]
    list: bool,
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
    if cli.list {
        for id in builtin_ids() {
            println!("{id}");
        }
        return Ok(exit_codes::OK);
    }
    let Some(name) = cli.scenario else {
        bail!("no scenario given");
    };

    let scenario = resolve(&name)?;
    let cfg = HarnessConfig::from_env()?;
    let build = configured_build(&cfg);
    let outcome = run_scenario(
        &cfg,
        &scenario,
        build.as_ref(),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )?;
    Ok(outcome.exit_code())
}
