//! Runs the selected scenarios back to back.

use std::io::Write;

use anyhow::{Context, Result};
use bootcheck::exit_codes;
use bootcheck::io::build::{BuildStep, SkipBuild, configured_build};
use bootcheck::io::config::HarnessConfig;
use bootcheck::run::run_scenario;
use bootcheck::scenario::builtin;
use tracing::{debug, info};

/// Build (unless skipped), then run `ids` in order.
pub fn run_selected<O: Write, E: Write>(
    cfg: &HarnessConfig,
    ids: &[&str],
    stdout: &mut O,
    stderr: &mut E,
) -> Result<i32> {
    let build = configured_build(cfg);
    run_with_build(cfg, ids, build.as_ref(), stdout, stderr)
}

/// Run `build` once, then each scenario with the build skipped.
///
/// Stops at the first scenario that does not pass; its status becomes the
/// run's status.
pub fn run_with_build<O: Write, E: Write>(
    cfg: &HarnessConfig,
    ids: &[&str],
    build: &dyn BuildStep,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<i32> {
    let scenarios = ids
        .iter()
        .map(|id| builtin(id))
        .collect::<Result<Vec<_>>>()?;
    build.run()?;

    for scenario in &scenarios {
        debug!(scenario = scenario.id(), "starting scenario");
        writeln!(stdout, "== {} ==", scenario.id()).context("write header")?;
        let outcome = run_scenario(cfg, scenario, &SkipBuild, stdout, stderr)
            .with_context(|| format!("scenario {}", scenario.id()))?;
        let code = outcome.exit_code();
        info!(scenario = scenario.id(), code, "scenario finished");
        if code != exit_codes::OK {
            return Ok(code);
        }
    }
    Ok(exit_codes::OK)
}
