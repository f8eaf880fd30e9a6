//! One scenario end to end: build, provision, session, verify, report.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::verifier::{VerificationResult, verify};
use crate::core::watcher::ReadinessMarker;
use crate::io::build::BuildStep;
use crate::io::config::{HarnessConfig, SessionConfig};
use crate::io::disk::provision_disk;
use crate::io::pump::run_session;
use crate::outcome::{Outcome, classify_outcome};
use crate::report::{
    FailureContext, LaunchSummary, write_failure, write_success, write_timeout_note,
};
use crate::scenario::ScenarioFile;

/// A session ready to launch, with what the failure dump needs to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub session: SessionConfig,
    pub summary: LaunchSummary,
    /// Image to provision before launch, with its size in MiB.
    pub disk: Option<(PathBuf, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub scenario_id: String,
    pub outcome: Outcome,
    pub verification: VerificationResult,
    pub timed_out: bool,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Resolve the emulator command for `scenario` under `cfg`.
pub fn plan_launch(cfg: &HarnessConfig, scenario: &ScenarioFile) -> LaunchPlan {
    let meta = &scenario.scenario;
    let program = cfg.resolve_emulator(&meta.emulator_preference);
    let disk = scenario
        .disk
        .as_ref()
        .map(|spec| (cfg.disk_image.clone(), cfg.disk_mb.unwrap_or(spec.size_mb)));

    let mut args: Vec<OsString> = [
        "-nographic",
        "-monitor",
        "none",
        "-machine",
        "virt",
        "-m",
        cfg.memory.as_str(),
        "-smp",
        cfg.cpus.as_str(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push("-kernel".into());
    args.push(cfg.kernel.clone().into_os_string());
    args.push("-initrd".into());
    args.push(cfg.initrd.clone().into_os_string());
    if let Some((image, _)) = &disk {
        let mut drive = OsString::from("if=none,id=vd0,file=");
        drive.push(image);
        drive.push(",format=raw");
        args.push("-drive".into());
        args.push(drive);
        args.push("-device".into());
        args.push("virtio-blk-device,drive=vd0".into());
    }
    args.push("-append".into());
    args.push(cfg.append.clone().unwrap_or_else(|| meta.append.clone()).into());

    let script = cfg.script.clone().unwrap_or_else(|| meta.script.clone());
    let timeout = cfg.timeout.unwrap_or_else(|| scenario.default_timeout());
    let session = SessionConfig::new(&program, script, timeout)
        .with_args(args)
        .with_readiness(ReadinessMarker::new(meta.prompt.clone()));

    let mut summary = LaunchSummary::new(session.command_line())
        .with_artifact("kernel", &cfg.kernel)
        .with_artifact("initrd", &cfg.initrd);
    if let Some((image, _)) = &disk {
        summary = summary.with_artifact("disk_img", image);
    }
    let summary = summary.with_artifact("qemu", &program);

    LaunchPlan {
        session,
        summary,
        disk,
    }
}

/// Run `scenario` and report to `stdout`/`stderr`.
///
/// Build, provisioning and launch errors abort with no report. Everything
/// after a session ends, including a timeout, is reported and folded into
/// the returned outcome.
#[instrument(skip_all, fields(scenario = %scenario.id()))]
pub fn run_scenario<O: Write, E: Write>(
    cfg: &HarnessConfig,
    scenario: &ScenarioFile,
    build: &dyn BuildStep,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<RunOutcome> {
    build.run()?;

    let plan = plan_launch(cfg, scenario);
    if let Some((image, size_mb)) = &plan.disk {
        provision_disk(image, *size_mb)?;
    }
    info!(cmd = %plan.summary.command_line, "launching session");

    let session = run_session(&plan.session)?;
    let text = session.transcript.text();
    let meta = &scenario.scenario;
    let verification = verify(&text, &scenario.expectations(), &meta.prompt);
    let outcome = classify_outcome(&verification);

    match outcome {
        Outcome::Pass => {
            write_success(stdout, &scenario.excerpt, &text, meta.tail_lines)
                .context("write excerpt")?;
            if session.timed_out {
                warn!("session timed out after verification content was captured");
                write_timeout_note(stderr, plan.session.timeout).context("write timeout note")?;
            }
        }
        Outcome::Fail => {
            let ctx = FailureContext {
                label: &meta.label,
                text: &text,
                tail_lines: meta.tail_lines,
                timed_out_after: session.timed_out.then_some(plan.session.timeout),
                prompt_seen: session.prompt_seen,
                script_sent: session.script_sent,
            };
            write_failure(stderr, &ctx, &verification, &plan.summary)
                .context("write failure report")?;
        }
    }
    info!(?outcome, timed_out = session.timed_out, "scenario finished");

    Ok(RunOutcome {
        scenario_id: scenario.id().to_string(),
        outcome,
        verification,
        timed_out: session.timed_out,
    })
}
