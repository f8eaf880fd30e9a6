//! Built-in scenarios run end to end against the fake console.

use std::fs;

use bootcheck::exit_codes;
use bootcheck::io::build::SkipBuild;
use bootcheck::outcome::Outcome;
use bootcheck::run::{RunOutcome, run_scenario};
use bootcheck::scenario::builtin;
use bootcheck::test_support::{FakeConsole, FakeConsoleOptions, ScriptedBuild};

struct Captured {
    outcome: RunOutcome,
    stdout: String,
    stderr: String,
}

fn run(console: &FakeConsole, scenario: &str, extra: &[(&str, &str)]) -> Captured {
    let cfg = console.harness_with(extra).expect("harness");
    let scenario = builtin(scenario).expect("scenario");
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let outcome =
        run_scenario(&cfg, &scenario, &SkipBuild, &mut stdout, &mut stderr).expect("run");
    Captured {
        outcome,
        stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
    }
}

#[test]
fn smoke_passes_and_prints_excerpt() {
    let console = FakeConsole::new().expect("console");
    let run = run(&console, "smoke", &[]);

    assert_eq!(run.outcome.outcome, Outcome::Pass, "stderr: {}", run.stderr);
    assert_eq!(run.outcome.exit_code(), exit_codes::OK);
    assert!(!run.outcome.timed_out);
    assert!(run.stdout.contains("# cat /no-such\n"));
    assert!(run.stdout.contains("E: open /no-such: -2\n"));
    assert!(run.stdout.contains("reboot: Power down\n"));
    assert!(!run.stdout.contains("Linux version"));
    assert!(run.stderr.is_empty());
}

#[test]
fn full_boot_fails_on_probe_error() {
    let console = FakeConsole::with_options(&FakeConsoleOptions {
        proc_probe_error: true,
        ..FakeConsoleOptions::default()
    })
    .expect("console");
    let run = run(&console, "full-boot", &[]);

    assert_eq!(run.outcome.outcome, Outcome::Fail);
    assert_eq!(run.outcome.exit_code(), exit_codes::VERIFY_FAILED);
    assert_eq!(run.outcome.verification.violated.len(), 3);
    assert!(
        run.stderr
            .starts_with("error: full userspace boot check failed; violated: ")
    );
    assert!(run.stderr.contains("kernel: "));
    assert!(run.stderr.contains("cmd: "));
    assert!(run.stderr.contains("E: probe failed: -5"));
    assert!(run.stdout.is_empty());
}

#[test]
fn virtio_disk_passes_and_provisions_image() {
    let console = FakeConsole::new().expect("console");
    let run = run(&console, "virtio-disk", &[("DISK_MB", "2")]);

    assert_eq!(run.outcome.outcome, Outcome::Pass, "stderr: {}", run.stderr);
    let image = console.dir().join("linx-disk-smoke.img");
    assert_eq!(fs::metadata(&image).expect("image").len(), 2 * 1024 * 1024);
    assert!(run.stdout.contains("vda\n"));
}

#[test]
fn virtio_disk_fails_on_no_device_code() {
    let console = FakeConsole::with_options(&FakeConsoleOptions {
        vda_dev: "n1=fffffffffffffff7".to_string(),
        ..FakeConsoleOptions::default()
    })
    .expect("console");
    let run = run(&console, "virtio-disk", &[("DISK_MB", "1")]);

    assert_eq!(run.outcome.exit_code(), exit_codes::VERIFY_FAILED);
    assert_eq!(
        run.outcome.verification.violated,
        vec!["\"fffffffffffffff7\" in section \"# probe /sys/block/vda/dev\"".to_string()]
    );
    assert!(run.stderr.contains("disk_img: "));
}

#[test]
fn timeout_after_passing_output_is_only_a_note() {
    let console = FakeConsole::with_options(&FakeConsoleOptions {
        hang_on_poweroff: true,
        ..FakeConsoleOptions::default()
    })
    .expect("console");
    let run = run(&console, "smoke", &[("TIMEOUT", "3")]);

    assert!(run.outcome.timed_out);
    assert_eq!(run.outcome.outcome, Outcome::Pass);
    assert_eq!(
        run.stderr,
        "note: emulator did not exit; killed after TIMEOUT=3s\n"
    );
}

#[test]
fn prompt_that_never_appears_fails_with_partial_transcript() {
    let console = FakeConsole::with_options(&FakeConsoleOptions {
        boot_delay_secs: 5,
        ..FakeConsoleOptions::default()
    })
    .expect("console");
    let run = run(&console, "smoke", &[("TIMEOUT", "1")]);

    assert!(run.outcome.timed_out);
    assert_eq!(run.outcome.outcome, Outcome::Fail);
    assert!(
        run.stderr
            .contains("note: emulator did not exit; killed after TIMEOUT=1s")
    );
    assert!(run.stderr.contains("note: console prompt never appeared"));
}

#[test]
fn build_failure_aborts_before_launch() {
    let console = FakeConsole::new().expect("console");
    let cfg = console.harness().expect("harness");
    let scenario = builtin("smoke").expect("smoke");
    let build = ScriptedBuild::failing(7);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let err = run_scenario(&cfg, &scenario, &build, &mut stdout, &mut stderr)
        .expect_err("build fails");
    assert_eq!(exit_codes::for_error(&err), 7);
    assert_eq!(build.runs(), 1);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}
