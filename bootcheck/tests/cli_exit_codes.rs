//! Exit statuses of the `bootcheck` binary.

use std::path::Path;
use std::process::{Command, Output};

use bootcheck::test_support::{FakeConsole, FakeConsoleOptions, write_executable};

fn bootcheck(console: &FakeConsole, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bootcheck"));
    command
        .args(args)
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("QEMU", console.path())
        .env("O", console.dir())
        .env("LINUX_ROOT", console.dir())
        .env("DISK_MB", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("run bootcheck")
}

const SKIP_BUILD: &[(&str, &str)] = &[("SKIP_BUILD", "1")];

#[test]
fn list_prints_builtin_ids() {
    let console = FakeConsole::new().expect("console");
    let output = bootcheck(&console, &["--list"], &[]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "smoke\nfull-boot\nvirtio-disk\n"
    );
}

#[test]
fn passing_smoke_exits_zero() {
    let console = FakeConsole::new().expect("console");
    let output = bootcheck(&console, &["smoke"], SKIP_BUILD);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("# ls /"));
}

#[test]
fn failed_verification_exits_two() {
    let console = FakeConsole::with_options(&FakeConsoleOptions {
        vda_dev: "E: open /sys/block/vda/dev: -2".to_string(),
        ..FakeConsoleOptions::default()
    })
    .expect("console");
    let output = bootcheck(&console, &["virtio-disk"], SKIP_BUILD);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: virtio disk smoke failed; violated: "));
    assert!(stderr.contains("qemu: "));
}

#[test]
fn failed_build_propagates_its_status() {
    let console = FakeConsole::new().expect("console");
    let script = write_executable(console.dir(), "build.sh", "#!/bin/sh\nexit 5\n")
        .expect("build script");
    let script = script.to_string_lossy().into_owned();
    let output = bootcheck(&console, &["smoke"], &[("BUILD_SCRIPT", script.as_str())]);
    assert_eq!(output.status.code(), Some(5));
    assert!(output.stdout.is_empty());
}

#[test]
fn launch_error_exits_one() {
    let console = FakeConsole::new().expect("console");
    let output = bootcheck(
        &console,
        &["smoke"],
        &[("SKIP_BUILD", "yes"), ("QEMU", "/nonexistent/qemu-system-linx64")],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/nonexistent/qemu-system-linx64"));
}

#[test]
fn unknown_scenario_and_bad_config_exit_one() {
    let console = FakeConsole::new().expect("console");
    let output = bootcheck(&console, &["no-such-scenario"], SKIP_BUILD);
    assert_eq!(output.status.code(), Some(1));

    let output = bootcheck(
        &console,
        &["smoke"],
        &[("SKIP_BUILD", "1"), ("TIMEOUT", "0")],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("TIMEOUT"));
}

#[test]
fn scenario_file_path_is_accepted() {
    let console = FakeConsole::new().expect("console");
    let path = console.dir().join("tiny.toml");
    std::fs::write(
        &path,
        "[scenario]\nid = \"tiny\"\nlabel = \"tiny check\"\ntimeout_secs = 10\n\
         script = \"ls /\\npoweroff\\n\"\n\n[expect]\nrequired = [\"sbin\"]\n",
    )
    .expect("write scenario");
    let output = bootcheck(&console, &[path_str(&path)], SKIP_BUILD);
    assert_eq!(output.status.code(), Some(0));
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
