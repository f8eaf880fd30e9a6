//! Test-only helpers: a fake boot console, scripted builds, shell sessions.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::io::build::{BuildFailure, BuildStep};
use crate::io::config::{HarnessConfig, SessionConfig};

/// Knobs for the fake console's answers.
#[derive(Debug, Clone)]
pub struct FakeConsoleOptions {
    /// Keep running after `poweroff` so the session has to time out.
    pub hang_on_poweroff: bool,
    /// Line printed for `probe /sys/block/vda/dev`.
    pub vda_dev: String,
    /// Answer `/proc` probes with an error line.
    pub proc_probe_error: bool,
    /// Seconds to wait before printing the first prompt.
    pub boot_delay_secs: u32,
}

impl Default for FakeConsoleOptions {
    fn default() -> Self {
        Self {
            hang_on_poweroff: false,
            vda_dev: "n1=000000000000fe00".to_string(),
            proc_probe_error: false,
            boot_delay_secs: 0,
        }
    }
}

/// A `/bin/sh` script standing in for the emulator, in its own temp dir.
///
/// It ignores its arguments, prints a few boot lines and the `# ` prompt,
/// then echoes and answers each command line it reads, like the initramfs
/// shell does on a serial console.
pub struct FakeConsole {
    dir: TempDir,
    path: PathBuf,
}

impl FakeConsole {
    pub fn new() -> Result<Self> {
        Self::with_options(&FakeConsoleOptions::default())
    }

    pub fn with_options(options: &FakeConsoleOptions) -> Result<Self> {
        let dir = TempDir::new().context("create fake console dir")?;
        let script = fake_console_script(options);
        let path = write_executable(dir.path(), "qemu-system-linx64", &script)?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory next to the script, usable as the build output dir.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Harness config that launches this console and skips the build.
    pub fn harness(&self) -> Result<HarnessConfig> {
        self.harness_with(&[])
    }

    /// Like [`FakeConsole::harness`], with extra environment entries.
    pub fn harness_with(&self, extra: &[(&str, &str)]) -> Result<HarnessConfig> {
        let mut env = BTreeMap::new();
        env.insert("QEMU".to_string(), self.path.to_string_lossy().into_owned());
        env.insert("O".to_string(), self.dir().to_string_lossy().into_owned());
        env.insert("SKIP_BUILD".to_string(), "1".to_string());
        for (key, value) in extra {
            env.insert((*key).to_string(), (*value).to_string());
        }
        HarnessConfig::resolve(|key| env.get(key).cloned(), self.dir())
    }
}

fn fake_console_script(options: &FakeConsoleOptions) -> String {
    let proc_probe = if options.proc_probe_error {
        "echo \"E: probe failed: -5\""
    } else {
        "echo \"n1=0000000000000400\""
    };
    let poweroff = if options.hang_on_poweroff {
        "exec sleep 30"
    } else {
        "exit 0"
    };
    format!(
        r#"#!/bin/sh
sleep {delay}
echo "Linux version 6.9.0-linx (fake console)"
echo "Run /init as init process"
echo "cmds: help ls cat probe getdents64_probe fd0 sigill_test sigsegv_test poweroff"
printf '# '
while IFS= read -r line; do
  printf '%s\n' "$line"
  case "$line" in
    help) echo "cmds: help ls cat probe getdents64_probe fd0 sigill_test sigsegv_test poweroff" ;;
    "ls /") printf 'bin\ndev\netc\ninit\nproc\nrun\nsbin\nsys\ntmp\n' ;;
    "ls /proc") printf '1\ncpuinfo\ninterrupts\nmeminfo\n' ;;
    "ls /sys") printf 'block\ndevices\nkernel\n' ;;
    "ls /sys/block") echo "vda" ;;
    "ls /dev") printf 'console\nnull\nvda\n' ;;
    "probe /proc/"*) {proc_probe} ;;
    "probe /sys/block/vda/dev") echo "{vda_dev}" ;;
    "probe "*) echo "n1=0000000000000001" ;;
    "getdents64_probe "*) echo "dents_ok=0000000000000001" ;;
    "cat /no-such") echo "E: open /no-such: -2" ;;
    fd0) echo "fd0=0000000000000000" ;;
    sigill_test) echo "sigill: ok" ;;
    sigsegv_test) echo "sigsegv: ok" ;;
    poweroff) echo "reboot: Power down"; {poweroff} ;;
    *) echo "E: unknown command" ;;
  esac
  printf '# '
done
"#,
        delay = options.boot_delay_secs,
        vda_dev = options.vda_dev,
    )
}

/// Write `contents` to `dir/name` with mode 0755.
pub fn write_executable(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// Session running `body` under `/bin/sh -c`, injecting `script`.
pub fn shell_session(body: &str, script: &str, timeout: Duration) -> SessionConfig {
    SessionConfig::new("/bin/sh", script, timeout).with_args(["-c", body])
}

/// Build step that records its invocations and optionally fails with a code.
#[derive(Debug, Default)]
pub struct ScriptedBuild {
    fail_with: Option<i32>,
    runs: Cell<usize>,
}

impl ScriptedBuild {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing(code: i32) -> Self {
        Self {
            fail_with: Some(code),
            runs: Cell::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.get()
    }
}

impl BuildStep for ScriptedBuild {
    fn run(&self) -> Result<(), BuildFailure> {
        self.runs.set(self.runs.get() + 1);
        match self.fail_with {
            Some(code) => Err(BuildFailure::Status {
                script: PathBuf::from("scripted-build"),
                code: Some(code),
            }),
            None => Ok(()),
        }
    }
}
