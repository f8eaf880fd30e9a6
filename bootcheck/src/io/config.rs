//! Harness configuration resolved from the environment.
//!
//! Every knob is a named environment variable with a default. Values are read
//! once at startup into [`HarnessConfig`]; nothing reads the environment after
//! that. [`SessionConfig`] is the immutable per-session view handed to the
//! launcher and the pump.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::watcher::{DEFAULT_WINDOW_CHUNKS, ReadinessMarker};

/// Emulator binary name looked up under candidate build dirs and on `PATH`.
pub const EMULATOR_BINARY: &str = "qemu-system-linx64";

/// Emulator build directories under `QEMU_ROOT`, in default preference order.
pub const DEFAULT_EMULATOR_PREFERENCE: &[&str] = &["build", "build-tci"];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_DISK_MB: u64 = 64;

const TRUTHY: &[&str] = &["1", "true", "yes"];

/// Run-wide settings. Scenario-specific values (`APPEND`, `TIMEOUT`,
/// `SCRIPT`) stay optional here and fall back to the scenario's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// `LINUX_ROOT`: tree root that anchors the other defaults.
    pub linux_root: PathBuf,
    /// `O`: build output directory.
    pub build_dir: PathBuf,
    /// `QEMU`: explicit emulator path; skips candidate discovery.
    pub emulator: Option<PathBuf>,
    /// `QEMU_ROOT`: parent of the emulator build directories.
    pub emulator_root: PathBuf,
    /// `KERNEL`
    pub kernel: PathBuf,
    /// `INITRD`
    pub initrd: PathBuf,
    /// `DISK_IMG`
    pub disk_image: PathBuf,
    /// `DISK_MB`: explicit size; scenarios supply their own default.
    pub disk_mb: Option<u64>,
    /// `MEM`
    pub memory: String,
    /// `SMP`
    pub cpus: String,
    /// `APPEND`
    pub append: Option<String>,
    /// `TIMEOUT` in seconds.
    pub timeout: Option<Duration>,
    /// `SCRIPT`
    pub script: Option<String>,
    /// `SKIP_BUILD`
    pub skip_build: bool,
    /// `BUILD_SCRIPT`
    pub build_script: PathBuf,
    /// `BUILD_TIMEOUT` in seconds.
    pub build_timeout: Duration,
}

impl HarnessConfig {
    /// Resolve from the process environment, anchored at the current directory.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("resolve current directory")?;
        Self::resolve(|key| std::env::var(key).ok(), &cwd)
    }

    /// Resolve from an arbitrary lookup. Empty values count as unset.
    pub fn resolve<F>(lookup: F, cwd: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let linux_root = path_or("LINUX_ROOT", cwd.to_path_buf());
        let build_dir = path_or("O", linux_root.join("build-linx-fixed"));
        let emulator_root = match get("QEMU_ROOT") {
            Some(root) => PathBuf::from(root),
            None => get("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.to_path_buf())
                .join("qemu"),
        };

        let cfg = Self {
            emulator: get("QEMU").map(PathBuf::from),
            emulator_root,
            kernel: path_or("KERNEL", build_dir.join("vmlinux")),
            initrd: path_or(
                "INITRD",
                build_dir.join("linx-initramfs").join("initramfs.cpio"),
            ),
            disk_image: path_or("DISK_IMG", build_dir.join("linx-disk-smoke.img")),
            disk_mb: get("DISK_MB")
                .map(|raw| parse_positive("DISK_MB", &raw))
                .transpose()?,
            memory: get("MEM").unwrap_or_else(|| "512M".to_string()),
            cpus: get("SMP").unwrap_or_else(|| "1".to_string()),
            append: get("APPEND"),
            timeout: get("TIMEOUT")
                .map(|raw| parse_positive("TIMEOUT", &raw).map(Duration::from_secs))
                .transpose()?,
            script: lookup("SCRIPT").filter(|value| !value.is_empty()),
            skip_build: get("SKIP_BUILD")
                .is_some_and(|value| TRUTHY.contains(&value.trim().to_ascii_lowercase().as_str())),
            build_script: path_or(
                "BUILD_SCRIPT",
                linux_root
                    .join("tools")
                    .join("linxisa")
                    .join("initramfs")
                    .join("build.sh"),
            ),
            build_timeout: get("BUILD_TIMEOUT")
                .map(|raw| parse_positive("BUILD_TIMEOUT", &raw).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(DEFAULT_BUILD_TIMEOUT),
            linux_root,
            build_dir,
        };
        debug!(?cfg, "harness config resolved");
        Ok(cfg)
    }

    /// Emulator to launch, given build directories in preference order.
    ///
    /// An explicit `QEMU` wins. Otherwise the first existing candidate under
    /// `QEMU_ROOT`, then a `PATH` lookup, then the first candidate as-is so
    /// the launch error names a concrete path.
    pub fn resolve_emulator(&self, preference: &[String]) -> PathBuf {
        if let Some(explicit) = &self.emulator {
            return explicit.clone();
        }
        let candidates: Vec<PathBuf> = preference
            .iter()
            .map(|dir| self.emulator_root.join(dir).join(EMULATOR_BINARY))
            .collect();
        if let Some(found) = candidates.iter().find(|candidate| candidate.exists()) {
            return found.clone();
        }
        if let Ok(on_path) = which::which(EMULATOR_BINARY) {
            return on_path;
        }
        candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| PathBuf::from(EMULATOR_BINARY))
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))?;
    if value == 0 {
        bail!("{key} must be > 0");
    }
    Ok(value)
}

/// Everything needed to run one console session. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Sent verbatim, in one write, once the readiness marker is seen.
    pub script: String,
    pub timeout: Duration,
    pub readiness: ReadinessMarker,
    /// Upper bound on a single readiness wait; bounds deadline overshoot.
    pub poll_interval: Duration,
    /// Trailing chunks scanned for the readiness marker.
    pub window_chunks: usize,
}

impl SessionConfig {
    pub fn new(program: impl Into<PathBuf>, script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            script: script.into(),
            timeout,
            readiness: ReadinessMarker::new("# "),
            poll_interval: DEFAULT_POLL_INTERVAL,
            window_chunks: DEFAULT_WINDOW_CHUNKS,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessMarker) -> Self {
        self.readiness = readiness;
        self
    }

    /// Shell-quoted command line, suitable for copy-paste reproduction.
    pub fn command_line(&self) -> String {
        let mut words = vec![self.program.to_string_lossy().into_owned()];
        words.extend(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        shell_words::join(words)
    }
}
