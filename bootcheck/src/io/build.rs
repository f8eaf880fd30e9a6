//! Build step run before a session.
//!
//! The build itself is opaque: one command, pass or fail. [`BuildStep`] keeps
//! orchestration independent of how the artifacts are produced, and lets tests
//! substitute scripted builds.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::config::HarnessConfig;

#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error("spawn build script {}: {source}", script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("build script {} exited with {}", script.display(), describe_code(*code))]
    Status { script: PathBuf, code: Option<i32> },
    #[error("build script {} timed out after {}s", script.display(), timeout.as_secs())]
    TimedOut { script: PathBuf, timeout: Duration },
    #[error("wait for build script {}: {source}", script.display())]
    Wait {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildFailure {
    /// Status the harness exits with: the build's own code when it has one.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildFailure::Status {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

pub trait BuildStep {
    fn run(&self) -> Result<(), BuildFailure>;
}

/// Runs the build script with inherited stdio, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct ScriptBuild {
    pub script: PathBuf,
    pub timeout: Duration,
}

impl BuildStep for ScriptBuild {
    #[instrument(
        skip_all,
        fields(script = %self.script.display(), timeout_secs = self.timeout.as_secs())
    )]
    fn run(&self) -> Result<(), BuildFailure> {
        info!("running build step");
        let mut child = Command::new(&self.script)
            .spawn()
            .map_err(|source| BuildFailure::Spawn {
                script: self.script.clone(),
                source,
            })?;

        let waited = child
            .wait_timeout(self.timeout)
            .map_err(|source| BuildFailure::Wait {
                script: self.script.clone(),
                source,
            })?;
        let status = match waited {
            Some(status) => status,
            None => {
                warn!("build step timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(BuildFailure::TimedOut {
                    script: self.script.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            return Err(BuildFailure::Status {
                script: self.script.clone(),
                code: status.code(),
            });
        }
        info!("build step finished");
        Ok(())
    }
}

/// Used when `SKIP_BUILD` is set, or once a runner has already built.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipBuild;

impl BuildStep for SkipBuild {
    fn run(&self) -> Result<(), BuildFailure> {
        Ok(())
    }
}

/// The build step selected by configuration.
pub fn configured_build(cfg: &HarnessConfig) -> Box<dyn BuildStep> {
    if cfg.skip_build {
        Box::new(SkipBuild)
    } else {
        Box::new(ScriptBuild {
            script: cfg.build_script.clone(),
            timeout: cfg.build_timeout,
        })
    }
}
