//! Scenario file parsing and validation.
//!
//! A scenario is a TOML document naming the script to type into the console
//! and the expectations its transcript must meet. The built-in scenarios live
//! in `bootcheck/scenarios/` and are compiled in.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::core::excerpt::ExcerptFilter;
use crate::core::section::SectionRule;
use crate::core::verifier::Expectation;
use crate::io::config::{DEFAULT_DISK_MB, DEFAULT_EMULATOR_PREFERENCE};

const BUILTIN: &[(&str, &str)] = &[
    ("smoke", include_str!("../scenarios/smoke.toml")),
    ("full-boot", include_str!("../scenarios/full-boot.toml")),
    ("virtio-disk", include_str!("../scenarios/virtio-disk.toml")),
];

/// A parsed scenario file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub scenario: ScenarioMeta,
    /// Present when the scenario attaches a provisioned disk image.
    #[serde(default)]
    pub disk: Option<DiskSpec>,
    #[serde(default)]
    pub excerpt: ExcerptFilter,
    #[serde(default)]
    pub expect: ExpectSpec,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    /// Human name used in diagnostics ("smoke check failed; ...").
    pub label: String,
    /// Default session deadline; `TIMEOUT` overrides it.
    pub timeout_secs: u64,
    /// Line budget for the failure tail and the success excerpt.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
    /// Console prompt; readiness marker and section terminator.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Default boot parameters; `APPEND` overrides them.
    #[serde(default = "default_append")]
    pub append: String,
    /// Emulator build directories to try, in order.
    #[serde(default = "default_emulator_preference")]
    pub emulator_preference: Vec<String>,
    /// Default console script; `SCRIPT` overrides it.
    pub script: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiskSpec {
    /// Default image size; `DISK_MB` overrides it.
    #[serde(default = "default_disk_mb")]
    pub size_mb: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExpectSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default, rename = "section")]
    pub sections: Vec<SectionRule>,
}

fn default_tail_lines() -> usize {
    200
}

fn default_prompt() -> String {
    "# ".to_string()
}

fn default_append() -> String {
    "lpj=1000000 loglevel=1 console=ttyS0".to_string()
}

fn default_emulator_preference() -> Vec<String> {
    DEFAULT_EMULATOR_PREFERENCE
        .iter()
        .map(|dir| dir.to_string())
        .collect()
}

fn default_disk_mb() -> u64 {
    DEFAULT_DISK_MB
}

impl ScenarioFile {
    /// Load and validate a scenario file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load scenario {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let scenario: ScenarioFile = toml::from_str(contents).context("parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn id(&self) -> &str {
        &self.scenario.id
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario.timeout_secs)
    }

    /// Flattened expectation list: required, forbidden, then section rules.
    pub fn expectations(&self) -> Vec<Expectation> {
        let required = self.expect.required.iter().cloned().map(Expectation::Required);
        let forbidden = self
            .expect
            .forbidden
            .iter()
            .cloned()
            .map(Expectation::Forbidden);
        let sections = self.expect.sections.iter().cloned().map(Expectation::Section);
        required.chain(forbidden).chain(sections).collect()
    }

    fn validate(&self) -> Result<()> {
        let meta = &self.scenario;
        validate_id(&meta.id)?;
        if meta.label.trim().is_empty() {
            bail!("scenario.label must be non-empty");
        }
        if meta.timeout_secs == 0 {
            bail!("scenario.timeout_secs must be > 0");
        }
        if meta.tail_lines == 0 {
            bail!("scenario.tail_lines must be > 0");
        }
        if meta.prompt.is_empty() {
            bail!("scenario.prompt must be non-empty");
        }
        if meta.script.trim().is_empty() {
            bail!("scenario.script must be non-empty");
        }
        if let Some(disk) = &self.disk
            && disk.size_mb == 0
        {
            bail!("disk.size_mb must be > 0");
        }
        for needle in self.expect.required.iter().chain(&self.expect.forbidden) {
            if needle.is_empty() {
                bail!("expect.required/forbidden entries must be non-empty");
            }
        }
        for (index, rule) in self.expect.sections.iter().enumerate() {
            if rule.marker.trim().is_empty() {
                bail!("expect.section[{index}].marker must be non-empty");
            }
        }
        Ok(())
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("scenario.id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("scenario.id must use [a-z0-9_-] only");
    }
    Ok(())
}

/// Ids of the compiled-in scenarios, in run order.
pub fn builtin_ids() -> Vec<&'static str> {
    BUILTIN.iter().map(|(id, _)| *id).collect()
}

pub fn builtin(id: &str) -> Result<ScenarioFile> {
    let (_, contents) = BUILTIN
        .iter()
        .find(|(builtin_id, _)| *builtin_id == id)
        .ok_or_else(|| {
            anyhow!(
                "unknown scenario {id:?} (built-in: {})",
                builtin_ids().join(", ")
            )
        })?;
    ScenarioFile::parse_str(contents).with_context(|| format!("built-in scenario {id}"))
}

/// A built-in id, or else a path to a scenario file.
pub fn resolve(name: &str) -> Result<ScenarioFile> {
    if BUILTIN.iter().any(|(id, _)| *id == name) {
        return builtin(name);
    }
    let path = Path::new(name);
    if path.extension().and_then(|ext| ext.to_str()) == Some("toml") || path.exists() {
        return ScenarioFile::load(path);
    }
    builtin(name)
}
