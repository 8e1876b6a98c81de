use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::Error,
    types::{duration_serde, Language, ResourceLimits},
    Result,
};

/// Runtime configuration for the execution service.
///
/// Every field has a default, so a TOML file only needs the keys it overrides:
///
/// ```toml
/// scratch_dir = "/var/lib/code-runner"
/// timeout_secs = 8
///
/// [images]
/// python = "python:3.12-slim"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shared directory holding per-job source directories
    pub scratch_dir: PathBuf,

    /// Wall-clock budget per job, shared by compile and run steps
    #[serde(rename = "timeout_secs", with = "duration_serde")]
    pub timeout: Duration,

    /// Minimum interval between two scheduled backend probes
    #[serde(rename = "probe_cooldown_secs", with = "duration_serde")]
    pub probe_cooldown: Duration,

    /// Budget for each external command run by the probe
    #[serde(rename = "probe_timeout_secs", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Container CLI binary (`docker`, `podman`, ...)
    pub container_runtime: String,

    /// Image overrides keyed by language identifier
    pub images: HashMap<String, String>,

    /// Run containers with `--network none`
    pub disable_container_network: bool,

    /// Re-run jobs on host toolchains when the container backend is unreachable
    pub local_fallback: bool,

    /// Per-stream capture cap; anything beyond is drained and dropped
    pub max_output_bytes: usize,

    /// Admission cap; `None` runs every request immediately
    pub max_concurrent_executions: Option<usize>,

    pub limits: ResourceLimits,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("code-runner"),
            timeout: Duration::from_secs(8),
            probe_cooldown: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            container_runtime: "docker".to_string(),
            images: HashMap::new(),
            disable_container_network: true,
            local_fallback: true,
            max_output_bytes: 1024 * 1024,
            max_concurrent_executions: None,
            limits: ResourceLimits::default(),
        }
    }
}

impl RunnerConfig {
    /// Load a TOML configuration file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: RunnerConfig =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::Config(
                "probe timeout must be greater than zero".into(),
            ));
        }
        if self.container_runtime.trim().is_empty() {
            return Err(Error::Config("container runtime must not be empty".into()));
        }
        if self.max_concurrent_executions == Some(0) {
            return Err(Error::Config(
                "max_concurrent_executions must be at least 1".into(),
            ));
        }
        for key in self.images.keys() {
            key.parse::<Language>()
                .map_err(|_| Error::Config(format!("image override for unknown language: {}", key)))?;
        }
        Ok(())
    }

    /// Configured image override for a language, if any
    pub fn image_override(&self, language: Language) -> Option<&str> {
        self.images.get(language.as_str()).map(String::as_str)
    }

    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_cooldown(mut self, cooldown: Duration) -> Self {
        self.probe_cooldown = cooldown;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_container_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.container_runtime = runtime.into();
        self
    }

    pub fn with_image(mut self, language: Language, image: impl Into<String>) -> Self {
        self.images.insert(language.as_str().to_string(), image.into());
        self
    }

    pub fn with_local_fallback(mut self, enabled: bool) -> Self {
        self.local_fallback = enabled;
        self
    }

    pub fn with_max_concurrent_executions(mut self, max: Option<usize>) -> Self {
        self.max_concurrent_executions = max;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}
