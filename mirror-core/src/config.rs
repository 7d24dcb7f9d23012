//! Run configuration.
//!
//! # Sources, lowest to highest precedence
//!
//! 1. Built-in defaults ([`MirrorConfig::default`]).
//! 2. A YAML file: `--config <path>`, or `mirror.yaml` in the working
//!    directory when present.
//! 3. CLI flags / `MIRROR_*` environment variables (applied by the CLI).
//!
//! ```yaml
//! target:
//!   url: https://grafana.eu2.example.com/grafana
//!   token: glsa_xxx
//! archive_dir: ./archive
//! batch_size: 10
//! max_parallel: 5
//! consistency:
//!   poll_interval_ms: 1000
//!   max_polls: 3
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name probed in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mirror.yaml";

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_PARALLEL: usize = 5;
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 90.0;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Connection details for the store being reconciled.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How long to wait for a deleted uid to disappear before recreating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_polls: 3,
        }
    }
}

impl ConsistencyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Root of the mirror YAML config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub target: TargetConfig,
    pub archive_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub batch_size: usize,
    pub max_parallel: usize,
    /// Minimum success rate (percent) for a run with failures to still pass.
    pub success_threshold: f64,
    pub consistency: ConsistencyConfig,
    pub page_size: usize,
    pub request_timeout_secs: u64,
    /// Permit a run whose archive is empty to delete everything in the target.
    pub allow_empty_source: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            archive_dir: PathBuf::from("archive"),
            outputs_dir: PathBuf::from("outputs"),
            batch_size: DEFAULT_BATCH_SIZE,
            max_parallel: DEFAULT_MAX_PARALLEL,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            consistency: ConsistencyConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
            allow_empty_source: false,
        }
    }
}

impl MirrorConfig {
    /// Check ranges and required values. Called once, after all overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.max_parallel == 0 {
            return Err(ConfigError::invalid("max_parallel", "must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::invalid("page_size", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.success_threshold) {
            return Err(ConfigError::invalid(
                "success_threshold",
                format!("{} is outside 0..=100", self.success_threshold),
            ));
        }
        self.target_url()?;
        self.target_token()?;
        Ok(())
    }

    pub fn target_url(&self) -> Result<&str, ConfigError> {
        match self.target.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ConfigError::invalid(
                "target.url",
                "required (set it in the config file, --target-url or MIRROR_TARGET_URL)",
            )),
        }
    }

    pub fn target_token(&self) -> Result<&str, ConfigError> {
        match self.target.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ConfigError::invalid(
                "target.token",
                "required (set it in the config file, --target-token or MIRROR_TARGET_TOKEN)",
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load a config file from `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path +
/// line context) if malformed YAML. Missing keys take their defaults.
pub fn load_at(path: &Path) -> Result<MirrorConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(MirrorConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `explicit` when given, else `<dir>/mirror.yaml` when it exists, else defaults.
pub fn discover_at(dir: &Path, explicit: Option<&Path>) -> Result<MirrorConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_at(path);
    }
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if candidate.exists() {
        return load_at(&candidate);
    }
    Ok(MirrorConfig::default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
