pub mod plan;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use mirror_archive::ArchiveSource;
use mirror_core::{config, MirrorConfig};
use mirror_store::HttpStore;

/// Target and run settings shared by `sync` and `plan`.
///
/// Each flag overrides the matching key of the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// YAML config file (defaults to ./mirror.yaml when present).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Base url of the target tenant.
    #[arg(long, env = "MIRROR_TARGET_URL")]
    pub target_url: Option<String>,

    /// Bearer token for the target tenant.
    #[arg(long, env = "MIRROR_TARGET_TOKEN", hide_env_values = true)]
    pub target_token: Option<String>,

    /// Directory holding `folders/` and `dashboards/` exports.
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Directory for run reports.
    #[arg(long)]
    pub outputs_dir: Option<PathBuf>,

    /// Dashboards per batch.
    #[arg(long, env = "MIRROR_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Concurrent dashboard operations within a batch.
    #[arg(long, env = "MIRROR_MAX_PARALLEL")]
    pub max_parallel: Option<usize>,

    /// Minimum success rate (percent) for a run with failures to exit 0.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Allow an empty archive to delete every resource in the target.
    #[arg(long)]
    pub allow_empty_source: bool,
}

impl TargetArgs {
    /// Config file (or defaults) with flags applied, validated.
    pub fn resolve(&self) -> Result<MirrorConfig> {
        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let mut config = config::discover_at(&cwd, self.config.as_deref())
            .context("failed to load config")?;

        if let Some(url) = &self.target_url {
            config.target.url = Some(url.clone());
        }
        if let Some(token) = &self.target_token {
            config.target.token = Some(token.clone());
        }
        if let Some(dir) = &self.archive_dir {
            config.archive_dir = dir.clone();
        }
        if let Some(dir) = &self.outputs_dir {
            config.outputs_dir = dir.clone();
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.max_parallel {
            config.max_parallel = n;
        }
        if let Some(pct) = self.threshold {
            config.success_threshold = pct;
        }
        if self.allow_empty_source {
            config.allow_empty_source = true;
        }

        config.validate().context("invalid configuration")?;
        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }
}

/// HTTP client for the configured target.
pub fn open_store(config: &MirrorConfig) -> Result<Arc<HttpStore>> {
    let store = HttpStore::new(
        config.target_url()?,
        config.target_token()?,
        config.request_timeout(),
        config.page_size,
    )
    .context("failed to set up the target client")?;
    Ok(Arc::new(store))
}

pub fn open_archive(config: &MirrorConfig) -> Result<ArchiveSource> {
    ArchiveSource::open(&config.archive_dir).with_context(|| {
        format!(
            "failed to open archive at {}",
            config.archive_dir.display()
        )
    })
}
