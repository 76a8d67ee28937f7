//! Source adapter contract, per-board implementations and the source
//! registry/config layer.

pub mod normalize;

mod adzuna;
mod boards;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jobmesh_core::{Job, JobSearchQuery, JobSource};
use jobmesh_net::{FetchError, RateLimitConfig};
use serde::Deserialize;
use thiserror::Error;

pub use adzuna::{AdzunaAdapter, AdzunaCredentials};
pub use boards::{glassdoor_adapter, indeed_adapter, linkedin_adapter, SyntheticBoardAdapter};
pub use normalize::{normalize_record, NormalizeError, RawJobRecord};

pub const CRATE_NAME: &str = "jobmesh-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Fail-fast rejection from the per-source budget; never retried.
    #[error("rate limit exceeded for {board}")]
    RateLimited { board: JobSource },
    /// Transport failure surviving the retry cap.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Message(String),
}

/// One job board. Each implementation owns its rate limiter and retry
/// policy and normalizes its raw payloads into canonical [`Job`]s.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> JobSource;

    /// Fetch and normalize listings for a query. Unconfigured sources and
    /// zero matches both yield an empty list, not an error.
    async fn search(&self, query: &JobSearchQuery) -> Result<Vec<Job>, AdapterError>;

    /// Fetch one job by its board-native id; `Ok(None)` when unavailable.
    async fn get_job_details(&self, external_id: &str) -> Result<Option<Job>, AdapterError>;
}

/// Per-source entry in the registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub source: JobSource,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
    #[serde(default)]
    pub requests_per_day: Option<u32>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl SourceSettings {
    pub fn with_defaults(source: JobSource) -> Self {
        Self {
            source,
            enabled: true,
            requests_per_minute: None,
            requests_per_day: None,
            app_id: None,
            app_key: None,
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            requests_per_day: self.requests_per_day.unwrap_or(defaults.requests_per_day),
        }
    }
}

/// Which boards to query and with what budgets/credentials. Loaded from a
/// `sources.yaml` next to the deployment, with env-var fallbacks for
/// credentials so nothing ambient is read inside adapter logic.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceSettings>,
}

impl SourceRegistry {
    /// Every known board, enabled with default budgets.
    pub fn all_enabled() -> Self {
        Self {
            sources: JobSource::ALL
                .into_iter()
                .map(SourceSettings::with_defaults)
                .collect(),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Instantiate one adapter per enabled registry entry.
pub fn build_adapters(registry: &SourceRegistry) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for settings in &registry.sources {
        if !settings.enabled {
            continue;
        }
        let limit = settings.rate_limit();
        match settings.source {
            JobSource::LinkedIn => adapters.push(Arc::new(linkedin_adapter(limit))),
            JobSource::Indeed => adapters.push(Arc::new(indeed_adapter(limit))),
            JobSource::Glassdoor => adapters.push(Arc::new(glassdoor_adapter(limit))),
            JobSource::Adzuna => {
                let credentials = AdzunaCredentials::from_settings_or_env(settings);
                adapters.push(Arc::new(AdzunaAdapter::new(credentials, limit)?));
            }
        }
    }
    Ok(adapters)
}
