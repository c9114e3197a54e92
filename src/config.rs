//! Pipeline configuration
//!
//! Loaded once from YAML at startup and validated before any request is
//! made. Every section is optional:
//!
//! ```yaml
//! api:
//!   endpoint: "https://api.github.com"
//!   token: "ghp_..."
//!   timeout_secs: 30
//! rate_limit:
//!   max_requests: 5000
//!   window_secs: 3600
//!   burst_size: 10
//! collector:
//!   page_size: 100
//!   fan_out: 4
//! storage:
//!   kind: duckdb
//!   path: "./usage.duckdb"
//! ```

use crate::collector::CollectorConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig, GITHUB_API_VERSION};
use crate::store::{DomainStore, DuckDbStore, MemoryStore, RawStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Usage API access
    #[serde(default)]
    pub api: ApiConfig,

    /// Outbound request budget
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,

    /// Paging and endpoint templates
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Where raw pages and usage rows live
    #[serde(default)]
    pub storage: StorageConfig,
}

impl PipelineConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the API token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api.token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;

        if self.rate_limit.max_requests == 0 {
            return Err(Error::invalid_value("rate_limit.max_requests", "must be > 0"));
        }
        if self.rate_limit.window.is_zero() {
            return Err(Error::invalid_value("rate_limit.window_secs", "must be > 0"));
        }

        self.collector.validate()?;
        self.storage.validate()
    }
}

// ============================================================================
// API
// ============================================================================

/// Usage API connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.github.com`
    pub endpoint: String,

    /// Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Value of the `X-GitHub-Api-Version` header
    pub api_version: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.github.com".to_string(),
            token: None,
            api_version: GITHUB_API_VERSION.to_string(),
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl ApiConfig {
    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "api.endpoint",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("api.timeout_secs", "must be > 0"));
        }
        if self.api_version.trim().is_empty() {
            return Err(Error::invalid_value("api.api_version", "must not be empty"));
        }
        Ok(())
    }

    /// HTTP client settings for this API
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.endpoint.as_str())
            .timeout(Duration::from_secs(self.timeout_secs))
            .github_headers(self.api_version.as_str());
        if let Some(token) = &self.token {
            builder = builder.token(token.as_str());
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        builder.build()
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Process memory, lost on exit
    #[default]
    Memory,
    /// DuckDB database file
    Duckdb,
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Database file, required for `duckdb`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.kind == StorageKind::Duckdb && self.path.is_none() {
            return Err(Error::missing_field("storage.path"));
        }
        Ok(())
    }

    /// Open the configured backend as a (raw, domain) store pair
    pub fn open(&self) -> Result<(Arc<dyn RawStore>, Arc<dyn DomainStore>)> {
        match (self.kind, &self.path) {
            (StorageKind::Memory, _) => Ok(pair(Arc::new(MemoryStore::new()))),
            (StorageKind::Duckdb, Some(path)) => Ok(pair(Arc::new(DuckDbStore::open(path)?))),
            (StorageKind::Duckdb, None) => Err(Error::missing_field("storage.path")),
        }
    }
}

fn pair<S>(store: Arc<S>) -> (Arc<dyn RawStore>, Arc<dyn DomainStore>)
where
    S: RawStore + DomainStore + 'static,
{
    let raw: Arc<dyn RawStore> = store.clone();
    (raw, store)
}
