//! Collector configuration and statistics

use crate::error::{Error, Result};
use crate::pagination::PagerConfig;
use crate::template::extract_variables;
use serde::{Deserialize, Serialize};

/// Default organization endpoint
pub const DEFAULT_ORG_PATH: &str = "/orgs/{{ resource_id }}/copilot/usage";

/// Default enterprise endpoint
pub const DEFAULT_ENTERPRISE_PATH: &str = "/enterprises/{{ enterprise }}/copilot/usage";

/// Configuration for a collection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Pages in flight at once; 1 fetches strictly in sequence
    pub fan_out: usize,
    /// Hard ceiling on pages per run
    pub max_pages: Option<u32>,
    /// Path template for organization scopes, may use `resource_id`
    pub org_path: String,
    /// Path template for enterprise scopes, may use `enterprise` and `resource_id`
    pub enterprise_path: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            fan_out: 1,
            max_pages: None,
            org_path: DEFAULT_ORG_PATH.to_string(),
            enterprise_path: DEFAULT_ENTERPRISE_PATH.to_string(),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Pager settings derived from this config
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            page_size: self.page_size,
            max_pages: self.max_pages,
            ..PagerConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::invalid_value("collector.page_size", "must be > 0"));
        }
        if self.fan_out == 0 {
            return Err(Error::invalid_value("collector.fan_out", "must be > 0"));
        }
        if self.max_pages == Some(0) {
            return Err(Error::invalid_value("collector.max_pages", "must be > 0"));
        }
        require_variable("collector.org_path", &self.org_path, "resource_id")?;
        require_variable("collector.enterprise_path", &self.enterprise_path, "enterprise")?;
        Ok(())
    }
}

fn require_variable(field: &str, template: &str, variable: &str) -> Result<()> {
    if extract_variables(template).iter().any(|v| v == variable) {
        Ok(())
    } else {
        Err(Error::invalid_value(
            field,
            format!("'{template}' must reference {{{{ {variable} }}}}"),
        ))
    }
}

/// Statistics for one collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectStats {
    /// Requests that returned a valid page, including discarded ones
    pub pages_fetched: u64,
    /// Raw pages upserted
    pub raw_records_written: u64,
    /// Items across the stored pages
    pub items_seen: u64,
    pub duration_ms: u64,
}
