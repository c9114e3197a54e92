//! Task scope and scope fingerprint
//!
//! A [`TaskScope`] is what the orchestrator hands to one collection +
//! extraction run. Its [`ScopeFingerprint`] partitions both stores so that
//! concurrent scopes never collide and re-runs overwrite instead of
//! duplicating.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used by the usage API and the `since` filter
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Partition key shared by the collector and the extractor
///
/// Equality is exact on both fields; `resource_id` comparison is
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeFingerprint {
    pub connection_id: u64,
    pub resource_id: String,
}

impl ScopeFingerprint {
    pub fn new(connection_id: u64, resource_id: impl Into<String>) -> Self {
        Self {
            connection_id,
            resource_id: resource_id.into(),
        }
    }

    /// Stable storage key, e.g. `{"connection_id":1,"resource_id":"acme"}`
    ///
    /// Field order follows the struct declaration, so the key survives
    /// process restarts.
    pub fn storage_key(&self) -> String {
        // serde_json escapes the string; the surrounding shape is fixed
        let resource = serde_json::Value::String(self.resource_id.clone());
        format!(
            "{{\"connection_id\":{},\"resource_id\":{}}}",
            self.connection_id, resource
        )
    }

    /// Parse a key produced by [`ScopeFingerprint::storage_key`]
    pub fn from_storage_key(key: &str) -> Result<Self> {
        serde_json::from_str(key)
            .map_err(|e| Error::store(format!("Invalid scope key '{key}': {e}")))
    }
}

impl fmt::Display for ScopeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection_id, self.resource_id)
    }
}

/// One unit of collection work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskScope {
    pub connection_id: u64,
    /// Organization name
    pub resource_id: String,
    /// When set, enterprise-level endpoints are queried instead
    pub enterprise_name: Option<String>,
    /// Only collect days on or after this date
    pub since: Option<NaiveDate>,
    pub scope_config_id: Option<u64>,
}

impl TaskScope {
    /// Create a scope for an organization
    pub fn new(connection_id: u64, resource_id: impl Into<String>) -> Self {
        Self {
            connection_id,
            resource_id: resource_id.into(),
            enterprise_name: None,
            since: None,
            scope_config_id: None,
        }
    }

    /// Query enterprise-level endpoints
    #[must_use]
    pub fn with_enterprise(mut self, enterprise: impl Into<String>) -> Self {
        self.enterprise_name = Some(enterprise.into());
        self
    }

    /// Restrict collection to days on or after `since`
    #[must_use]
    pub fn with_since(mut self, since: NaiveDate) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn with_scope_config(mut self, scope_config_id: u64) -> Self {
        self.scope_config_id = Some(scope_config_id);
        self
    }

    pub fn fingerprint(&self) -> ScopeFingerprint {
        ScopeFingerprint::new(self.connection_id, self.resource_id.clone())
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.connection_id == 0 {
            return Err(Error::invalid_value("connectionId", "must be non-zero"));
        }
        if self.resource_id.trim().is_empty() {
            return Err(Error::missing_field("organizationName"));
        }
        check_path_segment("organizationName", &self.resource_id)?;
        if let Some(enterprise) = &self.enterprise_name {
            if enterprise.trim().is_empty() {
                return Err(Error::invalid_value(
                    "enterpriseName",
                    "must not be empty when set",
                ));
            }
            check_path_segment("enterpriseName", enterprise)?;
        }
        Ok(())
    }

    /// Build and validate a scope from orchestrator-supplied options
    pub fn from_options(options: TaskOptions) -> Result<Self> {
        let since = options.since.as_deref().map(parse_since).transpose()?;
        let scope = Self {
            connection_id: options.connection_id,
            resource_id: options.organization_name,
            enterprise_name: options.enterprise_name,
            since,
            scope_config_id: options.scope_config_id,
        };
        scope.validate()?;
        Ok(scope)
    }

    /// Build and validate a scope from a JSON options object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let options: TaskOptions = serde_json::from_value(value)?;
        Self::from_options(options)
    }
}

/// Task options as supplied by the orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskOptions {
    pub connection_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_config_id: Option<u64>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

/// Names are substituted into the URL path, so they must stay one segment
fn check_path_segment(field: &str, value: &str) -> Result<()> {
    let forbidden = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    match value.chars().find(|&c| forbidden(c)) {
        Some(c) => Err(Error::invalid_value(
            field,
            format!("'{value}' contains {c:?}, not allowed in a path segment"),
        )),
        None => Ok(()),
    }
}

/// Parse a `since` filter given either as a day or a full timestamp
pub fn parse_since(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, DAY_FORMAT) {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.date_naive())
        .map_err(|e| Error::invalid_value("since", format!("'{value}': {e}")))
}
