//! Per-language and per-editor breakdowns
//!
//! The usage API reports one breakdown list per day whose entries carry both
//! a `language` and an `editor`. It is split here into two tagged
//! structures, one keyed by language and one keyed by editor, each summing
//! the metrics of every entry sharing a key.
//!
//! Both are stored as JSON text with a schema version so ad-hoc queries can
//! rely on the shape:
//!
//! ```json
//! {"schema_version":1,"dimension":"language","entries":[
//!   {"key":"rust","suggestions_count":10,"acceptances_count":4,
//!    "lines_suggested":20,"lines_accepted":8,"active_users":3}]}
//! ```

use super::usage::SkipReason;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current breakdown blob schema version
pub const BREAKDOWN_SCHEMA_VERSION: u32 = 1;

/// Key used when an entry does not name its language or editor
pub const UNKNOWN_KEY: &str = "unknown";

/// One breakdown entry as the API reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownItem {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub suggestions_count: Option<i64>,
    #[serde(default)]
    pub acceptances_count: Option<i64>,
    #[serde(default)]
    pub lines_suggested: Option<i64>,
    #[serde(default)]
    pub lines_accepted: Option<i64>,
    #[serde(default)]
    pub active_users: Option<i64>,
}

impl BreakdownItem {
    fn metrics(&self) -> BreakdownMetrics {
        BreakdownMetrics {
            suggestions_count: self.suggestions_count.unwrap_or(0),
            acceptances_count: self.acceptances_count.unwrap_or(0),
            lines_suggested: self.lines_suggested.unwrap_or(0),
            lines_accepted: self.lines_accepted.unwrap_or(0),
            active_users: self.active_users.unwrap_or(0),
        }
    }
}

/// Which attribute a breakdown is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownDimension {
    Language,
    Editor,
}

/// Summed metrics for one breakdown key
///
/// `active_users` is summed like the other counters, so a user active in two
/// editors counts twice; treat it as an upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownMetrics {
    pub suggestions_count: i64,
    pub acceptances_count: i64,
    pub lines_suggested: i64,
    pub lines_accepted: i64,
    pub active_users: i64,
}

impl BreakdownMetrics {
    /// Field-wise sum, naming the first field that overflows
    fn checked_add(&self, other: &Self) -> std::result::Result<Self, &'static str> {
        fn sum(a: i64, b: i64, field: &'static str) -> std::result::Result<i64, &'static str> {
            a.checked_add(b).ok_or(field)
        }
        Ok(Self {
            suggestions_count: sum(
                self.suggestions_count,
                other.suggestions_count,
                "suggestions_count",
            )?,
            acceptances_count: sum(
                self.acceptances_count,
                other.acceptances_count,
                "acceptances_count",
            )?,
            lines_suggested: sum(self.lines_suggested, other.lines_suggested, "lines_suggested")?,
            lines_accepted: sum(self.lines_accepted, other.lines_accepted, "lines_accepted")?,
            active_users: sum(self.active_users, other.active_users, "active_users")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub key: String,
    #[serde(flatten)]
    pub metrics: BreakdownMetrics,
}

/// Breakdown along a single dimension, entries sorted by key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub schema_version: u32,
    pub dimension: BreakdownDimension,
    pub entries: Vec<BreakdownEntry>,
}

impl Breakdown {
    /// Aggregate API entries along one dimension
    ///
    /// Fails with [`SkipReason::Overflow`] when a per-key sum leaves `i64`.
    pub fn aggregate(
        dimension: BreakdownDimension,
        items: &[BreakdownItem],
    ) -> std::result::Result<Self, SkipReason> {
        let mut totals: BTreeMap<String, BreakdownMetrics> = BTreeMap::new();

        for item in items {
            let key = match dimension {
                BreakdownDimension::Language => item.language.as_deref(),
                BreakdownDimension::Editor => item.editor.as_deref(),
            }
            .filter(|k| !k.is_empty())
            .unwrap_or(UNKNOWN_KEY);

            let total = totals.entry(key.to_string()).or_default();
            *total = total
                .checked_add(&item.metrics())
                .map_err(|field| SkipReason::Overflow {
                    field: format!("breakdown.{key}.{field}"),
                })?;
        }

        Ok(Self {
            schema_version: BREAKDOWN_SCHEMA_VERSION,
            dimension,
            entries: totals
                .into_iter()
                .map(|(key, metrics)| BreakdownEntry { key, metrics })
                .collect(),
        })
    }

    /// Split API entries into (language, editor) breakdowns
    ///
    /// Returns `Ok(None)` when there is nothing to break down.
    pub fn split(
        items: &[BreakdownItem],
    ) -> std::result::Result<Option<(Self, Self)>, SkipReason> {
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some((
            Self::aggregate(BreakdownDimension::Language, items)?,
            Self::aggregate(BreakdownDimension::Editor, items)?,
        )))
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&BreakdownMetrics> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.metrics)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
