//! Daily usage metrics
//!
//! [`UsageItem`] mirrors one element of the API's page array;
//! [`UsageRecord`] is the normalized domain row derived from it.

use super::breakdown::{Breakdown, BreakdownItem};
use crate::scope::{ScopeFingerprint, DAY_FORMAT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One day of usage as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageItem {
    /// `YYYY-MM-DD`, required
    pub day: String,
    #[serde(default)]
    pub total_seats: Option<i64>,
    #[serde(default)]
    pub total_active_users: Option<i64>,
    #[serde(default)]
    pub total_engaged_users: Option<i64>,
    #[serde(default)]
    pub total_suggestions_count: Option<i64>,
    #[serde(default)]
    pub total_acceptances_count: Option<i64>,
    #[serde(default)]
    pub total_lines_suggested: Option<i64>,
    #[serde(default)]
    pub total_lines_accepted: Option<i64>,
    #[serde(default)]
    pub total_active_users_chat: Option<i64>,
    #[serde(default)]
    pub total_active_chat_sessions: Option<i64>,
    #[serde(default)]
    pub breakdown: Option<Vec<BreakdownItem>>,
}

/// Why a single item was dropped during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The item did not match the expected shape (missing `day`, wrong types)
    Decode(String),
    /// `day` was present but not a valid `YYYY-MM-DD` date
    InvalidDay { value: String, message: String },
    /// A summed metric does not fit in an `i64`
    Overflow { field: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(message) => write!(f, "undecodable item: {message}"),
            Self::InvalidDay { value, message } => {
                write!(f, "invalid day '{value}': {message}")
            }
            Self::Overflow { field } => write!(f, "{field} overflows i64"),
        }
    }
}

/// Identity of a usage row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub connection_id: u64,
    pub resource_id: String,
    pub day: NaiveDate,
}

/// Normalized daily usage row, unique per (connection, resource, day)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub connection_id: u64,
    pub resource_id: String,
    pub day: NaiveDate,

    pub total_seats: i64,
    pub total_active_users: i64,
    pub total_engaged_users: i64,

    pub total_suggestions_count: i64,
    pub total_acceptances_count: i64,
    pub total_lines_suggested: i64,
    pub total_lines_accepted: i64,
    pub total_active_users_chat: i64,
    pub total_active_chat_sessions: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_breakdown: Option<Breakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_breakdown: Option<Breakdown>,
}

impl UsageRecord {
    /// A row with all metrics at zero
    pub fn empty(fingerprint: &ScopeFingerprint, day: NaiveDate) -> Self {
        Self {
            connection_id: fingerprint.connection_id,
            resource_id: fingerprint.resource_id.clone(),
            day,
            total_seats: 0,
            total_active_users: 0,
            total_engaged_users: 0,
            total_suggestions_count: 0,
            total_acceptances_count: 0,
            total_lines_suggested: 0,
            total_lines_accepted: 0,
            total_active_users_chat: 0,
            total_active_chat_sessions: 0,
            language_breakdown: None,
            editor_breakdown: None,
        }
    }

    /// Map a parsed API item onto a row for the given scope
    pub fn from_item(
        fingerprint: &ScopeFingerprint,
        item: UsageItem,
    ) -> std::result::Result<Self, SkipReason> {
        let day = NaiveDate::parse_from_str(item.day.trim(), DAY_FORMAT).map_err(|e| {
            SkipReason::InvalidDay {
                value: item.day.clone(),
                message: e.to_string(),
            }
        })?;

        let (language_breakdown, editor_breakdown) =
            match item.breakdown.as_deref().map(Breakdown::split).transpose()?.flatten() {
                Some((languages, editors)) => (Some(languages), Some(editors)),
                None => (None, None),
            };

        Ok(Self {
            total_seats: item.total_seats.unwrap_or(0),
            total_active_users: item.total_active_users.unwrap_or(0),
            total_engaged_users: item.total_engaged_users.unwrap_or(0),
            total_suggestions_count: item.total_suggestions_count.unwrap_or(0),
            total_acceptances_count: item.total_acceptances_count.unwrap_or(0),
            total_lines_suggested: item.total_lines_suggested.unwrap_or(0),
            total_lines_accepted: item.total_lines_accepted.unwrap_or(0),
            total_active_users_chat: item.total_active_users_chat.unwrap_or(0),
            total_active_chat_sessions: item.total_active_chat_sessions.unwrap_or(0),
            language_breakdown,
            editor_breakdown,
            ..Self::empty(fingerprint, day)
        })
    }

    /// Decode one raw JSON element and map it
    pub fn from_value(
        fingerprint: &ScopeFingerprint,
        value: Value,
    ) -> std::result::Result<Self, SkipReason> {
        let item: UsageItem =
            serde_json::from_value(value).map_err(|e| SkipReason::Decode(e.to_string()))?;
        Self::from_item(fingerprint, item)
    }

    pub fn key(&self) -> UsageKey {
        UsageKey {
            connection_id: self.connection_id,
            resource_id: self.resource_id.clone(),
            day: self.day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BreakdownDimension;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn acme() -> ScopeFingerprint {
        ScopeFingerprint::new(1, "acme")
    }

    #[test]
    fn test_from_value_maps_fields() {
        let record = UsageRecord::from_value(
            &acme(),
            json!({
                "day": "2024-01-02",
                "total_seats": 10,
                "total_active_users": 4,
                "total_engaged_users": 3,
                "total_suggestions_count": 120,
                "total_acceptances_count": 40,
                "total_lines_suggested": 300,
                "total_lines_accepted": 90,
                "total_active_users_chat": 2,
                "total_active_chat_sessions": 5
            }),
        )
        .unwrap();

        assert_eq!(record.connection_id, 1);
        assert_eq!(record.resource_id, "acme");
        assert_eq!(record.day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(record.total_seats, 10);
        assert_eq!(record.total_active_users, 4);
        assert_eq!(record.total_engaged_users, 3);
        assert_eq!(record.total_suggestions_count, 120);
        assert_eq!(record.total_acceptances_count, 40);
        assert_eq!(record.total_lines_suggested, 300);
        assert_eq!(record.total_lines_accepted, 90);
        assert_eq!(record.total_active_users_chat, 2);
        assert_eq!(record.total_active_chat_sessions, 5);
        assert!(record.language_breakdown.is_none());
        assert!(record.editor_breakdown.is_none());
    }

    #[test]
    fn test_missing_metrics_default_to_zero() {
        let record = UsageRecord::from_value(&acme(), json!({"day": "2024-01-02"})).unwrap();
        assert_eq!(
            record,
            UsageRecord::empty(&acme(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_breakdown_is_split() {
        let record = UsageRecord::from_value(
            &acme(),
            json!({
                "day": "2024-01-02",
                "breakdown": [
                    {"language": "rust", "editor": "vscode", "suggestions_count": 5},
                    {"language": "go", "editor": "vscode", "suggestions_count": 1}
                ]
            }),
        )
        .unwrap();

        let languages = record.language_breakdown.unwrap();
        let editors = record.editor_breakdown.unwrap();
        assert_eq!(languages.dimension, BreakdownDimension::Language);
        assert_eq!(languages.entries.len(), 2);
        assert_eq!(editors.entries.len(), 1);
        assert_eq!(editors.get("vscode").unwrap().suggestions_count, 6);
    }

    #[test]
    fn test_missing_day_is_skipped() {
        let reason = UsageRecord::from_value(&acme(), json!({"total_seats": 3})).unwrap_err();
        assert!(matches!(reason, SkipReason::Decode(_)));
        assert!(reason.to_string().contains("day"));
    }

    #[test]
    fn test_bad_day_is_skipped() {
        let reason = UsageRecord::from_value(&acme(), json!({"day": "02/01/2024"})).unwrap_err();
        assert!(matches!(reason, SkipReason::InvalidDay { .. }));
    }

    #[test]
    fn test_wrong_metric_type_is_skipped() {
        let reason = UsageRecord::from_value(
            &acme(),
            json!({"day": "2024-01-02", "total_seats": "ten"}),
        )
        .unwrap_err();
        assert!(matches!(reason, SkipReason::Decode(_)));
    }

    #[test]
    fn test_key() {
        let record = UsageRecord::from_value(&acme(), json!({"day": "2024-01-02"})).unwrap();
        let key = record.key();
        assert_eq!(key.connection_id, 1);
        assert_eq!(key.resource_id, "acme");
        assert_eq!(key.day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }
}
