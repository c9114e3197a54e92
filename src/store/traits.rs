//! Store traits and the raw record type

use crate::error::Result;
use crate::model::UsageRecord;
use crate::scope::ScopeFingerprint;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One API page as collected, unparsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub fingerprint: ScopeFingerprint,
    pub page_ordinal: u32,
    /// Response body, byte for byte
    pub payload: Bytes,
    pub ingested_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(fingerprint: ScopeFingerprint, page_ordinal: u32, payload: Bytes) -> Self {
        Self {
            fingerprint,
            page_ordinal,
            payload,
            ingested_at: Utc::now(),
        }
    }
}

/// Keyed storage of raw pages
///
/// `put` is an upsert on `(fingerprint, ordinal)`. Implementations must allow
/// concurrent upserts of distinct keys.
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Insert or replace the page stored under `(fingerprint, ordinal)`
    async fn put(&self, fingerprint: &ScopeFingerprint, ordinal: u32, payload: Bytes)
        -> Result<()>;

    /// Every page stored for `fingerprint`, in no guaranteed order
    async fn list_all(&self, fingerprint: &ScopeFingerprint) -> Result<Vec<RawRecord>>;

    /// Number of pages stored for `fingerprint`
    async fn count(&self, fingerprint: &ScopeFingerprint) -> Result<usize> {
        Ok(self.list_all(fingerprint).await?.len())
    }
}

/// Typed storage of usage rows, unique per (connection, resource, day)
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Insert or replace the row with the same identity
    async fn upsert(&self, record: &UsageRecord) -> Result<()>;

    /// Rows for one scope, ordered by day
    async fn list(&self, connection_id: u64, resource_id: &str) -> Result<Vec<UsageRecord>>;
}
