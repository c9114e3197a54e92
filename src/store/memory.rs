//! In-memory store
//!
//! Implements both store traits over ordered maps. Used by tests and by the
//! CLI when no database path is configured.

use super::traits::{DomainStore, RawRecord, RawStore};
use crate::error::Result;
use crate::model::{UsageKey, UsageRecord};
use crate::scope::ScopeFingerprint;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type RawPages = BTreeMap<ScopeFingerprint, BTreeMap<u32, RawRecord>>;

/// Raw and domain storage held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    raw: Arc<RwLock<RawPages>>,
    domain: Arc<RwLock<BTreeMap<UsageKey, UsageRecord>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total raw pages across all scopes
    pub async fn raw_len(&self) -> usize {
        self.raw.read().await.values().map(BTreeMap::len).sum()
    }

    /// Total usage rows across all scopes
    pub async fn domain_len(&self) -> usize {
        self.domain.read().await.len()
    }

    /// Drop everything
    pub async fn clear(&self) {
        self.raw.write().await.clear();
        self.domain.write().await.clear();
    }
}

#[async_trait]
impl RawStore for MemoryStore {
    async fn put(
        &self,
        fingerprint: &ScopeFingerprint,
        ordinal: u32,
        payload: Bytes,
    ) -> Result<()> {
        let record = RawRecord::new(fingerprint.clone(), ordinal, payload);
        let mut raw = self.raw.write().await;
        raw.entry(fingerprint.clone())
            .or_default()
            .insert(ordinal, record);
        Ok(())
    }

    async fn list_all(&self, fingerprint: &ScopeFingerprint) -> Result<Vec<RawRecord>> {
        let raw = self.raw.read().await;
        Ok(raw
            .get(fingerprint)
            .map(|pages| pages.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, fingerprint: &ScopeFingerprint) -> Result<usize> {
        let raw = self.raw.read().await;
        Ok(raw.get(fingerprint).map_or(0, BTreeMap::len))
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn upsert(&self, record: &UsageRecord) -> Result<()> {
        let mut domain = self.domain.write().await;
        domain.insert(record.key(), record.clone());
        Ok(())
    }

    async fn list(&self, connection_id: u64, resource_id: &str) -> Result<Vec<UsageRecord>> {
        let domain = self.domain.read().await;
        Ok(domain
            .values()
            .filter(|r| r.connection_id == connection_id && r.resource_id == resource_id)
            .cloned()
            .collect())
    }
}
