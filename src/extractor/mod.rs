//! Extractor
//!
//! Replays the raw pages of a scope into [`UsageRecord`]s. Extraction reads
//! only the raw store, so it can be re-run at any time without touching the
//! network.
//!
//! Items missing a `day` (or carrying the wrong types) are logged and
//! counted, never fatal. A raw page belonging to another scope is fatal.

mod types;

pub use types::ExtractStats;

use crate::error::{Error, Result};
use crate::model::UsageRecord;
use crate::scope::{ScopeFingerprint, TaskScope};
use crate::store::{DomainStore, RawRecord, RawStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maps raw pages onto domain rows
#[derive(Clone)]
pub struct Extractor {
    raw: Arc<dyn RawStore>,
    domain: Arc<dyn DomainStore>,
}

impl Extractor {
    pub fn new(raw: Arc<dyn RawStore>, domain: Arc<dyn DomainStore>) -> Self {
        Self { raw, domain }
    }

    /// Extract every raw page collected for `scope`
    pub async fn run(&self, scope: &TaskScope) -> Result<ExtractStats> {
        self.extract(&scope.fingerprint()).await
    }

    /// Extract every raw page stored under `fingerprint`
    pub async fn extract(&self, fingerprint: &ScopeFingerprint) -> Result<ExtractStats> {
        let start = Instant::now();
        let mut stats = ExtractStats::default();

        let mut pages = self.raw.list_all(fingerprint).await?;
        pages.sort_by_key(|page| page.page_ordinal);
        info!(scope = %fingerprint, pages = pages.len(), "Starting extraction");

        for page in &pages {
            stats.raw_records_read += 1;

            if &page.fingerprint != fingerprint {
                return Err(Error::FingerprintMismatch {
                    expected: fingerprint.to_string(),
                    found: page.fingerprint.to_string(),
                    ordinal: page.page_ordinal,
                });
            }

            let Some(items) = parse_page(page) else {
                stats.pages_skipped += 1;
                continue;
            };

            for (index, item) in items.into_iter().enumerate() {
                match UsageRecord::from_value(fingerprint, item) {
                    Ok(record) => {
                        self.domain.upsert(&record).await?;
                        stats.records_extracted += 1;
                    }
                    Err(reason) => {
                        warn!(
                            scope = %fingerprint,
                            ordinal = page.page_ordinal,
                            index,
                            %reason,
                            "Skipping usage item"
                        );
                        stats.items_skipped += 1;
                    }
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            scope = %fingerprint,
            records = stats.records_extracted,
            items_skipped = stats.items_skipped,
            pages_skipped = stats.pages_skipped,
            duration_ms = stats.duration_ms,
            "Extraction complete"
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

/// Parse a payload as a JSON array, logging when it is not one
fn parse_page(page: &RawRecord) -> Option<Vec<Value>> {
    match serde_json::from_slice::<Vec<Value>>(&page.payload) {
        Ok(items) => {
            debug!(ordinal = page.page_ordinal, items = items.len(), "Parsed raw page");
            Some(items)
        }
        Err(e) => {
            warn!(
                scope = %page.fingerprint,
                ordinal = page.page_ordinal,
                error = %e,
                "Skipping raw page that is not a JSON array"
            );
            None
        }
    }
}
