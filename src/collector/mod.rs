//! Collector
//!
//! Fetches every usage page for a scope and upserts each body, unparsed,
//! into the raw store under `(fingerprint, ordinal)`.
//!
//! # Overview
//!
//! Pages are fetched in waves of up to `fan_out` requests. Every request
//! first waits on the shared [`RateLimiter`]. Ordinals are assigned when a
//! page is dispatched, and results are processed in ordinal order, so pages
//! fetched speculatively past the last page are dropped and the stored set
//! matches a sequential run.
//!
//! The only validation applied to a body is that it parses as a JSON array.

mod types;

pub use types::{CollectStats, CollectorConfig, DEFAULT_ENTERPRISE_PATH, DEFAULT_ORG_PATH};

use crate::error::{Error, Result};
use crate::http::{HttpClient, RateLimiter, RequestConfig};
use crate::pagination::{NextPage, PageDescriptor, PageMeta, Pager};
use crate::scope::{ScopeFingerprint, TaskScope, DAY_FORMAT};
use crate::store::RawStore;
use crate::template::{self, TemplateContext};
use bytes::Bytes;
use futures::future::join_all;
use serde::de::IgnoredAny;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A page that came back 2xx with an array body
#[derive(Debug)]
struct FetchedPage {
    ordinal: u32,
    body: Bytes,
    item_count: usize,
}

/// Drives the pager against the usage API and fills the raw store
#[derive(Clone)]
pub struct Collector {
    client: HttpClient,
    limiter: RateLimiter,
    raw: Arc<dyn RawStore>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(client: HttpClient, limiter: RateLimiter, raw: Arc<dyn RawStore>) -> Self {
        Self {
            client,
            limiter,
            raw,
            config: CollectorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Resolve the endpoint path for a scope
    pub fn endpoint_path(&self, scope: &TaskScope) -> Result<String> {
        let mut ctx = TemplateContext::new().with("resource_id", scope.resource_id.as_str());
        let path = match &scope.enterprise_name {
            Some(enterprise) => {
                ctx.set("enterprise", enterprise.as_str());
                &self.config.enterprise_path
            }
            None => &self.config.org_path,
        };
        template::render(path, &ctx)
    }

    /// Collect every page for `scope`
    ///
    /// On failure, pages already written stay in the raw store.
    pub async fn run(&self, scope: &TaskScope) -> Result<CollectStats> {
        scope.validate()?;
        self.config.validate()?;

        let start = Instant::now();
        let fingerprint = scope.fingerprint();
        let path = self.endpoint_path(scope)?;

        let mut pager = Pager::new(self.config.pager_config());
        if let Some(since) = scope.since {
            pager = pager.with_param("since", since.format(DAY_FORMAT).to_string());
        }

        info!(
            scope = %fingerprint,
            path = %path,
            fan_out = self.config.fan_out,
            "Starting collection"
        );

        let mut stats = CollectStats::default();

        loop {
            let wave = next_wave(&mut pager, self.config.fan_out);
            if wave.is_empty() {
                break;
            }

            let results = join_all(wave.into_iter().map(|d| self.fetch_page(&path, d))).await;

            let mut accepted = Vec::new();
            let mut failure = None;
            for result in results {
                match result {
                    Ok(page) => {
                        stats.pages_fetched += 1;
                        if !pager.is_within_bounds(page.ordinal) {
                            debug!(ordinal = page.ordinal, "Discarding page past the last page");
                            continue;
                        }
                        pager.observe(&PageMeta::new(page.ordinal, page.item_count));
                        accepted.push(page);
                    }
                    Err((ordinal, e)) => {
                        if !pager.is_within_bounds(ordinal) {
                            debug!(ordinal, error = %e, "Ignoring failure past the last page");
                            continue;
                        }
                        failure = Some(e);
                        break;
                    }
                }
            }

            for page in accepted {
                self.store_page(&fingerprint, page, &mut stats).await?;
            }

            if let Some(e) = failure {
                warn!(
                    scope = %fingerprint,
                    kind = %e.kind(),
                    error = %e,
                    pages_written = stats.raw_records_written,
                    "Collection failed"
                );
                return Err(e);
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            scope = %fingerprint,
            pages = stats.raw_records_written,
            items = stats.items_seen,
            duration_ms = stats.duration_ms,
            "Collection complete"
        );
        Ok(stats)
    }

    async fn fetch_page(
        &self,
        path: &str,
        descriptor: PageDescriptor,
    ) -> std::result::Result<FetchedPage, (u32, Error)> {
        let ordinal = descriptor.ordinal;
        self.limiter.acquire().await;

        let mut request = RequestConfig::new();
        for (key, value) in &descriptor.query_params {
            request = request.query(key, value);
        }

        let fetched = async {
            let response = self.client.get_with_config(path, request).await?;
            let body = response.bytes().await?;
            let item_count = count_items(ordinal, &body)?;
            debug!(ordinal, items = item_count, bytes = body.len(), "Fetched page");
            Ok::<_, Error>(FetchedPage {
                ordinal,
                body,
                item_count,
            })
        };
        fetched.await.map_err(|e| (ordinal, e))
    }

    async fn store_page(
        &self,
        fingerprint: &ScopeFingerprint,
        page: FetchedPage,
        stats: &mut CollectStats,
    ) -> Result<()> {
        self.raw.put(fingerprint, page.ordinal, page.body).await?;
        stats.raw_records_written += 1;
        stats.items_seen += page.item_count as u64;
        Ok(())
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("client", &self.client)
            .field("limiter", &self.limiter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Dispatch up to `fan_out` descriptors
fn next_wave(pager: &mut Pager, fan_out: usize) -> Vec<PageDescriptor> {
    let mut wave = Vec::with_capacity(fan_out);
    while wave.len() < fan_out {
        match pager.dispatch() {
            NextPage::Continue(descriptor) => wave.push(descriptor),
            NextPage::Done => break,
        }
    }
    wave
}

/// Check that a body is a JSON array and count its elements
fn count_items(ordinal: u32, body: &[u8]) -> Result<usize> {
    serde_json::from_slice::<Vec<IgnoredAny>>(body)
        .map(|items| items.len())
        .map_err(|e| Error::malformed_page(ordinal, format!("expected a JSON array: {e}")))
}
