//! Pipeline
//!
//! Runs the collector and then the extractor for one scope, strictly in
//! that order, tracking the run as a small state machine:
//!
//! ```text
//! Idle → Collecting → Collected → Extracting → Extracted
//!            │                         │
//!            └→ CollectionFailed(kind) └→ ExtractionFailed
//! ```
//!
//! Each run builds its own [`RateLimiter`] from the configured budget.

mod types;

pub use types::{PipelineReport, PipelineState};

use crate::collector::{Collector, CollectorConfig};
use crate::error::Result;
use crate::extractor::Extractor;
use crate::http::{HttpClient, RateLimiter, RateLimiterConfig};
use crate::scope::TaskScope;
use crate::store::{DomainStore, RawStore};
use std::sync::Arc;
use tracing::{error, info};

/// Collector + extractor for one scope at a time
pub struct Pipeline {
    client: HttpClient,
    raw: Arc<dyn RawStore>,
    domain: Arc<dyn DomainStore>,
    rate_limit: RateLimiterConfig,
    collector: CollectorConfig,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(client: HttpClient, raw: Arc<dyn RawStore>, domain: Arc<dyn DomainStore>) -> Self {
        Self {
            client,
            raw,
            domain,
            rate_limit: RateLimiterConfig::default(),
            collector: CollectorConfig::default(),
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    #[must_use]
    pub fn with_collector_config(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    /// State reached by the latest run
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Collect, then extract
    ///
    /// Extraction does not start unless collection succeeded.
    pub async fn run(&mut self, scope: &TaskScope) -> Result<PipelineReport> {
        let fingerprint = scope.fingerprint();
        info!(scope = %fingerprint, "Pipeline started");

        self.transition(PipelineState::Collecting);
        let limiter = RateLimiter::new(&self.rate_limit);
        let collector = Collector::new(self.client.clone(), limiter, self.raw.clone())
            .with_config(self.collector.clone());

        let collect = match collector.run(scope).await {
            Ok(stats) => stats,
            Err(e) => {
                self.transition(PipelineState::CollectionFailed(e.kind()));
                error!(scope = %fingerprint, kind = %e.kind(), error = %e, "Collection failed");
                return Err(e);
            }
        };
        self.transition(PipelineState::Collected);

        let extract = self.extract_stage(scope).await?;
        Ok(PipelineReport {
            state: self.state,
            collect: Some(collect),
            extract,
        })
    }

    /// Replay extraction over already collected pages, without the network
    pub async fn extract_only(&mut self, scope: &TaskScope) -> Result<PipelineReport> {
        scope.validate()?;
        let extract = self.extract_stage(scope).await?;
        Ok(PipelineReport {
            state: self.state,
            collect: None,
            extract,
        })
    }

    async fn extract_stage(&mut self, scope: &TaskScope) -> Result<crate::extractor::ExtractStats> {
        self.transition(PipelineState::Extracting);
        let extractor = Extractor::new(self.raw.clone(), self.domain.clone());

        match extractor.run(scope).await {
            Ok(stats) => {
                self.transition(PipelineState::Extracted);
                Ok(stats)
            }
            Err(e) => {
                self.transition(PipelineState::ExtractionFailed);
                error!(scope = %scope.fingerprint(), error = %e, "Extraction failed");
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("rate_limit", &self.rate_limit)
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}
