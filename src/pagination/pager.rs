//! Page-number pager
//!
//! Hands out page descriptors lazily. Ordinals start at 1 and are assigned
//! when a page is dispatched, not when its response arrives, so concurrent
//! fetches completing out of order still map onto the same storage keys.

use super::types::{NextPage, PageDescriptor, PageMeta, PagerConfig};
use std::collections::BTreeMap;
use tracing::debug;

/// Sequential page-number pager
///
/// Not restartable: build a fresh pager for every collection run.
#[derive(Debug, Clone)]
pub struct Pager {
    config: PagerConfig,
    /// Parameters added to every page (e.g. `since`)
    base_params: BTreeMap<String, String>,
    /// Next ordinal to hand out
    next_ordinal: u32,
    /// Smallest ordinal that came back short
    terminal_ordinal: Option<u32>,
}

impl Pager {
    /// Create a new pager
    pub fn new(config: PagerConfig) -> Self {
        Self {
            config,
            base_params: BTreeMap::new(),
            next_ordinal: 1,
            terminal_ordinal: None,
        }
    }

    /// Add a parameter sent with every page
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_params.insert(key.into(), value.into());
        self
    }

    /// Record the previous response, then produce the next page
    pub fn next(&mut self, previous: Option<&PageMeta>) -> NextPage {
        if let Some(meta) = previous {
            self.observe(meta);
        }
        self.dispatch()
    }

    /// Assign the next ordinal, unless pagination is over
    pub fn dispatch(&mut self) -> NextPage {
        if self.is_done() {
            return NextPage::Done;
        }

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let mut query_params = self.base_params.clone();
        query_params.insert(self.config.page_param.clone(), ordinal.to_string());
        query_params.insert(
            self.config.page_size_param.clone(),
            self.config.page_size.to_string(),
        );

        NextPage::Continue(PageDescriptor {
            ordinal,
            query_params,
        })
    }

    /// Record a fetched page
    ///
    /// A page with strictly fewer items than the page size (including an
    /// empty page) ends pagination at that ordinal.
    pub fn observe(&mut self, meta: &PageMeta) {
        if meta.item_count < self.config.page_size as usize {
            let terminal = self
                .terminal_ordinal
                .map_or(meta.ordinal, |t| t.min(meta.ordinal));
            if self.terminal_ordinal != Some(terminal) {
                debug!(
                    ordinal = meta.ordinal,
                    items = meta.item_count,
                    "Short page, pagination ends"
                );
            }
            self.terminal_ordinal = Some(terminal);
        }
    }

    /// Whether no further pages will be dispatched
    pub fn is_done(&self) -> bool {
        if self.terminal_ordinal.is_some() {
            return true;
        }
        self.config
            .max_pages
            .is_some_and(|max| self.next_ordinal > max)
    }

    /// Whether a page with this ordinal belongs to the result set
    ///
    /// Pages dispatched speculatively past the terminal page are not.
    pub fn is_within_bounds(&self, ordinal: u32) -> bool {
        self.terminal_ordinal.map_or(true, |t| ordinal <= t)
    }

    pub fn terminal_ordinal(&self) -> Option<u32> {
        self.terminal_ordinal
    }

    /// Number of ordinals handed out so far
    pub fn dispatched(&self) -> u32 {
        self.next_ordinal - 1
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }
}
