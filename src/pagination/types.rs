//! Pagination types
//!
//! Defines the page descriptors handed out by the pager and the response
//! metadata fed back into it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Another page should be fetched
    Continue(PageDescriptor),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// The descriptor, if any
    pub fn descriptor(self) -> Option<PageDescriptor> {
        match self {
            Self::Continue(descriptor) => Some(descriptor),
            Self::Done => None,
        }
    }
}

/// One page to fetch. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// 1-based page ordinal, assigned at dispatch time
    pub ordinal: u32,
    /// Query parameters for this page, sorted by name
    pub query_params: BTreeMap<String, String>,
}

/// What the collector learned from a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub ordinal: u32,
    /// Number of items in the page body
    pub item_count: usize,
}

impl PageMeta {
    pub fn new(ordinal: u32, item_count: usize) -> Self {
        Self {
            ordinal,
            item_count,
        }
    }
}

/// Configuration for page-number pagination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerConfig {
    /// Query parameter name for the page number
    pub page_param: String,
    /// Query parameter name for the page size
    pub page_size_param: String,
    /// Items requested per page
    pub page_size: u32,
    /// Hard ceiling on the number of pages, if any
    pub max_pages: Option<u32>,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            page_size_param: "per_page".to_string(),
            page_size: 100,
            max_pages: None,
        }
    }
}

impl PagerConfig {
    /// Create a config with the given page size and default parameter names
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Set the page ceiling
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}
