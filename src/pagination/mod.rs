//! Pagination module
//!
//! Page-number pagination with a short-page stop condition.
//!
//! # Overview
//!
//! The [`Pager`] hands out [`PageDescriptor`]s with deterministic ordinals
//! and stops once a page comes back with fewer items than requested.

mod pager;
mod types;

pub use pager::Pager;
pub use types::{NextPage, PageDescriptor, PageMeta, PagerConfig};
