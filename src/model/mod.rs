//! Domain model
//!
//! API item shapes and the normalized rows the extractor produces.

mod breakdown;
mod usage;

pub use breakdown::{
    Breakdown, BreakdownDimension, BreakdownEntry, BreakdownItem, BreakdownMetrics,
    BREAKDOWN_SCHEMA_VERSION, UNKNOWN_KEY,
};
pub use usage::{SkipReason, UsageItem, UsageKey, UsageRecord};
