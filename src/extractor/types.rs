//! Extraction statistics

use serde::{Deserialize, Serialize};

/// Statistics for one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub raw_records_read: u64,
    /// Rows upserted into the domain store
    pub records_extracted: u64,
    /// Items dropped for a missing or invalid field
    pub items_skipped: u64,
    /// Raw pages whose payload was not a JSON array
    pub pages_skipped: u64,
    pub duration_ms: u64,
}

impl ExtractStats {
    /// Whether every item made it into the domain store
    pub fn is_clean(&self) -> bool {
        self.items_skipped == 0 && self.pages_skipped == 0
    }
}
