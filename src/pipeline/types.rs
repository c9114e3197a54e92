//! Pipeline state and report types

use crate::collector::CollectStats;
use crate::error::ErrorKind;
use crate::extractor::ExtractStats;
use serde::Serialize;
use std::fmt;

/// Where a pipeline run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Collecting,
    /// Every page is in the raw store
    Collected,
    Extracting,
    /// Domain rows are available; skipped items do not prevent this
    Extracted,
    CollectionFailed(#[serde(serialize_with = "kind_name")] ErrorKind),
    ExtractionFailed,
}

impl PipelineState {
    /// Whether no further transition will happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Extracted | Self::CollectionFailed(_) | Self::ExtractionFailed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Collecting => f.write_str("collecting"),
            Self::Collected => f.write_str("collected"),
            Self::Extracting => f.write_str("extracting"),
            Self::Extracted => f.write_str("extracted"),
            Self::CollectionFailed(kind) => write!(f, "collection_failed({kind})"),
            Self::ExtractionFailed => f.write_str("extraction_failed"),
        }
    }
}

fn kind_name<S: serde::Serializer>(kind: &ErrorKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    /// `None` when extraction was replayed without collecting
    pub collect: Option<CollectStats>,
    pub extract: ExtractStats,
}
