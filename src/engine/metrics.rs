//! Per-stage reports.
//!
//! Every stage that can partially fail returns a report instead of an error,
//! so the caller can see which descriptor or batch was skipped and why.

use crate::Representation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Why a descriptor produced no replacements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// An earlier descriptor already claimed this pattern.
    DuplicatePattern { kept_key: String },
    /// The pattern could not be compiled.
    PatternCompile { message: String },
}

/// Outcome of one descriptor in a normalization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorOutcome {
    pub key: String,
    pub pattern: String,
    /// Spans replaced per representation.
    pub replaced: BTreeMap<Representation, usize>,
    /// Representations where the flexible fallback produced the replacements.
    pub flexible: Vec<Representation>,
    pub skipped: Option<SkipReason>,
}

impl DescriptorOutcome {
    pub(crate) fn new(key: &str, pattern: &str) -> Self {
        DescriptorOutcome {
            key: key.to_string(),
            pattern: pattern.to_string(),
            replaced: BTreeMap::new(),
            flexible: Vec::new(),
            skipped: None,
        }
    }

    pub fn total_replaced(&self) -> usize {
        self.replaced.values().sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub outcomes: Vec<DescriptorOutcome>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl NormalizeReport {
    pub fn skipped(&self) -> impl Iterator<Item = &DescriptorOutcome> {
        self.outcomes.iter().filter(|o| o.skipped.is_some())
    }
}

/// Outcome of one resolution-oracle batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Batch returned; `mapped` slots survived validation.
    Mapped { mapped: usize },
    TimedOut,
    Failed { message: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingReport {
    pub mapping: crate::Mapping,
    /// One entry per batch, in batch order.
    pub batches: Vec<BatchOutcome>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl MappingReport {
    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| !matches!(b, BatchOutcome::Mapped { .. })).count()
    }
}

/// What rehydration did to one representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Slot spans replaced or spliced.
    pub spans_applied: usize,
    /// Slots skipped because their span overlapped an applied edit.
    pub spans_overlapping: usize,
    /// Slots whose recorded text no longer matches the representation.
    pub spans_stale: usize,
    /// Label-only slots whose label could not be found in the local window.
    pub labels_missing: usize,
    /// Canonical markers replaced by the final marker pass.
    pub markers_replaced: usize,
}

impl FillReport {
    pub(crate) fn absorb(&mut self, other: &FillReport) {
        self.spans_applied += other.spans_applied;
        self.spans_overlapping += other.spans_overlapping;
        self.spans_stale += other.spans_stale;
        self.labels_missing += other.labels_missing;
        self.markers_replaced += other.markers_replaced;
    }
}
