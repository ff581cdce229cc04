//! Slot-to-field mapping: the batching and merge contract.
//!
//! Deciding which field fits which slot belongs to an external
//! [`ResolutionOracle`]. This module only guarantees how the oracle is driven:
//!
//! ```text
//! slots (ordered) ── chunk(batch_size) ──┬─ batch 0 ── timeout ── parse ── validate ──┐
//!                                        ├─ batch 1 ── timeout ── (timed out) ────────┤── union ── Mapping
//!                                        └─ batch 2 ── timeout ── (error) ────────────┘
//! ```
//!
//! - Batches are disjoint by slot ID, so the union needs no conflict
//!   resolution and completion order never changes the result.
//! - A batch that times out, errors, or returns garbage contributes nothing.
//!   Mapping failures never fail the fill.
//! - Returned pairs are only kept when the ID belongs to the batch and the
//!   key names an available field.

use super::metrics::{BatchOutcome, MappingReport};
use crate::options::Options;
use crate::oracle::{ResolutionOracle, parse_mapping_response};
use crate::{FieldType, FieldValue, Mapping, Occurrence, OccurrenceKind, Representation, text};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Light-weight view of a slot handed to the resolution oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub id: String,
    pub representation: Representation,
    pub kind: OccurrenceKind,
    pub label_guess: Option<String>,
    pub has_currency_marker: bool,
    /// `<before>[BLANK]<after>`, each side cut to the oracle window.
    pub text_window: String,
}

impl SlotView {
    pub fn from_occurrence(occurrence: &Occurrence, window: usize) -> Self {
        SlotView {
            id: occurrence.id.clone(),
            representation: occurrence.representation,
            kind: occurrence.kind,
            label_guess: occurrence.label_guess.clone(),
            has_currency_marker: occurrence.has_currency_marker,
            text_window: format!(
                "{}[BLANK]{}",
                text::tail_chars(&occurrence.context_before, window),
                text::head_chars(&occurrence.context_after, window)
            ),
        }
    }
}

/// A field with a value, as shown to the resolution oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

impl From<&FieldValue> for FieldView {
    fn from(field: &FieldValue) -> Self {
        FieldView {
            key: field.key.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            value: field.value.clone(),
        }
    }
}

/// One request to the resolution oracle.
#[derive(Debug, Clone, Copy)]
pub struct MappingBatch<'a> {
    /// Zero-based batch index.
    pub index: usize,
    pub total: usize,
    pub slots: &'a [SlotView],
    pub fields: &'a [FieldView],
}

/// Map slots to field keys through `oracle`, batch by batch.
pub async fn map_slots(
    oracle: &dyn ResolutionOracle,
    slots: &[Occurrence],
    fields: &[FieldValue],
    options: &Options,
) -> MappingReport {
    let start = Instant::now();
    let fields: Vec<FieldView> = fields.iter().filter(|f| !f.value.is_empty()).map(FieldView::from).collect();
    if slots.is_empty() || fields.is_empty() {
        return MappingReport { elapsed: start.elapsed(), ..MappingReport::default() };
    }

    let views: Vec<SlotView> = slots.iter().map(|o| SlotView::from_occurrence(o, options.oracle_window)).collect();
    let known_keys: HashSet<&str> = fields.iter().map(|f| f.key.as_str()).collect();
    let chunks: Vec<&[SlotView]> = views.chunks(options.mapping_batch_size.max(1)).collect();
    let total = chunks.len();

    let batches = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| MappingBatch { index, total, slots: chunk, fields: &fields });

    let results: Vec<(BatchOutcome, Mapping)> = if options.concurrent_batches {
        futures::future::join_all(batches.map(|batch| run_batch(oracle, batch, &known_keys, options))).await
    } else {
        let mut results = Vec::with_capacity(total);
        for batch in batches {
            results.push(run_batch(oracle, batch, &known_keys, options).await);
        }
        results
    };

    let mut report = MappingReport::default();
    for (outcome, partial) in results {
        report.mapping.extend(partial);
        report.batches.push(outcome);
    }
    report.elapsed = start.elapsed();

    info!(
        slots = slots.len(),
        batches = total,
        failed_batches = report.failed_batches(),
        mapped = report.mapping.len(),
        elapsed_micros = report.elapsed.as_micros(),
        "map_slots_complete"
    );
    report
}

async fn run_batch(
    oracle: &dyn ResolutionOracle,
    batch: MappingBatch<'_>,
    known_keys: &HashSet<&str>,
    options: &Options,
) -> (BatchOutcome, Mapping) {
    let index = batch.index;
    let timeout = options.mapping_timeout();

    let response = match tokio::time::timeout(timeout, oracle.resolve(batch)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            warn!(batch = index, error = %err, "mapping batch failed");
            return (BatchOutcome::Failed { message: err.to_string() }, Mapping::new());
        }
        Err(_) => {
            warn!(batch = index, timeout_ms = timeout.as_millis(), "mapping batch timed out");
            return (BatchOutcome::TimedOut, Mapping::new());
        }
    };

    let parsed = match parse_mapping_response(&response) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(batch = index, error = %err, "mapping batch unparseable");
            return (BatchOutcome::Failed { message: err.to_string() }, Mapping::new());
        }
    };

    let batch_ids: HashSet<&str> = batch.slots.iter().map(|s| s.id.as_str()).collect();
    let mut mapping = Mapping::new();
    for (id, key) in parsed {
        if !batch_ids.contains(id.as_str()) {
            debug!(batch = index, id = %id, "dropping mapping for slot outside batch");
        } else if !known_keys.contains(key.as_str()) {
            debug!(batch = index, id = %id, key = %key, "dropping mapping to unknown key");
        } else {
            mapping.insert(id, key);
        }
    }

    (BatchOutcome::Mapped { mapped: mapping.len() }, mapping)
}
