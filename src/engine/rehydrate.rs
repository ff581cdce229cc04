//! Value rehydration.
//!
//! Two paths write final values into a representation:
//!
//! ```text
//! raw slots + Mapping ── fill_slots ──┐
//!                                     ├── escaped values in place
//! {{key}} markers ────── fill_markers ┘
//! ```
//!
//! Span edits are planned against the unmodified text. Longer edits are
//! accepted first and any later edit overlapping an accepted one is dropped,
//! so the inner `____` of `Name: [____]` never fights the enclosing slot.
//! Accepted edits are applied highest offset first.

use super::escape::escape_for;
use super::matcher::Matcher;
use super::metrics::FillReport;
use super::replace::splice_right_to_left;
use crate::options::Options;
use crate::{FieldValue, Mapping, Occurrence, OccurrenceKind, Representation, Span, marker_for, text};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolve a slot-to-key mapping into slot-to-value pairs. Slots mapped to a
/// key without a non-empty value are left out.
pub(crate) fn values_by_id(mapping: &Mapping, fields: &[FieldValue]) -> BTreeMap<String, String> {
    let by_key: BTreeMap<&str, &str> =
        fields.iter().filter(|f| !f.value.is_empty()).map(|f| (f.key.as_str(), f.value.as_str())).collect();
    mapping
        .iter()
        .filter_map(|(id, key)| by_key.get(key.as_str()).map(|value| (id.clone(), value.to_string())))
        .collect()
}

/// Write `values` (slot ID → value) into the slots of `representation`.
///
/// Slots of other representations and slots without a value are ignored.
pub fn fill_slots(
    text: &mut String,
    representation: Representation,
    slots: &[Occurrence],
    values: &BTreeMap<String, String>,
    options: &Options,
) -> FillReport {
    let mut report = FillReport::default();
    let ordered = slots
        .iter()
        .filter(|slot| slot.representation == representation)
        .filter_map(|slot| values.get(&slot.id).map(|v| (slot, v.as_str())));

    let window = match representation {
        Representation::PackagedMarkup => options.label_window_package,
        _ => options.label_window_markup,
    };

    let mut planned: Vec<(&Occurrence, Span, String)> = Vec::new();
    for (slot, value) in ordered {
        if text.get(slot.span.start..slot.span.end) != Some(slot.raw.as_str()) {
            debug!(id = %slot.id, "slot text changed since extraction");
            report.spans_stale += 1;
            continue;
        }

        let escaped = escape_for(representation, value);
        match slot.kind {
            OccurrenceKind::LabelOnly => match label_splice(text, slot, window) {
                Some(span) => planned.push((slot, span, format!(" {escaped}"))),
                None => {
                    warn!(id = %slot.id, label = ?slot.label_guess, "label not found near slot");
                    report.labels_missing += 1;
                }
            },
            OccurrenceKind::Bracket | OccurrenceKind::UnderscoreRun | OccurrenceKind::LabelWithBlank => {
                planned.push((slot, slot.blank.unwrap_or(slot.span), escaped.into_owned()));
            }
        }
    }

    // Outermost spans claim their bytes first.
    planned.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(b.1.start.cmp(&a.1.start)));
    let mut edits: Vec<(Span, String)> = Vec::with_capacity(planned.len());
    for (slot, span, replacement) in planned {
        if edits.iter().any(|(applied, _)| conflicts(applied, &span)) {
            debug!(id = %slot.id, kind = slot.kind.name(), "slot overlaps an applied edit");
            report.spans_overlapping += 1;
            continue;
        }
        edits.push((span, replacement));
    }

    report.spans_applied = splice_right_to_left(text, edits);
    debug!(
        representation = representation.name(),
        applied = report.spans_applied,
        overlapping = report.spans_overlapping,
        stale = report.spans_stale,
        labels_missing = report.labels_missing,
        "fill_slots"
    );
    report
}

/// Replace every `{{key}}` marker that has a value with the escaped value.
///
/// All markers are located before any is replaced, so a value that itself
/// looks like a marker is never expanded. Returns the number of markers
/// replaced.
pub fn fill_markers(
    text: &mut String,
    representation: Representation,
    fields: &[FieldValue],
    options: &Options,
) -> usize {
    let mut edits: Vec<(Span, String)> = Vec::new();

    for field in fields.iter().filter(|f| !f.value.is_empty()) {
        let marker = marker_for(&field.key);
        let escaped = escape_for(representation, &field.value);

        if representation == Representation::PackagedMarkup {
            let matcher = match Matcher::boundary_tolerant_with_limit(&marker, options.regex_size_limit) {
                Ok(m) => m,
                Err(err) => {
                    warn!(key = %field.key, error = %err, "marker pattern rejected");
                    continue;
                }
            };
            for span in matcher.find_all(text) {
                edits.push((span, matcher.preserving_tags(&text[span.start..span.end], &escaped)));
            }
        } else {
            for (start, _) in text.match_indices(marker.as_str()) {
                edits.push((Span::new(start, start + marker.len()), escaped.to_string()));
            }
        }
    }

    edits.sort_by_key(|(span, _)| span.start);
    let mut accepted: Vec<(Span, String)> = Vec::with_capacity(edits.len());
    for edit in edits {
        if accepted.last().is_some_and(|(prev, _)| prev.overlaps(&edit.0)) {
            continue;
        }
        accepted.push(edit);
    }

    let replaced = splice_right_to_left(text, accepted);
    debug!(representation = representation.name(), replaced, "fill_markers");
    replaced
}

fn conflicts(a: &Span, b: &Span) -> bool {
    a.overlaps(b) || a.start == b.start
}

/// Locate the label-and-colon nearest the slot inside its local window and
/// return the span of horizontal whitespace after the colon.
fn label_splice(text: &str, slot: &Occurrence, window: usize) -> Option<Span> {
    let label = slot
        .label_guess
        .as_deref()
        .or_else(|| slot.raw.split(':').next().map(str::trim))
        .filter(|l| !l.is_empty())?;

    let start = slot.span.start - text::tail_chars(&text[..slot.span.start], window).len();
    let end = slot.span.end + text::head_chars(&text[slot.span.end..], window).len();
    let local = &text[start..end];

    local
        .match_indices(label)
        .filter_map(|(at, _)| {
            let after = at + label.len();
            let gap = regex!(r"^[ \t]*:(?P<gap>[ \t]*)").captures(&local[after..])?.name("gap")?;
            Some((at, Span::new(start + after + gap.start(), start + after + gap.end())))
        })
        .min_by_key(|(at, _)| (start + at).abs_diff(slot.span.start))
        .map(|(_, gap)| gap)
}
