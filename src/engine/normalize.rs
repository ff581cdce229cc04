//! Descriptor-driven normalization.
//!
//! For each descriptor, in registration order:
//!
//! ```text
//! compile once ── Matcher::boundary_tolerant(originalPattern)
//!      │
//!      ├─ for each representation:
//!      │     strict bounded_replace(.., {{key}}, occurrenceCount)
//!      │     └─ 0 hits and not packaged markup?
//!      │          flexible bounded_replace (brackets stripped, \s+)
//!      │
//!      └─ record DescriptorOutcome
//! ```
//!
//! Existing `{{...}}` markers are excluded from matching, and the flexible
//! fallback is not tried where the descriptor's marker is already present.
//! A second pass over already-normalized text is therefore a no-op.
//!
//! Markup text content has `&`, `<` and `>` escaped, so in both markups the
//! pattern is matched in that escaped form.
//!
//! When two descriptors share an `originalPattern`, the first one registered
//! wins and the later one is reported as skipped.

use super::escape::{escape_for, escape_text};
use super::matcher::Matcher;
use super::metrics::{DescriptorOutcome, NormalizeReport, SkipReason};
use super::replace::bounded_replace_excluding;
use crate::options::Options;
use crate::{PlaceholderDescriptor, Representation, Representations, Span};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{Level, debug, info, warn};

/// Replace descriptor occurrences with canonical markers in all three
/// representations, in place.
pub fn normalize(
    reps: &mut Representations,
    descriptors: &[PlaceholderDescriptor],
    options: &Options,
) -> NormalizeReport {
    let start = Instant::now();
    let span = tracing::span!(Level::INFO, "normalize.pass", descriptors = descriptors.len());
    let _guard = span.enter();

    let mut claimed: HashMap<&str, &str> = HashMap::new();
    let mut outcomes = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let mut outcome = DescriptorOutcome::new(&descriptor.key, &descriptor.original_pattern);

        if let Some(kept) = claimed.get(descriptor.original_pattern.as_str()) {
            warn!(key = %descriptor.key, kept_key = %kept, "duplicate pattern, keeping first descriptor");
            outcome.skipped = Some(SkipReason::DuplicatePattern { kept_key: kept.to_string() });
            outcomes.push(outcome);
            continue;
        }
        claimed.insert(&descriptor.original_pattern, &descriptor.key);

        let matcher = match Matcher::boundary_tolerant_with_limit(&descriptor.original_pattern, options.regex_size_limit)
        {
            Ok(m) => m,
            Err(err) => {
                warn!(key = %descriptor.key, error = %err, "pattern_compile_failure");
                outcome.skipped = Some(SkipReason::PatternCompile { message: err.reason });
                outcomes.push(outcome);
                continue;
            }
        };

        normalize_descriptor(reps, descriptor, &matcher, options, &mut outcome);
        debug!(
            key = %descriptor.key,
            pattern = %descriptor.original_pattern,
            replaced = outcome.total_replaced(),
            flexible = outcome.flexible.len(),
            "descriptor_normalized"
        );
        outcomes.push(outcome);
    }

    let report = NormalizeReport { outcomes, elapsed: start.elapsed() };
    info!(
        descriptors = descriptors.len(),
        skipped = report.skipped().count(),
        elapsed_micros = report.elapsed.as_micros(),
        "normalize_complete"
    );
    report
}

fn normalize_descriptor(
    reps: &mut Representations,
    descriptor: &PlaceholderDescriptor,
    matcher: &Matcher,
    options: &Options,
    outcome: &mut DescriptorOutcome,
) {
    let marker = descriptor.marker();
    let limit = descriptor.occurrence_count;

    // Both markups carry `&`, `<` and `>` escaped in text content.
    let markup_pattern = escape_text(&descriptor.original_pattern);
    let markup_matcher = if markup_pattern != descriptor.original_pattern.as_str() {
        Matcher::boundary_tolerant_with_limit(&markup_pattern, options.regex_size_limit)
            .map_err(|err| debug!(key = %descriptor.key, error = %err, "escaped pattern rejected"))
            .ok()
    } else {
        None
    };
    // Compiled lazily, at most once per descriptor: [plain text, markup].
    let mut flexible: [Option<Option<Matcher>>; 2] = [None, None];

    for representation in Representation::ALL {
        let in_markup = representation != Representation::PlainText;
        let (pattern, strict) = match &markup_matcher {
            Some(escaped) if in_markup => (&*markup_pattern, escaped),
            _ => (descriptor.original_pattern.as_str(), matcher),
        };
        let replacement = escape_for(representation, &marker);
        let text = reps.get_mut(representation);
        let excluded = marker_spans(text);

        let mut replaced = bounded_replace_excluding(text, strict, &replacement, limit, &excluded);

        // A representation that already carries this key's marker was normalized before.
        if replaced == 0 && limit > 0 && representation.allows_flexible_match() && !text.contains(&*replacement) {
            let loose = flexible[usize::from(in_markup)].get_or_insert_with(|| {
                Matcher::flexible(pattern, options.regex_size_limit).unwrap_or_else(|err| {
                    debug!(key = %descriptor.key, error = %err, "flexible pattern rejected");
                    None
                })
            });
            if let Some(loose) = loose {
                replaced = bounded_replace_excluding(text, loose, &replacement, limit, &excluded);
                if replaced > 0 {
                    outcome.flexible.push(representation);
                }
            }
        }

        outcome.replaced.insert(representation, replaced);
    }
}

/// Spans of canonical markers already present in `text`.
pub(crate) fn marker_spans(text: &str) -> Vec<Span> {
    regex!(r"\{\{[^{}<>]+\}\}").find_iter(text).map(|m| Span::new(m.start(), m.end())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    fn descriptor(key: &str, pattern: &str, count: usize) -> PlaceholderDescriptor {
        PlaceholderDescriptor {
            key: key.to_string(),
            label: key.to_string(),
            field_type: FieldType::Text,
            original_pattern: pattern.to_string(),
            occurrence_count: count,
            question: None,
        }
    }

    #[test]
    fn all_representations_get_the_same_marker() {
        let mut reps = Representations::new(
            "Buyer: [Buyer Name]",
            "<p>Buyer: [Buyer Name]</p>",
            "<w:t>Buyer: [Buyer </w:t></w:r><w:r><w:t>Name]</w:t>",
        );
        let report = normalize(&mut reps, &[descriptor("buyer_name", "[Buyer Name]", 1)], &Options::default());
        assert_eq!(reps.plain_text, "Buyer: {{buyer_name}}");
        assert_eq!(reps.styled_markup, "<p>Buyer: {{buyer_name}}</p>");
        assert_eq!(reps.packaged_markup, "<w:t>Buyer: {{buyer_name}}</w:t></w:r><w:r><w:t></w:t>");
        assert_eq!(report.outcomes[0].total_replaced(), 3);
        assert!(report.outcomes[0].flexible.is_empty());
    }

    #[test]
    fn flexible_fallback_skips_packaged_markup() {
        let mut reps = Representations::new("the Company  Name here", "<p>Company Name</p>", "<w:t>Company  Name</w:t>");
        let report = normalize(&mut reps, &[descriptor("company", "[Company Name]", 1)], &Options::default());
        assert_eq!(reps.plain_text, "the {{company}} here");
        assert_eq!(reps.styled_markup, "<p>{{company}}</p>");
        assert_eq!(reps.packaged_markup, "<w:t>Company  Name</w:t>");
        assert_eq!(report.outcomes[0].flexible, vec![Representation::PlainText, Representation::StyledMarkup]);
    }

    #[test]
    fn first_registered_pattern_wins() {
        let mut reps = Representations::new("[Party]", "", "");
        let report = normalize(
            &mut reps,
            &[descriptor("first_party", "[Party]", 1), descriptor("second_party", "[Party]", 1)],
            &Options::default(),
        );
        assert_eq!(reps.plain_text, "{{first_party}}");
        assert_eq!(
            report.outcomes[1].skipped,
            Some(SkipReason::DuplicatePattern { kept_key: "first_party".to_string() })
        );
    }

    #[test]
    fn bad_pattern_is_skipped_and_others_continue() {
        let mut reps = Representations::new("[A] [B]", "", "");
        let report = normalize(
            &mut reps,
            &[descriptor("a", "bad\u{0001}", 1), descriptor("b", "[B]", 1)],
            &Options::default(),
        );
        assert_eq!(reps.plain_text, "[A] {{b}}");
        assert!(matches!(report.outcomes[0].skipped, Some(SkipReason::PatternCompile { .. })));
    }

    #[test]
    fn ampersand_patterns_match_escaped_markup() {
        let mut reps = Representations::new(
            "Smith & Sons [Co.] sign",
            "<p>Smith &amp; Sons [Co.] sign</p>",
            "<w:t>Smith &amp; Sons [</w:t><w:t>Co.] sign</w:t>",
        );
        let report = normalize(&mut reps, &[descriptor("firm", "Smith & Sons [Co.]", 1)], &Options::default());
        assert_eq!(reps.plain_text, "{{firm}} sign");
        assert_eq!(reps.styled_markup, "<p>{{firm}} sign</p>");
        assert_eq!(reps.packaged_markup, "<w:t>{{firm}}</w:t><w:t> sign</w:t>");
        assert_eq!(report.outcomes[0].total_replaced(), 3);
        assert!(report.outcomes[0].flexible.is_empty());
    }

    #[test]
    fn markers_are_not_matched_again() {
        let mut reps = Representations::new("{{name}} and [name]", "", "");
        normalize(&mut reps, &[descriptor("name", "[name]", 5)], &Options::default());
        assert_eq!(reps.plain_text, "{{name}} and {{name}}");
        let before = reps.clone();
        normalize(&mut reps, &[descriptor("name", "[name]", 5)], &Options::default());
        assert_eq!(reps, before);
    }
}
