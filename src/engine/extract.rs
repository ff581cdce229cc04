//! Occurrence extraction.
//!
//! Runs every [`ScanRule`](crate::rules::ScanRule) over one representation,
//! merges the hits, sorts them by `(start, priority)` and only then assigns
//! IDs. ID order therefore always agrees with position order:
//!
//! ```text
//! "Name: ____   [Company]   Title:"
//!  ^lb   ^u      ^b          ^lo          lb = label with blank
//!                                         u  = underscore run
//!
//! sorted:  lb(0)  u(6)  b(13)  lo(25)
//! ids:     x0001  x0002 x0003  x0004
//! ```
//!
//! Overlapping hits of different kinds are kept; the rehydrator decides which
//! one wins when both receive a value.

use crate::options::Options;
use crate::rules::{ScanRule, is_label_terminator, scan_rules};
use crate::{Occurrence, OccurrenceKind, Representation, Representations, Span, text};

struct Candidate {
    span: Span,
    blank: Option<Span>,
    kind: OccurrenceKind,
    label: Option<String>,
    priority: u8,
}

/// Extract the ordered slot list of one representation.
pub fn extract(input: &str, representation: Representation, options: &Options) -> Vec<Occurrence> {
    let mut candidates: Vec<Candidate> = Vec::new();
    for rule in scan_rules().iter() {
        scan_rule(input, rule, &mut candidates);
    }
    candidates.sort_by_key(|c| (c.span.start, c.priority, c.span.end));

    let prefix = representation.id_prefix();
    let occurrences: Vec<Occurrence> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let before = &input[..c.span.start];
            let after = &input[c.span.end..];
            let raw = &input[c.span.start..c.span.end];
            let probe = c.blank.unwrap_or(c.span);
            let has_currency_marker =
                input[probe.start..probe.end].trim_start().starts_with('$') || ends_with_dollar(&input[..probe.start]);
            Occurrence {
                id: format!("{prefix}{:04}", i + 1),
                representation,
                span: c.span,
                blank: c.blank,
                raw: raw.to_string(),
                kind: c.kind,
                label_guess: c.label,
                has_currency_marker,
                context_before: text::tail_chars(before, options.context_window).to_string(),
                context_after: text::head_chars(after, options.context_window).to_string(),
            }
        })
        .collect();

    tracing::debug!(representation = representation.name(), slots = occurrences.len(), "extract");
    occurrences
}

/// Extract every representation, in `Representation::ALL` order, skipping
/// those not listed in `which`.
pub(crate) fn extract_all(reps: &Representations, which: &[Representation], options: &Options) -> Vec<Occurrence> {
    Representation::ALL
        .iter()
        .filter(|r| which.contains(r))
        .flat_map(|&r| extract(reps.get(r), r, options))
        .collect()
}

fn scan_rule(input: &str, rule: &ScanRule, out: &mut Vec<Candidate>) {
    let mut pos = 0;
    while pos <= input.len() {
        let Some(caps) = rule.regex.captures_at(input, pos) else {
            break;
        };
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((pos, pos));
        let label = caps.name("label");
        let start = label.map(|m| m.start()).unwrap_or(whole.0);
        let end = whole.1;

        if end == whole.0 {
            pos = end + input[end..].chars().next().map(char::len_utf8).unwrap_or(1);
            continue;
        }

        if rule.needs_terminator && !is_label_terminator(&input[end..]) {
            // Resume right after the label so a following label keeps its boundary.
            pos = label.map(|m| m.end()).unwrap_or(end);
            continue;
        }

        let blank = match rule.kind {
            OccurrenceKind::LabelOnly => None,
            OccurrenceKind::LabelWithBlank => caps.name("blank").map(|m| Span::new(m.start(), m.end())),
            OccurrenceKind::Bracket | OccurrenceKind::UnderscoreRun => Some(Span::new(start, end)),
        };

        out.push(Candidate {
            span: Span::new(start, end),
            blank,
            kind: rule.kind,
            label: label.map(|m| m.as_str().trim().to_string()),
            priority: rule.priority,
        });
        pos = end;
    }
}

/// `$` right before the match, ignoring trailing whitespace and tags.
fn ends_with_dollar(before: &str) -> bool {
    let mut s = before;
    loop {
        s = s.trim_end();
        if s.ends_with('>') {
            if let Some(open) = s.rfind('<') {
                s = &s[..open];
                continue;
            }
        }
        return s.ends_with('$');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> Vec<Occurrence> {
        extract(input, Representation::PlainText, &Options::default())
    }

    #[test]
    fn finds_all_four_kinds_in_position_order() {
        let input = "Name: ____ and [Company] pay $_____\nTitle:";
        let occs = scan(input);
        let kinds: Vec<_> = occs.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OccurrenceKind::LabelWithBlank,
                OccurrenceKind::UnderscoreRun,
                OccurrenceKind::Bracket,
                OccurrenceKind::UnderscoreRun,
                OccurrenceKind::LabelOnly,
            ]
        );
        assert_eq!(occs[0].label_guess.as_deref(), Some("Name"));
        assert_eq!(occs[4].label_guess.as_deref(), Some("Title"));
        assert_eq!(occs[4].raw, "Title:");
    }

    #[test]
    fn ids_are_zero_padded_and_follow_position() {
        let occs = extract("[a] [b] [c]", Representation::StyledMarkup, &Options::default());
        let ids: Vec<_> = occs.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["h0001", "h0002", "h0003"]);
        assert!(occs.windows(2).all(|w| w[0].span.start < w[1].span.start));
    }

    #[test]
    fn label_with_blank_records_the_blank_span() {
        let input = "<p>Purchase Amount: $[_____]</p>";
        let occ = scan(input).into_iter().find(|o| o.kind == OccurrenceKind::LabelWithBlank).unwrap();
        assert_eq!(occ.raw, "Purchase Amount: $[_____]");
        let blank = occ.blank.unwrap();
        assert_eq!(&input[blank.start..blank.end], "$[_____]");
        assert!(occ.has_currency_marker);
    }

    #[test]
    fn label_only_needs_end_of_line_or_tag() {
        assert!(scan("Title: CEO").iter().all(|o| o.kind != OccurrenceKind::LabelOnly));
        let html = scan("<p>By:</p><p>Name: </p>");
        let labels: Vec<_> = html
            .iter()
            .filter(|o| o.kind == OccurrenceKind::LabelOnly)
            .map(|o| o.label_guess.clone().unwrap())
            .collect();
        assert_eq!(labels, vec!["By", "Name"]);
    }

    #[test]
    fn rejected_label_does_not_hide_the_next_one() {
        let occs = scan("Name: Title:");
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].label_guess.as_deref(), Some("Title"));
    }

    #[test]
    fn dollar_before_tags_marks_currency() {
        let occs = scan("$</w:t></w:r><w:r><w:t>______");
        assert_eq!(occs.len(), 1);
        assert!(occs[0].has_currency_marker);
        assert!(!scan("amount ______")[0].has_currency_marker);
    }

    #[test]
    fn context_windows_are_bounded() {
        let options = Options { context_window: 4, ..Options::default() };
        let occs = extract("abcdefgh [X] ijklmnop", Representation::PlainText, &options);
        assert_eq!(occs[0].context_before, "fgh ");
        assert_eq!(occs[0].context_after, " ijk");
    }

    #[test]
    fn empty_input_has_no_slots() {
        assert!(scan("").is_empty());
    }
}
