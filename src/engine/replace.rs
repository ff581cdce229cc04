//! Bounded leftmost replacement.
//!
//! ```text
//! text:     .. P .. P .. P .. P ..      max = 2
//! collect:     ^1   ^2                  (left to right, stop at max)
//! apply:            2 then 1            (right to left, offsets stay valid)
//! result:   .. R .. R .. P .. P ..
//! ```

use super::matcher::Matcher;
use crate::Span;

/// Replace the leftmost `max` matches of `matcher` in `text` with
/// `replacement`, leaving later matches and all other bytes untouched.
///
/// Returns the number of spans replaced, i.e. `min(max, matches)`.
pub fn bounded_replace(text: &mut String, matcher: &Matcher, replacement: &str, max: usize) -> usize {
    bounded_replace_excluding(text, matcher, replacement, max, &[])
}

/// Like [`bounded_replace`], but matches overlapping any `excluded` span are
/// neither replaced nor counted.
pub(crate) fn bounded_replace_excluding(
    text: &mut String,
    matcher: &Matcher,
    replacement: &str,
    max: usize,
    excluded: &[Span],
) -> usize {
    if max == 0 || text.is_empty() {
        return 0;
    }

    let spans: Vec<Span> = if excluded.is_empty() {
        matcher.find_in(text, Span::new(0, text.len()), max)
    } else {
        matcher
            .find_all(text)
            .into_iter()
            .filter(|span| !excluded.iter().any(|ex| ex.overlaps(span)))
            .take(max)
            .collect()
    };

    let edits: Vec<(Span, String)> =
        spans.iter().map(|span| (*span, matcher.preserving_tags(&text[span.start..span.end], replacement))).collect();
    splice_right_to_left(text, edits)
}

/// Apply span edits highest offset first. Edits must not overlap.
///
/// Returns the number of edits applied.
pub(crate) fn splice_right_to_left(text: &mut String, mut edits: Vec<(Span, String)>) -> usize {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let applied = edits.len();
    for (span, replacement) in edits {
        text.replace_range(span.start..span.end, &replacement);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(p: &str) -> Matcher {
        Matcher::boundary_tolerant(p).unwrap()
    }

    #[test]
    fn replaces_only_the_leftmost_n() {
        let mut text = "[X] one [X] two [X] three".to_string();
        let n = bounded_replace(&mut text, &matcher("[X]"), "{{x}}", 2);
        assert_eq!(n, 2);
        assert_eq!(text, "{{x}} one {{x}} two [X] three");
    }

    #[test]
    fn count_is_clamped_to_actual_matches() {
        let mut text = "a [X] b".to_string();
        assert_eq!(bounded_replace(&mut text, &matcher("[X]"), "Y", 10), 1);
        assert_eq!(text, "a Y b");
    }

    #[test]
    fn zero_count_is_a_no_op() {
        let mut text = "[X]".to_string();
        assert_eq!(bounded_replace(&mut text, &matcher("[X]"), "Y", 0), 0);
        assert_eq!(text, "[X]");
    }

    #[test]
    fn excluded_spans_are_skipped_without_consuming_budget() {
        let mut text = "{{name}} name name".to_string();
        let excluded = [Span::new(0, 8)];
        let n = bounded_replace_excluding(&mut text, &matcher("name"), "N", 1, &excluded);
        assert_eq!(n, 1);
        assert_eq!(text, "{{name}} N name");
    }

    #[test]
    fn tolerant_replacement_keeps_inner_tags() {
        let mut text = "<r>A<t>B</t>C</r>".to_string();
        assert_eq!(bounded_replace(&mut text, &matcher("ABC"), "{{abc}}", 1), 1);
        assert_eq!(text, "<r>{{abc}}<t></t></r>");
    }

    #[test]
    fn splice_applies_highest_offset_first() {
        let mut text = "0123456789".to_string();
        let edits = vec![(Span::new(1, 2), "one".to_string()), (Span::new(5, 7), "56!".to_string())];
        assert_eq!(splice_right_to_left(&mut text, edits), 2);
        assert_eq!(text, "0one23456!789");
    }
}
