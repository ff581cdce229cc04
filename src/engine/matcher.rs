//! Boundary-tolerant literal matching.
//!
//! A placeholder typed as `[Company Name]` often reaches packaged markup
//! split across runs:
//!
//! ```text
//! [Com</w:t></w:r><w:r><w:t>pany Name]
//! ```
//!
//! [`Matcher::boundary_tolerant`] escapes the literal and lets zero or more
//! `<...>` tag tokens sit next to every alphanumeric char. Punctuation and
//! spaces still match literally. With no tags present this is an ordinary
//! literal match, so the same matcher serves all three representations.
//!
//! Tag tolerance is only added *between* literal chars, never before the
//! first or after the last, so a match always starts and ends on literal
//! text.
//!
//! Matching is a pure function of `(haystack, range)`: there is no cursor
//! shared between calls.

use crate::error::PatternCompileError;
use crate::{Span, text};
use regex::{Regex, RegexBuilder};

const TAG: &str = "(?:<[^>]*>)*";
const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct Matcher {
    literal: String,
    regex: Regex,
    flexible: bool,
}

impl Matcher {
    /// Compile `literal` into a boundary-tolerant matcher.
    pub fn boundary_tolerant(literal: &str) -> Result<Self, PatternCompileError> {
        Self::boundary_tolerant_with_limit(literal, DEFAULT_SIZE_LIMIT)
    }

    pub fn boundary_tolerant_with_limit(literal: &str, size_limit: usize) -> Result<Self, PatternCompileError> {
        check_literal(literal)?;

        let chars: Vec<char> = literal.chars().collect();
        let last = chars.len() - 1;
        let mut pattern = String::with_capacity(literal.len() * 24);
        let mut buf = [0u8; 4];
        for (i, c) in chars.iter().enumerate() {
            let tolerant = c.is_alphanumeric();
            if tolerant && i > 0 {
                pattern.push_str(TAG);
            }
            pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            if tolerant && i < last {
                pattern.push_str(TAG);
            }
        }

        let regex = build(literal, &pattern, size_limit)?;
        Ok(Matcher { literal: literal.to_string(), regex, flexible: false })
    }

    /// Loosened matcher: brackets stripped, whitespace runs matched as `\s+`.
    ///
    /// Returns `Ok(None)` when nothing is left after stripping brackets.
    pub fn flexible(literal: &str, size_limit: usize) -> Result<Option<Self>, PatternCompileError> {
        let stripped: String = literal.chars().filter(|c| !matches!(c, '[' | ']')).collect();
        let stripped = stripped.trim();
        if stripped.is_empty() {
            return Ok(None);
        }
        check_literal(stripped)?;

        let pattern = stripped.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+");
        let regex = build(literal, &pattern, size_limit)?;
        Ok(Some(Matcher { literal: stripped.to_string(), regex, flexible: true }))
    }

    /// The literal this matcher was built from (brackets stripped when flexible).
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn is_flexible(&self) -> bool {
        self.flexible
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// All non-overlapping matches in `haystack`.
    pub fn find_all(&self, haystack: &str) -> Vec<Span> {
        self.find_in(haystack, Span::new(0, haystack.len()), usize::MAX)
    }

    /// Up to `limit` leftmost non-overlapping matches fully inside `range`.
    ///
    /// A zero-width match advances the search by one char so the scan always
    /// terminates.
    pub fn find_in(&self, haystack: &str, range: Span, limit: usize) -> Vec<Span> {
        let end = text::floor_char_boundary(haystack, range.end);
        let bounded = &haystack[..end];
        let mut pos = text::ceil_char_boundary(bounded, range.start);
        let mut spans = Vec::new();

        while spans.len() < limit && pos <= bounded.len() {
            let Some(m) = self.regex.find_at(bounded, pos) else {
                break;
            };
            if m.start() == m.end() {
                pos = m.end() + bounded[m.end()..].chars().next().map(char::len_utf8).unwrap_or(1);
                continue;
            }
            spans.push(Span::new(m.start(), m.end()));
            pos = m.end();
        }
        spans
    }

    /// Rebuild the replacement for a matched slice so that any tags the match
    /// swallowed survive, in order, after `replacement`.
    ///
    /// `A<tag>B</tag>C` replaced by `X` becomes `X<tag></tag>`. Falls back to
    /// plain `replacement` when the slice carries no tags or cannot be walked
    /// against the literal.
    pub(crate) fn preserving_tags(&self, matched: &str, replacement: &str) -> String {
        if self.flexible || !matched.contains('<') {
            return replacement.to_string();
        }
        match interleaved_tags(matched, &self.literal) {
            Some(tags) if !tags.is_empty() => format!("{replacement}{tags}"),
            _ => replacement.to_string(),
        }
    }
}

fn check_literal(literal: &str) -> Result<(), PatternCompileError> {
    if literal.is_empty() {
        return Err(PatternCompileError { pattern: String::new(), reason: "empty pattern".to_string() });
    }
    if let Some(c) = literal.chars().find(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')) {
        return Err(PatternCompileError {
            pattern: literal.to_string(),
            reason: format!("control character U+{:04X}", c as u32),
        });
    }
    Ok(())
}

fn build(literal: &str, pattern: &str, size_limit: usize) -> Result<Regex, PatternCompileError> {
    RegexBuilder::new(pattern)
        .size_limit(size_limit)
        .build()
        .map_err(|err| PatternCompileError { pattern: literal.to_string(), reason: err.to_string() })
}

/// Walk `matched` against `literal`, collecting the tag tokens that sit next
/// to alphanumeric chars (mirrors how the pattern was built).
fn interleaved_tags(matched: &str, literal: &str) -> Option<String> {
    let chars: Vec<char> = literal.chars().collect();
    let last = chars.len().checked_sub(1)?;
    let mut tags = String::new();
    let mut rest = matched;

    for (i, &c) in chars.iter().enumerate() {
        let tolerant = c.is_alphanumeric();
        if tolerant && i > 0 {
            rest = take_tags(rest, &mut tags);
        }
        rest = rest.strip_prefix(c)?;
        if tolerant && i < last {
            rest = take_tags(rest, &mut tags);
        }
    }
    rest.is_empty().then_some(tags)
}

fn take_tags<'a>(mut rest: &'a str, out: &mut String) -> &'a str {
    while rest.starts_with('<') {
        let Some(close) = rest.find('>') else {
            break;
        };
        out.push_str(&rest[..=close]);
        rest = &rest[close + 1..];
    }
    rest
}
