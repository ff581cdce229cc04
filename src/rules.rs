//! Static scan rules for occurrence extraction.
//!
//! Each rule pairs a regex with the [`OccurrenceKind`] it produces and a
//! priority. The extractor runs every rule over a representation, merges the
//! hits and sorts them by `(start, priority)`, so the table order below is
//! also the tie-break order.
//!
//! ```text
//! priority 0  bracket           $[_____]   [Company Name]
//! priority 1  underscore run    ______     ----   ———
//! priority 2  label with blank  Name: ____   Purchase Amount: $[___]
//! priority 3  label only        Title:<end of line or tag>
//! ```
//!
//! Label rules require a boundary (start of line, whitespace or `>`) before
//! the label. The boundary char is not part of the occurrence: the span
//! starts at the `label` capture.

use crate::OccurrenceKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// Signature-block and term labels recognised by the label rules.
pub(crate) const LABEL_WORDS: &[&str] = &[
    "By",
    "Name",
    "Title",
    "Address",
    "Email",
    "Date",
    "Company Name",
    "Investor Name",
    "Purchase Amount",
    "Post-Money Valuation Cap",
    "State of Incorporation",
    "Governing Law Jurisdiction",
];

#[derive(Debug)]
pub(crate) struct ScanRule {
    pub name: &'static str,
    pub kind: OccurrenceKind,
    pub regex: &'static Regex,
    /// Tie-break when two hits start at the same offset (lower wins).
    pub priority: u8,
    /// Label-only hits must be followed by end of input, a tag, or a line break.
    pub needs_terminator: bool,
}

/// Alternation of escaped labels, longest first so `Company Name` beats `Name`.
static LABEL_ALTERNATION: Lazy<String> = Lazy::new(|| {
    let mut labels: Vec<&str> = LABEL_WORDS.to_vec();
    labels.sort_by_key(|l| std::cmp::Reverse(l.len()));
    labels.iter().map(|l| regex::escape(l)).collect::<Vec<_>>().join("|")
});

static LABEL_WITH_BLANK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)(?:^|[>\s])(?P<label>{})[ \t]*:[ \t]*(?P<blank>(?:\$[ \t]*)?\[[^\]]{{0,80}}\]|[_\-—]{{3,}})",
        *LABEL_ALTERNATION
    ))
    .unwrap()
});

static LABEL_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?m)(?:^|[>\s])(?P<label>{})[ \t]*:[ \t]*", *LABEL_ALTERNATION)).unwrap());

/// All scan rules in priority order.
pub(crate) fn scan_rules() -> [ScanRule; 4] {
    [
        ScanRule {
            name: "bracket",
            kind: OccurrenceKind::Bracket,
            regex: regex!(r"(?:\$[ \t]*)?\[[^\]]{0,80}\]"),
            priority: 0,
            needs_terminator: false,
        },
        ScanRule {
            name: "underscore_run",
            kind: OccurrenceKind::UnderscoreRun,
            regex: regex!(r"(?:\$[ \t]*)?[_\-—]{3,}"),
            priority: 1,
            needs_terminator: false,
        },
        ScanRule {
            name: "label_with_blank",
            kind: OccurrenceKind::LabelWithBlank,
            regex: &LABEL_WITH_BLANK_RE,
            priority: 2,
            needs_terminator: false,
        },
        ScanRule {
            name: "label_only",
            kind: OccurrenceKind::LabelOnly,
            regex: &LABEL_ONLY_RE,
            priority: 3,
            needs_terminator: true,
        },
    ]
}

/// True when `rest` (the text right after a label-only hit) ends the label's line.
pub(crate) fn is_label_terminator(rest: &str) -> bool {
    matches!(rest.chars().next(), None | Some('<') | Some('\n') | Some('\r'))
}
