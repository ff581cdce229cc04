#[macro_use]
mod macros;
mod api;
mod derive;
mod engine;
mod error;
mod intake;
mod options;
mod oracle;
mod package;
mod rules;
mod text;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use api::{
    AnalysisReport, FillMode, FillOutput, FillRequest, NormalizedDocument, analyze, fill, fill_markers_only,
    normalize_package,
};
pub use derive::derive_representations;
pub use engine::{
    BatchOutcome, DescriptorOutcome, FillReport, MappingBatch, MappingReport, Matcher, NormalizeReport, SkipReason,
    SlotView, FieldView, bounded_replace, escape_for, extract, fill_markers, fill_slots, map_slots, normalize,
};
pub use error::{ConfigError, FillError, InputError, OracleError, PackageError, PatternCompileError};
pub use intake::{descriptors_from_value, fields_from_value};
pub use options::Options;
pub use oracle::{
    DetectionChunk, DetectionOracle, DetectionReport, ResolutionOracle, detect_placeholders, parse_detection_response,
    parse_mapping_response, summarize,
};
pub use package::DocumentPackage;

// --- Core types -------------------------------------------------------------

/// One of the three parallel textual views of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    PlainText,
    StyledMarkup,
    PackagedMarkup,
}

impl Representation {
    pub const ALL: [Representation; 3] =
        [Representation::PlainText, Representation::StyledMarkup, Representation::PackagedMarkup];

    /// Prefix used for occurrence IDs scoped to this representation.
    pub fn id_prefix(self) -> char {
        match self {
            Representation::PlainText => 't',
            Representation::StyledMarkup => 'h',
            Representation::PackagedMarkup => 'x',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Representation::PlainText => "text",
            Representation::StyledMarkup => "html",
            Representation::PackagedMarkup => "xml",
        }
    }

    /// Whether the whitespace/bracket-insensitive fallback may run here.
    /// Packaged markup is never loosened: whitespace there is markup noise.
    pub fn allows_flexible_match(self) -> bool {
        !matches!(self, Representation::PackagedMarkup)
    }
}

impl std::str::FromStr for Representation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "plain" | "plain_text" => Ok(Representation::PlainText),
            "html" | "styled" | "styled_markup" => Ok(Representation::StyledMarkup),
            "xml" | "packaged" | "packaged_markup" => Ok(Representation::PackagedMarkup),
            other => Err(format!("unknown representation '{other}' (expected text, html or xml)")),
        }
    }
}

/// Byte span `[start, end)` into one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte index (inclusive).
    pub start: usize,
    /// End byte index (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Expected value type of a placeholder, as reported by the detection oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Currency,
    Date,
    Email,
    Address,
    Signature,
}

impl FieldType {
    /// Lenient parse; anything unrecognised is plain text.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" => FieldType::Number,
            "currency" => FieldType::Currency,
            "date" => FieldType::Date,
            "email" => FieldType::Email,
            "address" => FieldType::Address,
            "signature" => FieldType::Signature,
            _ => FieldType::Text,
        }
    }
}

/// Externally detected definition of a fillable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderDescriptor {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Literal text of the placeholder as it appears in the source.
    pub original_pattern: String,
    /// Upper bound on replacements per representation.
    pub occurrence_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl PlaceholderDescriptor {
    /// Canonical two-brace marker for this descriptor's key.
    pub fn marker(&self) -> String {
        marker_for(&self.key)
    }
}

pub(crate) fn marker_for(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

/// Heuristic class of a located placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    Bracket,
    UnderscoreRun,
    LabelWithBlank,
    LabelOnly,
}

impl OccurrenceKind {
    pub fn name(self) -> &'static str {
        match self {
            OccurrenceKind::Bracket => "bracket",
            OccurrenceKind::UnderscoreRun => "underscore",
            OccurrenceKind::LabelWithBlank => "label_with_blank",
            OccurrenceKind::LabelOnly => "label_only",
        }
    }
}

/// One concrete located instance of a placeholder-like pattern ("slot").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Representation-scoped ID, e.g. `h0003`. Only stable within one extraction pass.
    pub id: String,
    pub representation: Representation,
    pub span: Span,
    /// Portion of `span` that a value replaces; `None` for label-only slots.
    pub blank: Option<Span>,
    pub raw: String,
    pub kind: OccurrenceKind,
    pub label_guess: Option<String>,
    pub has_currency_marker: bool,
    pub context_before: String,
    pub context_after: String,
}

/// A resolved user value for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

impl FieldValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        FieldValue { label: key.clone(), key, field_type: FieldType::Text, value: value.into() }
    }
}

/// Partial function from occurrence ID to field key.
pub type Mapping = BTreeMap<String, String>;

/// The three parallel representations of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representations {
    pub plain_text: String,
    pub styled_markup: String,
    pub packaged_markup: String,
}

impl Representations {
    pub fn new(
        plain_text: impl Into<String>,
        styled_markup: impl Into<String>,
        packaged_markup: impl Into<String>,
    ) -> Self {
        Representations {
            plain_text: plain_text.into(),
            styled_markup: styled_markup.into(),
            packaged_markup: packaged_markup.into(),
        }
    }

    pub fn get(&self, representation: Representation) -> &str {
        match representation {
            Representation::PlainText => &self.plain_text,
            Representation::StyledMarkup => &self.styled_markup,
            Representation::PackagedMarkup => &self.packaged_markup,
        }
    }

    pub fn get_mut(&mut self, representation: Representation) -> &mut String {
        match representation {
            Representation::PlainText => &mut self.plain_text,
            Representation::StyledMarkup => &mut self.styled_markup,
            Representation::PackagedMarkup => &mut self.packaged_markup,
        }
    }
}
