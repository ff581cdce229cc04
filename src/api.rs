use crate::derive::derive_representations;
use crate::engine::{self, FillReport, MappingReport, NormalizeReport};
use crate::error::{FillError, InputError, PackageError};
use crate::options::Options;
use crate::oracle::{DetectionOracle, DetectionReport, ResolutionOracle, detect_placeholders, summarize};
use crate::package::DocumentPackage;
use crate::{FieldValue, PlaceholderDescriptor, Representation, Representations};
use bitflags::bitflags;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

bitflags! {
    /// Which outputs a fill request produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FillMode: u8 {
        /// Filled styled markup.
        const PREVIEW = 1 << 0;
        /// Repackaged document bytes.
        const DOWNLOAD = 1 << 1;
        const BOTH = Self::PREVIEW.bits() | Self::DOWNLOAD.bits();
    }
}

impl Default for FillMode {
    fn default() -> Self {
        FillMode::BOTH
    }
}

impl FromStr for FillMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(FillMode::PREVIEW),
            "download" => Ok(FillMode::DOWNLOAD),
            "both" => Ok(FillMode::BOTH),
            other => Err(InputError::UnknownMode(other.to_string())),
        }
    }
}

/// A package with its representations normalized to `{{key}}` markers.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub representations: Representations,
    /// The package rewritten with the normalized text part.
    pub package: Vec<u8>,
    pub report: NormalizeReport,
}

/// Result of [`analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub document: NormalizedDocument,
    pub detection: DetectionReport,
    /// `None` when the summary call failed or timed out.
    pub summary: Option<String>,
}

/// Inputs of a fill request. Everything is optional at the type level so
/// that missing pieces surface as [`InputError`]s rather than decode errors.
#[derive(Debug, Clone, Default)]
pub struct FillRequest {
    /// Normalized package bytes.
    pub package: Option<Vec<u8>>,
    /// Normalized styled markup, required for [`FillMode::PREVIEW`].
    pub styled_markup: Option<String>,
    /// Normalized plain text; filled when supplied.
    pub plain_text: Option<String>,
    pub fields: Option<Vec<FieldValue>>,
    pub mode: FillMode,
}

#[derive(Debug, Clone, Default)]
pub struct FillOutput {
    pub styled_markup: Option<String>,
    pub plain_text: Option<String>,
    pub package: Option<Vec<u8>>,
    /// Totals over every filled representation.
    pub report: FillReport,
    /// Present when slots were mapped through a resolution oracle.
    pub mapping: Option<MappingReport>,
}

/// Open `bytes`, derive the representations, and normalize them with
/// `descriptors`.
pub fn normalize_package(
    bytes: Vec<u8>,
    descriptors: &[PlaceholderDescriptor],
    options: &Options,
) -> Result<NormalizedDocument, PackageError> {
    let package = DocumentPackage::open(bytes, &options.document_part)?;
    let representations = derive_representations(package.markup())?;
    normalize_opened(&package, representations, descriptors, options)
}

/// Detect placeholders, summarize, and normalize one uploaded package.
///
/// Detection and summary run concurrently. Oracle failures degrade the
/// report; only an unreadable or unwritable package is an error.
pub async fn analyze(
    bytes: Vec<u8>,
    oracle: &dyn DetectionOracle,
    options: &Options,
) -> Result<AnalysisReport, PackageError> {
    let start = Instant::now();
    let package = DocumentPackage::open(bytes, &options.document_part)?;
    let representations = derive_representations(package.markup())?;

    let (detection, summary) = tokio::join!(
        detect_placeholders(oracle, &representations.plain_text, &representations.packaged_markup, options),
        summarize(oracle, &representations.plain_text, options),
    );
    let summary = match summary {
        Ok(summary) => Some(summary),
        Err(err) => {
            warn!(error = %err, "summary unavailable");
            None
        }
    };

    let document = normalize_opened(&package, representations, &detection.descriptors, options)?;
    info!(
        descriptors = detection.descriptors.len(),
        failed_chunks = detection.failed_chunks.len(),
        elapsed_micros = start.elapsed().as_micros(),
        "analyze_complete"
    );
    Ok(AnalysisReport { document, detection, summary })
}

/// Fill a normalized document.
///
/// With an `oracle`, raw slots still present in the filled representations
/// are mapped to fields first and filled by span. Remaining `{{key}}`
/// markers are then replaced in every case.
pub async fn fill(
    request: FillRequest,
    oracle: Option<&dyn ResolutionOracle>,
    options: &Options,
) -> Result<FillOutput, FillError> {
    let mut job = FillJob::prepare(request, options)?;

    let mapping = match oracle {
        Some(oracle) => {
            let slots = engine::extract_all(&job.representations, &job.targets, options);
            let report = engine::map_slots(oracle, &slots, &job.fields, options).await;
            let values = engine::values_by_id(&report.mapping, &job.fields);
            for &representation in &job.targets {
                let text = job.representations.get_mut(representation);
                let filled = engine::fill_slots(text, representation, &slots, &values, options);
                job.report.absorb(&filled);
            }
            Some(report)
        }
        None => None,
    };

    job.finish(mapping, options)
}

/// Fill a normalized document by marker substitution only.
pub fn fill_markers_only(request: FillRequest, options: &Options) -> Result<FillOutput, FillError> {
    FillJob::prepare(request, options)?.finish(None, options)
}

fn normalize_opened(
    package: &DocumentPackage,
    mut representations: Representations,
    descriptors: &[PlaceholderDescriptor],
    options: &Options,
) -> Result<NormalizedDocument, PackageError> {
    let report = engine::normalize(&mut representations, descriptors, options);
    let package = package.repackage(&representations.packaged_markup)?;
    Ok(NormalizedDocument { representations, package, report })
}

struct FillJob {
    package: DocumentPackage,
    representations: Representations,
    fields: Vec<FieldValue>,
    mode: FillMode,
    has_plain_text: bool,
    /// Representations written by this request.
    targets: Vec<Representation>,
    report: FillReport,
    start: Instant,
}

impl FillJob {
    fn prepare(request: FillRequest, options: &Options) -> Result<Self, FillError> {
        let start = Instant::now();
        let bytes = request.package.ok_or(InputError::MissingPackage)?;
        let fields = request.fields.ok_or(InputError::MissingFields)?;
        if request.mode.contains(FillMode::PREVIEW) && request.styled_markup.is_none() {
            return Err(InputError::MissingStyledMarkup.into());
        }

        let package = DocumentPackage::open(bytes, &options.document_part).map_err(FillError::Unreadable)?;
        let has_plain_text = request.plain_text.is_some();
        let representations = Representations::new(
            request.plain_text.unwrap_or_default(),
            request.styled_markup.unwrap_or_default(),
            package.markup(),
        );

        let mut targets = Vec::with_capacity(3);
        if has_plain_text {
            targets.push(Representation::PlainText);
        }
        if request.mode.contains(FillMode::PREVIEW) {
            targets.push(Representation::StyledMarkup);
        }
        if request.mode.contains(FillMode::DOWNLOAD) {
            targets.push(Representation::PackagedMarkup);
        }

        Ok(FillJob {
            package,
            representations,
            fields,
            mode: request.mode,
            has_plain_text,
            targets,
            report: FillReport::default(),
            start,
        })
    }

    fn finish(mut self, mapping: Option<MappingReport>, options: &Options) -> Result<FillOutput, FillError> {
        for &representation in &self.targets {
            let text = self.representations.get_mut(representation);
            self.report.markers_replaced += engine::fill_markers(text, representation, &self.fields, options);
        }

        let package = if self.mode.contains(FillMode::DOWNLOAD) {
            Some(self.package.repackage(&self.representations.packaged_markup)?)
        } else {
            None
        };

        info!(
            mode = ?self.mode,
            fields = self.fields.len(),
            spans_applied = self.report.spans_applied,
            markers_replaced = self.report.markers_replaced,
            elapsed_micros = self.start.elapsed().as_micros(),
            "fill_complete"
        );

        let Representations { plain_text, styled_markup, .. } = self.representations;
        Ok(FillOutput {
            styled_markup: self.mode.contains(FillMode::PREVIEW).then_some(styled_markup),
            plain_text: self.has_plain_text.then_some(plain_text),
            package,
            report: self.report,
            mapping,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;
    use crate::error::OracleError;
    use crate::oracle::DetectionChunk;
    use crate::package::build_package;
    use async_trait::async_trait;

    const PART: &str = "word/document.xml";

    fn docx(body: &str) -> Vec<u8> {
        build_package(&[("[Content_Types].xml", "<Types/>"), (PART, body)])
    }

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
    fn mode_parses_known_names_only() {
        assert_eq!("Preview".parse::<FillMode>().unwrap(), FillMode::PREVIEW);
        assert_eq!("both".parse::<FillMode>().unwrap(), FillMode::PREVIEW | FillMode::DOWNLOAD);
        assert_eq!("pdf".parse::<FillMode>(), Err(InputError::UnknownMode("pdf".to_string())));
        assert_eq!(FillMode::default(), FillMode::BOTH);
    }

    #[test]
    fn missing_inputs_are_client_errors() {
        let options = Options::default();
        let no_package = FillRequest { fields: Some(vec![]), ..FillRequest::default() };
        let err = fill_markers_only(no_package, &options).unwrap_err();
        assert!(matches!(err, FillError::Input(InputError::MissingPackage)));
        assert!(err.is_client_error());

        let no_fields = FillRequest { package: Some(docx("<w:t/>")), ..FillRequest::default() };
        assert!(matches!(fill_markers_only(no_fields, &options), Err(FillError::Input(InputError::MissingFields))));

        let no_markup = FillRequest {
            package: Some(docx("<w:t/>")),
            fields: Some(vec![]),
            mode: FillMode::PREVIEW,
            ..FillRequest::default()
        };
        assert!(matches!(
            fill_markers_only(no_markup, &options),
            Err(FillError::Input(InputError::MissingStyledMarkup))
        ));

        let download_only = FillRequest {
            package: Some(docx("<w:t/>")),
            fields: Some(vec![]),
            mode: FillMode::DOWNLOAD,
            ..FillRequest::default()
        };
        assert!(fill_markers_only(download_only, &options).is_ok());
    }

    #[test]
    fn unreadable_upload_is_a_client_error() {
        let request = FillRequest {
            package: Some(b"not a zip".to_vec()),
            fields: Some(vec![]),
            mode: FillMode::DOWNLOAD,
            ..FillRequest::default()
        };
        let err = fill_markers_only(request, &Options::default()).unwrap_err();
        assert!(matches!(err, FillError::Unreadable(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn normalize_then_fill_package() {
        let body = r#"<w:p><w:r><w:t>Between [Company </w:t></w:r><w:r><w:t>Name] and [Company Name].</w:t></w:r></w:p>"#;
        let options = Options::default();
        let normalized = normalize_package(docx(body), &[descriptor("company_name", "[Company Name]", 2)], &options).unwrap();
        assert_eq!(normalized.representations.plain_text, "Between {{company_name}} and {{company_name}}.\n\n");
        assert_eq!(normalized.report.outcomes[0].replaced[&Representation::PackagedMarkup], 2);

        let request = FillRequest {
            package: Some(normalized.package),
            styled_markup: Some(normalized.representations.styled_markup),
            fields: Some(vec![FieldValue::new("company_name", "Acme & Co.")]),
            ..FillRequest::default()
        };
        let output = fill_markers_only(request, &options).unwrap();
        assert_eq!(output.styled_markup.as_deref(), Some("<p>Between Acme &amp; Co. and Acme &amp; Co..</p>"));
        assert_eq!(output.report.markers_replaced, 4);
        assert!(output.plain_text.is_none());

        let filled = DocumentPackage::open(output.package.unwrap(), PART).unwrap();
        assert_eq!(
            filled.markup(),
            r#"<w:p><w:r><w:t>Between Acme &amp; Co.</w:t></w:r><w:r><w:t> and Acme &amp; Co..</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn quoted_and_ampersand_patterns_reach_every_representation() {
        let body = r#"<w:p><w:r><w:t>Signed at [Investor's Address] for Smith &amp; Sons today.</w:t></w:r></w:p>"#;
        let descriptors = [descriptor("investor_address", "[Investor's Address]", 1), descriptor("firm", "Smith & Sons", 1)];
        let options = Options::default();
        let normalized = normalize_package(docx(body), &descriptors, &options).unwrap();

        for outcome in &normalized.report.outcomes {
            assert!(outcome.replaced.values().all(|&n| n == 1), "{}: {:?}", outcome.key, outcome.replaced);
        }
        let reps = &normalized.representations;
        assert_eq!(reps.plain_text, "Signed at {{investor_address}} for {{firm}} today.\n\n");
        assert_eq!(reps.styled_markup, "<p>Signed at {{investor_address}} for {{firm}} today.</p>");
        assert!(reps.packaged_markup.contains("Signed at {{investor_address}} for {{firm}} today."));

        let request = FillRequest {
            package: Some(normalized.package),
            styled_markup: Some(normalized.representations.styled_markup),
            fields: Some(vec![FieldValue::new("investor_address", "1 Main St"), FieldValue::new("firm", "O'Neil")]),
            mode: FillMode::PREVIEW,
            ..FillRequest::default()
        };
        let output = fill_markers_only(request, &options).unwrap();
        assert_eq!(output.styled_markup.as_deref(), Some("<p>Signed at 1 Main St for O&#39;Neil today.</p>"));
    }

    #[test]
    fn preview_only_skips_repackaging() {
        let request = FillRequest {
            package: Some(docx("<w:t>{{a}}</w:t>")),
            styled_markup: Some("<p>{{a}}</p>".to_string()),
            plain_text: Some("{{a}}".to_string()),
            fields: Some(vec![FieldValue::new("a", "x")]),
            mode: FillMode::PREVIEW,
        };
        let output = fill_markers_only(request, &Options::default()).unwrap();
        assert!(output.package.is_none());
        assert_eq!(output.styled_markup.as_deref(), Some("<p>x</p>"));
        assert_eq!(output.plain_text.as_deref(), Some("x"));
    }

    struct TitleResolver;

    #[async_trait]
    impl ResolutionOracle for TitleResolver {
        async fn resolve(&self, batch: engine::MappingBatch<'_>) -> Result<String, OracleError> {
            let pairs: Vec<String> = batch
                .slots
                .iter()
                .filter(|s| s.label_guess.as_deref() == Some("Title"))
                .map(|s| format!(r#""{}": "title""#, s.id))
                .collect();
            Ok(format!("{{{}}}", pairs.join(", ")))
        }
    }

    #[tokio::test]
    async fn oracle_mapped_slots_are_filled_by_span() {
        let request = FillRequest {
            package: Some(docx("<w:p><w:r><w:t>Title:</w:t></w:r></w:p>")),
            styled_markup: Some("<p>By: {{signer}}</p><p>Title:</p>".to_string()),
            fields: Some(vec![FieldValue::new("signer", "Ann"), FieldValue::new("title", "CEO")]),
            ..FillRequest::default()
        };
        let output = fill(request, Some(&TitleResolver), &Options::default()).await.unwrap();
        assert_eq!(output.styled_markup.as_deref(), Some("<p>By: Ann</p><p>Title: CEO</p>"));
        let filled = DocumentPackage::open(output.package.unwrap(), PART).unwrap();
        assert_eq!(filled.markup(), "<w:p><w:r><w:t>Title: CEO</w:t></w:r></w:p>");
        assert_eq!(output.report.spans_applied, 2);
        assert_eq!(output.mapping.unwrap().failed_batches(), 0);
    }

    struct FixedDetector;

    #[async_trait]
    impl DetectionOracle for FixedDetector {
        async fn detect(&self, _chunk: &DetectionChunk) -> Result<String, OracleError> {
            Ok(r#"{"placeholders": [{"key": "investor", "label": "Investor", "originalPattern": "[Investor]", "numberOfOccurrences": "1"}]}"#.to_string())
        }

        async fn summarize(&self, _excerpt: &str) -> Result<String, OracleError> {
            Err(OracleError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn analyze_normalizes_with_detected_descriptors() {
        let report = analyze(docx("<w:p><w:r><w:t>[Investor] signs</w:t></w:r></w:p>"), &FixedDetector, &Options::default())
            .await
            .unwrap();
        assert!(report.summary.is_none());
        assert_eq!(report.detection.descriptors.len(), 1);
        assert_eq!(report.document.representations.styled_markup, "<p>{{investor}} signs</p>");
        let normalized = DocumentPackage::open(report.document.package, PART).unwrap();
        assert_eq!(normalized.markup(), "<w:p><w:r><w:t>{{investor}} signs</w:t></w:r></w:p>");
    }
}
