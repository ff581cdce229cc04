//! Contracts for the external oracles and lenient parsing of their replies.
//!
//! Oracles return raw response text. Everything loosely typed is parsed here
//! into validated structures; malformed entries are dropped, never passed on.

use crate::engine::MappingBatch;
use crate::error::OracleError;
use crate::intake::descriptors_from_value;
use crate::options::Options;
use crate::{Mapping, PlaceholderDescriptor, text};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// One slice of the document handed to the detection oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionChunk {
    pub index: usize,
    pub total: usize,
    /// `full` for a single-chunk document, else `chunk_<index>`.
    pub label: String,
    pub plain_text: String,
    pub packaged_markup: String,
}

/// Finds placeholder definitions and summarizes documents.
#[async_trait]
pub trait DetectionOracle: Send + Sync {
    async fn detect(&self, chunk: &DetectionChunk) -> Result<String, OracleError>;

    async fn summarize(&self, excerpt: &str) -> Result<String, OracleError>;
}

/// Maps a batch of slots to field keys. The reply is a JSON object of
/// `slot id -> field key`.
#[async_trait]
pub trait ResolutionOracle: Send + Sync {
    async fn resolve(&self, batch: MappingBatch<'_>) -> Result<String, OracleError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionReport {
    /// Descriptors from every chunk, concatenated in chunk order.
    pub descriptors: Vec<PlaceholderDescriptor>,
    pub chunks: usize,
    /// Labels of chunks that timed out, failed or returned garbage.
    pub failed_chunks: Vec<String>,
}

/// Split the document into detection chunks.
///
/// Both texts go in one chunk while each fits the limit. Otherwise they are
/// cut at the same char offsets, stepping `chunk - overlap` through the plain
/// text.
pub(crate) fn detection_chunks(plain_text: &str, packaged_markup: &str, options: &Options) -> Vec<DetectionChunk> {
    let max = options.detection_chunk_chars.max(1);
    let text_chars = plain_text.chars().count();

    if text_chars <= max && packaged_markup.chars().count() <= max {
        return vec![DetectionChunk {
            index: 0,
            total: 1,
            label: "full".to_string(),
            plain_text: plain_text.to_string(),
            packaged_markup: packaged_markup.to_string(),
        }];
    }

    let step = max.saturating_sub(options.detection_chunk_overlap).max(1);
    let slice = |s: &str, from: usize| {
        let start = text::byte_offset_of_char(s, from);
        let end = text::byte_offset_of_char(s, from + max);
        s[start..end].to_string()
    };

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        chunks.push(DetectionChunk {
            index: chunks.len(),
            total: 0,
            label: format!("chunk_{}", chunks.len()),
            plain_text: slice(plain_text, start),
            packaged_markup: slice(packaged_markup, start),
        });
        start += step;
        if start >= text_chars {
            break;
        }
    }
    let total = chunks.len();
    for chunk in &mut chunks {
        chunk.total = total;
    }
    chunks
}

/// Run the detection oracle over every chunk, each under its own timeout.
pub async fn detect_placeholders(
    oracle: &dyn DetectionOracle,
    plain_text: &str,
    packaged_markup: &str,
    options: &Options,
) -> DetectionReport {
    let chunks = detection_chunks(plain_text, packaged_markup, options);
    let timeout = options.detection_timeout();
    let mut report = DetectionReport { chunks: chunks.len(), ..DetectionReport::default() };

    for chunk in &chunks {
        let reply = match tokio::time::timeout(timeout, oracle.detect(chunk)).await {
            Ok(reply) => reply,
            Err(_) => Err(OracleError::Timeout { label: chunk.label.clone(), after: timeout }),
        };
        match reply.and_then(|raw| parse_detection_response(&raw)) {
            Ok(found) => {
                debug!(chunk = %chunk.label, descriptors = found.len(), "detection chunk parsed");
                report.descriptors.extend(found);
            }
            Err(err) => {
                warn!(chunk = %chunk.label, error = %err, "detection chunk contributed nothing");
                report.failed_chunks.push(chunk.label.clone());
            }
        }
    }

    info!(
        chunks = report.chunks,
        failed_chunks = report.failed_chunks.len(),
        descriptors = report.descriptors.len(),
        "detect_placeholders_complete"
    );
    report
}

/// Ask for a short summary of the document's opening text.
pub async fn summarize(oracle: &dyn DetectionOracle, plain_text: &str, options: &Options) -> Result<String, OracleError> {
    let excerpt = text::head_chars(plain_text, options.summary_excerpt_chars);
    let timeout = options.detection_timeout();
    let summary = tokio::time::timeout(timeout, oracle.summarize(excerpt))
        .await
        .map_err(|_| OracleError::Timeout { label: "summary".to_string(), after: timeout })??;
    Ok(regex!(r"[\r\n]+").replace_all(summary.trim(), " ").into_owned())
}

/// Parse a detection reply: `{"placeholders": [...]}` or a bare array.
pub fn parse_detection_response(raw: &str) -> Result<Vec<PlaceholderDescriptor>, OracleError> {
    let value = parse_lenient_json(raw)?;
    Ok(descriptors_from_value(&value))
}

/// Parse a resolution reply into a mapping. Accepts a flat object or one
/// nested under `"mapping"`; non-string values are dropped.
pub fn parse_mapping_response(raw: &str) -> Result<Mapping, OracleError> {
    let value = parse_lenient_json(raw)?;
    let object = match &value {
        Value::Object(map) => match map.get("mapping") {
            Some(Value::Object(inner)) => inner,
            _ => map,
        },
        other => return Err(OracleError::Malformed(format!("expected a JSON object, got {}", kind_of(other)))),
    };

    Ok(object
        .iter()
        .filter_map(|(id, key)| match key {
            Value::String(key) if !key.trim().is_empty() => Some((id.clone(), key.trim().to_string())),
            _ => None,
        })
        .collect())
}

/// Strip Markdown fences, then parse. On failure, strip control chars and
/// try once more.
fn parse_lenient_json(raw: &str) -> Result<Value, OracleError> {
    let content = raw.replace("```json", "").replace("```", "");
    let content = content.trim();
    match serde_json::from_str(content) {
        Ok(value) => Ok(value),
        Err(_) => {
            let sanitized: String = content.chars().filter(|c| !matches!(c, '\u{0}'..='\u{1f}')).collect();
            serde_json::from_str(&sanitized).map_err(|err| OracleError::Malformed(err.to_string()))
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn fenced_json_with_raw_newlines_in_strings_parses() {
        let raw = "```json\n{\"placeholders\": [{\"key\": \"name\", \"label\": \"Na\nme\", \"originalPattern\": \"[Name]\", \"numberOfOccurrences\": \"2\"}]}\n```";
        let found = parse_detection_response(raw).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "Name");
        assert_eq!(found[0].occurrence_count, 2);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_detection_response("sorry, no JSON"), Err(OracleError::Malformed(_))));
        assert!(matches!(parse_mapping_response("[1, 2]"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn mapping_keeps_only_string_values() {
        let parsed = parse_mapping_response(r#"{"h0001": "company", "h0002": 7, "h0003": null, "x0001": " ceo "}"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["x0001"], "ceo");
        let nested = parse_mapping_response(r#"{"mapping": {"t0001": "a"}}"#).unwrap();
        assert_eq!(nested["t0001"], "a");
    }

    #[test]
    fn small_documents_are_one_chunk() {
        let chunks = detection_chunks("short", "<w:t>short</w:t>", &Options::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].label, "full");
    }

    #[test]
    fn long_documents_are_chunked_with_overlap() {
        let options = Options { detection_chunk_chars: 10, detection_chunk_overlap: 2, ..Options::default() };
        let text = "abcdefghijklmnopqrstuvwxy";
        let chunks = detection_chunks(text, "", &options);
        let starts: Vec<&str> = chunks.iter().map(|c| c.plain_text.as_str()).collect();
        assert_eq!(starts, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxy", "y"]);
        assert!(chunks.iter().all(|c| c.total == 4));
        assert_eq!(chunks[3].label, "chunk_3");
    }

    struct Scripted {
        replies: Mutex<Vec<Result<String, OracleError>>>,
        delay_chunk: Option<usize>,
    }

    #[async_trait]
    impl DetectionOracle for Scripted {
        async fn detect(&self, chunk: &DetectionChunk) -> Result<String, OracleError> {
            let reply = self.replies.lock().unwrap().remove(0);
            if self.delay_chunk == Some(chunk.index) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            reply
        }

        async fn summarize(&self, excerpt: &str) -> Result<String, OracleError> {
            Ok(format!("Summary of\n\n{} chars.\r\n", excerpt.chars().count()))
        }
    }

    #[tokio::test]
    async fn failed_chunks_contribute_nothing() {
        let options = Options {
            detection_chunk_chars: 10,
            detection_chunk_overlap: 0,
            detection_timeout_ms: 50,
            ..Options::default()
        };
        let ok = |key: &str| -> Result<String, OracleError> {
            Ok(format!(r#"{{"placeholders": [{{"key": "{key}", "label": "L", "originalPattern": "[{key}]", "numberOfOccurrences": 1}}]}}"#))
        };
        let oracle = Scripted {
            replies: Mutex::new(vec![ok("a"), Err(OracleError::Unavailable("down".into())), ok("c"), ok("d")]),
            delay_chunk: Some(2),
        };
        let report = detect_placeholders(&oracle, &"x".repeat(40), "", &options).await;
        let keys: Vec<&str> = report.descriptors.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(report.chunks, 4);
        assert_eq!(report.failed_chunks, vec!["chunk_1", "chunk_2"]);
        assert_eq!(keys, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn summary_collapses_line_breaks() {
        let oracle = Scripted { replies: Mutex::new(Vec::new()), delay_chunk: None };
        let options = Options { summary_excerpt_chars: 5, ..Options::default() };
        let summary = summarize(&oracle, "a long document", &options).await.unwrap();
        assert_eq!(summary, "Summary of 5 chars.");
    }
}
