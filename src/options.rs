use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Options that affect normalization, slot mapping and rehydration.
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```json
/// { "mapping_batch_size": 25, "mapping_timeout_ms": 5000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Slots per resolution-oracle batch.
    pub mapping_batch_size: usize,
    /// Timeout applied to each batch independently.
    pub mapping_timeout_ms: u64,
    /// Issue mapping batches concurrently instead of one after another.
    pub concurrent_batches: bool,
    /// Detection oracle chunk length, in chars.
    pub detection_chunk_chars: usize,
    /// Overlap between consecutive detection chunks, in chars.
    pub detection_chunk_overlap: usize,
    pub detection_timeout_ms: u64,
    /// Leading plain-text chars handed to the summary oracle.
    pub summary_excerpt_chars: usize,
    /// Context window captured on each side of an occurrence, in chars.
    pub context_window: usize,
    /// Context window sent to the resolution oracle, in chars.
    pub oracle_window: usize,
    /// Local window for label-only splicing in plain text and styled markup.
    pub label_window_markup: usize,
    /// Local window for label-only splicing in packaged markup.
    pub label_window_package: usize,
    /// Compiled size limit for per-descriptor matchers, in bytes.
    pub regex_size_limit: usize,
    /// Name of the text-bearing part inside the package.
    pub document_part: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            mapping_batch_size: 40,
            mapping_timeout_ms: 20_000,
            concurrent_batches: false,
            detection_chunk_chars: 25_000,
            detection_chunk_overlap: 1_000,
            detection_timeout_ms: 60_000,
            summary_excerpt_chars: 2_000,
            context_window: 120,
            oracle_window: 90,
            label_window_markup: 50,
            label_window_package: 80,
            regex_size_limit: 1 << 20,
            document_part: "word/document.xml".to_string(),
        }
    }
}

impl Options {
    /// Parse options from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: Options = serde_json::from_str(json)?;
        Ok(options.validated())
    }

    /// Load options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Clamp values that would stall the pipeline.
    pub fn validated(mut self) -> Self {
        self.mapping_batch_size = self.mapping_batch_size.max(1);
        self.detection_chunk_chars = self.detection_chunk_chars.max(1);
        if self.detection_chunk_overlap >= self.detection_chunk_chars {
            self.detection_chunk_overlap = self.detection_chunk_chars - 1;
        }
        self
    }

    pub fn mapping_timeout(&self) -> Duration {
        Duration::from_millis(self.mapping_timeout_ms)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = Options::from_json_str(r#"{ "mapping_batch_size": 10 }"#).unwrap();
        assert_eq!(options.mapping_batch_size, 10);
        assert_eq!(options.mapping_timeout(), Duration::from_secs(20));
        assert_eq!(options.document_part, "word/document.xml");
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let options =
            Options::from_json_str(r#"{ "mapping_batch_size": 0, "detection_chunk_chars": 10, "detection_chunk_overlap": 10 }"#)
                .unwrap();
        assert_eq!(options.mapping_batch_size, 1);
        assert_eq!(options.detection_chunk_overlap, 9);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(Options::from_json_str("{ nope"), Err(ConfigError::Parse(_))));
    }
}
