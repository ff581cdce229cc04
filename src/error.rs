//! Error types.
//!
//! Failures are isolated at the smallest unit that can absorb them:
//!
//! ```text
//! PatternCompileError ── skip one descriptor, keep normalizing
//! OracleError         ── one chunk/batch contributes nothing, keep going
//! InputError          ── client error at the request boundary
//! PackageError        ── fatal: no partial package is ever returned
//! ```

use std::time::Duration;
use thiserror::Error;

/// A descriptor's literal pattern could not be turned into a matcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot compile pattern {pattern:?}: {reason}")]
pub struct PatternCompileError {
    pub pattern: String,
    pub reason: String,
}

/// Soft failures of an external oracle call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("{label} timed out after {after:?}")]
    Timeout { label: String, after: Duration },

    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

/// Reading or re-serializing the document container.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to open package: {0}")]
    Open(#[source] zip::result::ZipError),

    #[error("package has no part named {0}")]
    MissingPart(String),

    #[error("package part {part} is not valid UTF-8")]
    Encoding {
        part: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("package markup is not well-formed: {0}")]
    Markup(#[from] quick_xml::Error),

    #[error("package i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write package: {0}")]
    Write(#[source] zip::result::ZipError),
}

/// Request boundary violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("missing packaged document")]
    MissingPackage,

    #[error("missing field values")]
    MissingFields,

    #[error("missing styled markup for preview")]
    MissingStyledMarkup,

    #[error("unknown fill mode '{0}' (expected preview, download or both)")]
    UnknownMode(String),
}

/// Errors surfaced by the fill and analyze entry points.
#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("package could not be read: {0}")]
    Unreadable(#[source] PackageError),

    #[error("repackaging failed: {0}")]
    Repackaging(#[from] PackageError),
}

impl FillError {
    /// Whether the failure is the caller's fault (a 4xx in HTTP terms).
    pub fn is_client_error(&self) -> bool {
        matches!(self, FillError::Input(_) | FillError::Unreadable(_))
    }
}

/// Errors that can occur when loading [`crate::Options`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
