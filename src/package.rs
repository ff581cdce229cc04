//! The document container.
//!
//! A package is a zip archive. Only one part (by default
//! `word/document.xml`) carries text; every other entry is copied through
//! byte for byte when the package is rewritten.

use crate::error::PackageError;
use std::io::{Cursor, Read, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone)]
pub struct DocumentPackage {
    bytes: Vec<u8>,
    part: String,
    markup: String,
}

impl DocumentPackage {
    /// Open `bytes` and read the text-bearing `part`.
    pub fn open(bytes: Vec<u8>, part: &str) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(PackageError::Open)?;
        let mut raw = Vec::new();
        archive
            .by_name(part)
            .map_err(|err| match err {
                ZipError::FileNotFound => PackageError::MissingPart(part.to_string()),
                other => PackageError::Open(other),
            })?
            .read_to_end(&mut raw)?;
        let markup =
            String::from_utf8(raw).map_err(|source| PackageError::Encoding { part: part.to_string(), source })?;

        tracing::debug!(part, entries = archive.len(), markup_bytes = markup.len(), "package opened");
        drop(archive);
        Ok(DocumentPackage { bytes, part: part.to_string(), markup })
    }

    /// The text-bearing part as read from the package.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn part_name(&self) -> &str {
        &self.part
    }

    /// The original package bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Re-serialize the package with `markup` as the text-bearing part.
    ///
    /// Entries are written in their original order. The rewritten part is
    /// deflated; all other entries are raw-copied without recompression.
    pub fn repackage(&self, markup: &str) -> Result<Vec<u8>, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice())).map_err(PackageError::Open)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(PackageError::Open)?;
            if entry.name() == self.part {
                drop(entry);
                writer.start_file(self.part.as_str(), options).map_err(PackageError::Write)?;
                writer.write_all(markup.as_bytes())?;
            } else {
                writer.raw_copy_file(entry).map_err(PackageError::Write)?;
            }
        }

        let out = writer.finish().map_err(PackageError::Write)?.into_inner();
        tracing::debug!(part = %self.part, bytes = out.len(), "package rewritten");
        Ok(out)
    }
}

/// Build an in-memory package from `(name, content)` pairs.
#[cfg(test)]
pub(crate) fn build_package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
