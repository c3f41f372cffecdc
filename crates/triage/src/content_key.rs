//! Solution file naming and deduplication keys.
//!
//! The fuzzer stores every objective as a raw input named after its content
//! hash and one or more metadata files named `.<hash><delimiter><variant>.metadata`.
//! Several metadata variants may point at the same crashing input; the
//! content key maps them back to that one artifact.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Deduplication key derived from a metadata file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    /// Wraps an already-derived key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File naming convention of a solutions directory.
///
/// The delimiter changed between fuzzer revisions (`-` in early runs, `_`
/// later), so it is configured here once and used everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKeyConvention {
    /// Leading character that hides metadata files.
    pub marker: char,
    /// Metadata file suffix.
    pub suffix: String,
    /// Separator between the content hash and the variant tag.
    pub delimiter: char,
}

impl Default for ContentKeyConvention {
    fn default() -> Self {
        Self {
            marker: '.',
            suffix: ".metadata".to_string(),
            delimiter: '_',
        }
    }
}

impl ContentKeyConvention {
    /// Returns a copy using a different hash/variant delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Checks that the convention can produce non-empty keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the suffix is empty or the delimiter
    /// collides with the marker or a path separator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        if self.delimiter == self.marker {
            return Err(ConfigError::DelimiterIsMarker(self.delimiter));
        }
        if std::path::is_separator(self.delimiter) {
            return Err(ConfigError::DelimiterIsPathSeparator(self.delimiter));
        }
        Ok(())
    }

    /// Returns true for names of the form `<marker>...<suffix>`.
    #[must_use]
    pub fn is_metadata_file(&self, file_name: &str) -> bool {
        file_name.len() > self.marker.len_utf8() + self.suffix.len()
            && file_name.starts_with(self.marker)
            && file_name.ends_with(self.suffix.as_str())
    }

    /// Derives the content key from a metadata file name.
    ///
    /// Returns `None` when nothing is left after stripping the marker,
    /// suffix and variant tag.
    #[must_use]
    pub fn derive(&self, file_name: &str) -> Option<ContentKey> {
        let stem = file_name
            .strip_suffix(self.suffix.as_str())
            .unwrap_or(file_name);
        let stem = stem.strip_prefix(self.marker).unwrap_or(stem);
        let key = stem.split(self.delimiter).next().unwrap_or_default();

        (!key.is_empty()).then(|| ContentKey::new(key))
    }

    /// Path of the raw input a content key refers to.
    #[must_use]
    pub fn artifact_path(&self, dir: &Path, key: &ContentKey) -> PathBuf {
        dir.join(key.as_str())
    }
}
