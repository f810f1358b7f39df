//! Upload validation
//!
//! Rejects uploads that are too large or not in an accepted audio format
//! before anything is written to disk.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::types::AudioUpload;

/// Extensions accepted regardless of configuration
pub const BASELINE_FORMATS: [&str; 8] = ["wav", "webm", "mp3", "ogg", "flac", "aiff", "aif", "m4a"];

/// Checks uploads against size and format constraints
#[derive(Debug, Clone)]
pub struct AudioValidator {
    max_file_size_mb: u64,
    allowed: BTreeSet<String>,
}

impl AudioValidator {
    /// Create a validator from a size limit and a configured allow-list
    ///
    /// The baseline formats are always added to the allow-list.
    #[must_use]
    pub fn new<I, S>(max_file_size_mb: u64, configured: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = configured
            .into_iter()
            .map(|f| f.as_ref().trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .chain(BASELINE_FORMATS.iter().map(ToString::to_string))
            .collect();

        Self {
            max_file_size_mb,
            allowed,
        }
    }

    /// Create a validator from the speech configuration
    #[must_use]
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.max_file_size_mb, config.allowed_formats())
    }

    /// Accepted extensions in sorted order
    pub fn allowed_formats(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    /// Validate an upload, returning the extension it will be stored under
    ///
    /// # Errors
    ///
    /// - `FileTooLarge` if the upload exceeds the size limit
    /// - `FormatUnsupported` if the extension is empty or not accepted
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self, upload: &AudioUpload) -> Result<String, SpeechError> {
        let size_mb = upload.size_mb();
        if size_mb > self.max_file_size_mb as f64 {
            return Err(SpeechError::FileTooLarge {
                size_mb,
                max_mb: self.max_file_size_mb,
            });
        }

        let extension = Self::resolve_extension(upload);
        if extension.is_empty() || !self.allowed.contains(&extension) {
            return Err(SpeechError::FormatUnsupported {
                extension,
                allowed: self.allowed_formats().collect::<Vec<_>>().join(", "),
            });
        }

        debug!(extension = %extension, size_mb, "Upload accepted");
        Ok(extension)
    }

    /// Extension of the upload, falling back to the MIME subtype
    ///
    /// When neither the filename nor the MIME table yields an extension and
    /// the declared type is `audio/*` or `video/*`, its subtype is used.
    #[must_use]
    pub fn resolve_extension(upload: &AudioUpload) -> String {
        let extension = upload.extension().to_ascii_lowercase();
        if !extension.is_empty() {
            return extension;
        }

        let content_type = upload.content_type().to_ascii_lowercase();
        if content_type.contains("audio/") || content_type.contains("video/") {
            return content_type
                .split_once('/')
                .and_then(|(_, subtype)| subtype.split(';').next())
                .map(|subtype| subtype.trim().to_string())
                .unwrap_or_default();
        }

        String::new()
    }
}
