//! Error types for package reading and writing

use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors that abort a package operation.
///
/// Per-cell and per-row problems are not errors: they degrade to
/// [`Diagnostic`](crate::Diagnostic)s and the operation keeps going.
#[derive(Debug, Error)]
pub enum PackageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    /// A required part (or a relationship entry pointing at one) is absent
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// A part exists but does not have the shape the engine relies on
    #[error("Malformed part {part}: {reason}")]
    MalformedPart { part: String, reason: String },

    /// A cell or row reference could not be parsed
    #[error("Malformed cell reference '{0}'")]
    MalformedReference(String),

    /// No legal, unique sheet name could be derived
    #[error("Could not derive a unique sheet name from '{0}'")]
    NameCollision(String),

    /// The caller raised its cancellation flag between records
    #[error("Operation cancelled after {completed} record(s)")]
    Cancelled { completed: usize },
}

impl PackageError {
    pub(crate) fn xml(part: impl Into<String>, source: quick_xml::Error) -> Self {
        PackageError::Xml {
            part: part.into(),
            source,
        }
    }

    pub(crate) fn malformed(part: impl Into<String>, reason: impl Into<String>) -> Self {
        PackageError::MalformedPart {
            part: part.into(),
            reason: reason.into(),
        }
    }
}
