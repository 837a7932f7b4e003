//! Error types for the idealfit system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the idealfit system.
#[derive(Error, Debug)]
pub enum Error {
    /// A required dataset holds no series.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Reference and candidate x-domains cannot be compared pointwise.
    #[error("Domain mismatch: {0}")]
    DomainMismatch(String),

    /// A fit table entry names a candidate the catalog does not contain.
    #[error("Candidate lookup failed: reference series '{reference}' selected '{candidate}', which is not in the candidate dataset")]
    CandidateLookup {
        /// Reference series owning the entry.
        reference: String,
        /// Candidate name that could not be resolved.
        candidate: String,
    },

    /// Data error (dataset invariant violated).
    #[error("Data error: {0}")]
    Data(String),

    /// Delimited-text input could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an empty dataset error.
    pub fn empty_dataset(msg: impl Into<String>) -> Self {
        Error::EmptyDataset(msg.into())
    }

    /// Create a domain mismatch error.
    pub fn domain_mismatch(msg: impl Into<String>) -> Self {
        Error::DomainMismatch(msg.into())
    }

    /// Create a candidate lookup error.
    pub fn candidate_lookup(reference: impl Into<String>, candidate: impl Into<String>) -> Self {
        Error::CandidateLookup {
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_lookup_message() {
        let err = Error::candidate_lookup("Y1", "Y42");
        let msg = err.to_string();
        assert!(msg.contains("'Y1'"));
        assert!(msg.contains("'Y42'"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
