//! Error types for the Leadform crate.

use thiserror::Error;

/// Terminal failure of a single submission workflow.
///
/// Every variant is recovered locally: the controller notifies the user,
/// clears its loading flag and accepts the next submit attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A required field was blank or missing
    #[error("validation failed: {0}")]
    Validation(String),

    /// The anti-abuse provider produced no token
    #[error("anti-abuse token unavailable")]
    TokenUnavailable,

    /// The network submission failed or returned a non-success status
    #[error("submission failed: {0}")]
    Transport(String),
}

/// Main error type for Leadform operations.
#[derive(Error, Debug)]
pub enum LeadformError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Form schema errors, reported at construction
    #[error("Form schema error: {0}")]
    Schema(String),

    /// Key-value storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Submission workflow errors
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Result type alias for Leadform operations.
pub type Result<T> = std::result::Result<T, LeadformError>;
