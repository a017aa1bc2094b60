//! Validation errors for values that are about to be stored.
//!
//! Scan parsing never fails (unrecognised text is an internal code), and
//! resolution always ends in a `ScanResolution`, so this is the only error
//! type in the crate. Store, transport and config errors live in
//! `larder-db` and `larder-lookup`.

use thiserror::Error;

/// A field value the store refuses to write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    /// e.g. a barcode with letters in it.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}
