//! # Lookup Error Types
//!
//! Error types for provider calls, the inventory store, and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Lookup Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  LookupError    │  │   StoreError    │  │     ConfigError         │ │
//! │  │  (transport)    │  │                 │  │                         │ │
//! │  │  Timeout        │  │  Conflict       │  │  InvalidValue           │ │
//! │  │  Network        │  │  Backend        │  │  InvalidEndpoint        │ │
//! │  │  Status         │  │                 │  │  LoadFailed             │ │
//! │  │  Decode         │  │                 │  │  SaveFailed             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  LookupError is retried and counted by the circuit breaker.            │
//! │  StoreError::Conflict is recovered by reading the existing row back.   │
//! │  Neither escapes LookupService::resolve.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use larder_db::DbError;
use thiserror::Error;

/// Result type alias for provider calls.
pub type LookupResult<T> = Result<T, LookupError>;

// =============================================================================
// Lookup Error
// =============================================================================

/// Transport failure while asking a provider about a barcode.
///
/// "Valid answer, no product" is never an error: providers return `Ok(None)`.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The per-attempt timer fired first.
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure, reset.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status other than 404.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// The body could not be read or decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Local data source could not be read.
    #[error("Local source unavailable: {0}")]
    Unavailable(String),
}
