//! # larder-core: Pure Scan Logic for Larder
//!
//! This crate holds everything about scan resolution that can be decided
//! without touching a database or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Scanner front end (larder-scan)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ resolve(raw_code)                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            larder-lookup (race, guard, orchestrator)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │   scan    │  │ validation│                  │   │
//! │  │   │  Product  │  │  EAN-13   │  │ name rules│                  │   │
//! │  │   │ Resolution│  │  GS1 DM   │  │ enrichment│                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, LookupPayload, ScanResolution, etc.)
//! - [`scan`] - Raw scanner text to [`ScanPayload`]
//! - [`validation`] - Provider payload and barcode validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::scan::parse;
//! use larder_core::ScanPayload;
//!
//! match parse("010460123456789017260228") {
//!     ScanPayload::DataMatrix { gtin, expiry_date, .. } => {
//!         assert_eq!(gtin.as_deref(), Some("4601234567890"));
//!         assert!(expiry_date.is_some());
//!     }
//!     other => panic!("unexpected payload: {:?}", other),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod scan;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Category assigned when a provider (or the template path) has nothing better.
pub const DEFAULT_CATEGORY: &str = "Продукты";

/// Provider id reported when a product was created from the placeholder
/// template instead of a provider hit.
pub const AUTO_TEMPLATE_PROVIDER: &str = "auto_template";

/// Builds the placeholder product name used when no provider knows a barcode.
pub fn template_product_name(barcode: &str) -> String {
    format!("Товар {}", barcode)
}
