//! # Validation Module
//!
//! Name-quality checks for provider answers and format checks for barcodes.
//!
//! ## Where Each Check Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Provider answer (larder-lookup race)                         │
//! │  └── is_meaningful_name: rejects "Поиск", "search:<code>", bare codes  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stored product (larder-lookup orchestrator)                  │
//! │  └── needs_enrichment: is the stored record still a placeholder?       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (larder-db)                                         │
//! │  ├── validate_barcode / validate_product_name before insert            │
//! │  └── UNIQUE(barcode) constraint                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use larder_core::validation::is_meaningful_name;
//!
//! assert!(is_meaningful_name("Молоко 3.2% 930 мл", "4601234567890"));
//! assert!(!is_meaningful_name("Поиск", "4601234567890"));
//! assert!(!is_meaningful_name("search:4601234567890", "4601234567890"));
//! ```

use crate::error::ValidationError;
use crate::types::Product;
use crate::DEFAULT_CATEGORY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Words that search pages and scrapers return instead of a product name.
const PLACEHOLDER_TOKENS: &[&str] = &["поиск", "search", "lookup", "штрих-код", "barcode"];

/// A name may carry this many characters around the bare barcode digits and
/// still count as "just the barcode".
const DIGIT_ECHO_SLACK: usize = 4;

// =============================================================================
// Provider Answer Validation
// =============================================================================

/// Returns true when `name` looks like a real product name for `barcode`.
///
/// ## Rules
/// All of these must hold:
/// - not empty after whitespace normalization
/// - not a placeholder token ("поиск", "search", ...) optionally followed by
///   punctuation and the barcode
/// - not the barcode itself
/// - contains at least one letter
/// - its digits are not the barcode when the name is at most 4 characters
///   longer than the barcode
pub fn is_meaningful_name(name: &str, barcode: &str) -> bool {
    let normalized = normalize_whitespace(name);
    if normalized.is_empty() {
        return false;
    }

    if is_placeholder(&normalized, barcode) {
        return false;
    }

    if normalized == barcode {
        return false;
    }

    if !normalized.chars().any(char::is_alphabetic) {
        return false;
    }

    let digits: String = normalized.chars().filter(|c| c.is_ascii_digit()).collect();
    let name_len = normalized.chars().count();
    let code_len = barcode.chars().count();
    if !barcode.is_empty() && digits == barcode && name_len.abs_diff(code_len) <= DIGIT_ECHO_SLACK {
        return false;
    }

    true
}

/// Returns true when a stored product is still a placeholder worth
/// re-querying providers for.
///
/// Either the name fails [`is_meaningful_name`], or the record looks exactly
/// like the auto-created template: default category, no brand, no
/// nutrition, and the barcode inside the name.
pub fn needs_enrichment(product: &Product, barcode: &str) -> bool {
    if !is_meaningful_name(&product.name, barcode) {
        return true;
    }

    let brand_empty = product
        .brand
        .as_deref()
        .map(|b| b.trim().is_empty())
        .unwrap_or(true);

    product.category == DEFAULT_CATEGORY
        && brand_empty
        && product.nutrition.is_empty()
        && product.name.contains(barcode)
}

fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A placeholder is a generic token surrounded only by punctuation and
/// copies of the barcode: "Поиск", "search:4601234567890",
/// "4601234567890 - Штрих-код: 4601234567890".
fn is_placeholder(normalized: &str, barcode: &str) -> bool {
    let residual = if barcode.is_empty() {
        normalized.to_string()
    } else {
        normalized.replace(barcode, " ")
    };
    let residual = residual
        .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .to_lowercase();

    residual.is_empty() || PLACEHOLDER_TOKENS.contains(&residual.as_str())
}

// =============================================================================
// Barcode Validators
// =============================================================================

/// Validates a product barcode before it is stored.
///
/// ## Rules
/// - Must not be empty
/// - Digits only
/// - 8 to 14 digits (EAN-8 up to GTIN-14)
///
/// ## Example
/// ```rust
/// use larder_core::validation::validate_barcode;
///
/// assert!(validate_barcode("4601234567890").is_ok());
/// assert!(validate_barcode("46-01").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain digits only".to_string(),
        });
    }

    if !(8..=14).contains(&barcode.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must be 8 to 14 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty after trimming
///
/// Length is not limited: provider names are stored as given.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
