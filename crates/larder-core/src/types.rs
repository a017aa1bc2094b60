//! # Domain Types
//!
//! Core domain types used throughout Larder.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ScanPayload   │   │  LookupPayload  │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Ean13          │──►│  barcode        │──►│  id (UUID)      │       │
//! │  │  DataMatrix     │   │  name, brand    │   │  barcode        │       │
//! │  │  InternalCode   │   │  category       │   │  name, brand    │       │
//! │  └─────────────────┘   │  nutrition      │   │  nutrition      │       │
//! │     per scan           └─────────────────┘   └────────┬────────┘       │
//! │                          provider answer              │                 │
//! │                                                       ▼                 │
//! │                                              ┌─────────────────┐       │
//! │                                              │ ScanResolution  │       │
//! │                                              │  Found          │       │
//! │                                              │  Created        │       │
//! │                                              │  NotFound       │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DEFAULT_CATEGORY;

// =============================================================================
// Unit Type
// =============================================================================

/// Unit a product is counted in by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Pieces.
    #[default]
    Pcs,
    /// Grams.
    G,
    /// Millilitres.
    Ml,
}

impl UnitType {
    /// Stable storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Pcs => "pcs",
            UnitType::G => "g",
            UnitType::Ml => "ml",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitType {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pcs" => Ok(UnitType::Pcs),
            "g" => Ok(UnitType::G),
            "ml" => Ok(UnitType::Ml),
            _ => Err(crate::ValidationError::NotAllowed {
                field: "unit".to_string(),
                allowed: vec!["pcs".into(), "g".into(), "ml".into()],
            }),
        }
    }
}

// =============================================================================
// Nutrition
// =============================================================================

/// Nutrition facts per 100 g. Every field is optional because providers
/// rarely report all four.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Nutrition {
    pub kcal: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
}

impl Nutrition {
    /// Nutrition with no known values.
    pub const EMPTY: Nutrition = Nutrition {
        kcal: None,
        protein: None,
        fat: None,
        carbs: None,
    };

    /// True when no value is known.
    pub fn is_empty(&self) -> bool {
        self.kcal.is_none() && self.protein.is_none() && self.fat.is_none() && self.carbs.is_none()
    }
}

// =============================================================================
// Product
// =============================================================================

/// An inventory product, owned by the inventory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// EAN-13 / GTIN barcode. Unique across the store when present.
    pub barcode: Option<String>,

    /// Display name.
    pub name: String,

    pub brand: Option<String>,

    /// Free-form category. [`DEFAULT_CATEGORY`] when unknown.
    pub category: String,

    pub default_unit: UnitType,

    pub nutrition: Nutrition,

    pub disliked: bool,

    pub may_contain_bones: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Builds a new product from a provider answer.
    pub fn from_payload(payload: &LookupPayload) -> Self {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            barcode: Some(payload.barcode.clone()),
            name: payload.name.clone(),
            brand: payload.brand.clone(),
            category: payload.category.clone(),
            default_unit: UnitType::Pcs,
            nutrition: payload.nutrition,
            disliked: false,
            may_contain_bones: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the minimal placeholder product for a barcode no provider knows.
    pub fn template(barcode: &str) -> Self {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            barcode: Some(barcode.to_string()),
            name: crate::template_product_name(barcode),
            brand: None,
            category: DEFAULT_CATEGORY.to_string(),
            default_unit: UnitType::Pcs,
            nutrition: Nutrition::EMPTY,
            disliked: false,
            may_contain_bones: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the descriptive fields with a provider answer, keeping
    /// identity and user preferences (disliked, bones, unit).
    pub fn apply_payload(&mut self, payload: &LookupPayload) {
        self.name = payload.name.clone();
        self.brand = payload.brand.clone();
        self.category = payload.category.clone();
        self.nutrition = payload.nutrition;
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Lookup Payload
// =============================================================================

/// A provider's candidate answer for a barcode. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupPayload {
    pub barcode: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    #[serde(default)]
    pub nutrition: Nutrition,
}

impl LookupPayload {
    /// Creates a payload with the default category and no nutrition.
    pub fn new(barcode: impl Into<String>, name: impl Into<String>) -> Self {
        LookupPayload {
            barcode: barcode.into(),
            name: name.into(),
            brand: None,
            category: DEFAULT_CATEGORY.to_string(),
            nutrition: Nutrition::EMPTY,
        }
    }
}

// =============================================================================
// Internal Code Mapping
// =============================================================================

/// Links a store-internal code (weighed goods labels, shelf codes) to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalCodeMapping {
    pub code: String,
    pub product_id: String,
    /// Weight recorded when the mapping was made. Preferred over the weight
    /// guessed from the scanned string.
    pub parsed_weight_grams: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Scan Payload
// =============================================================================

/// What the scanner saw, after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanPayload {
    /// Exactly 13 decimal digits.
    Ean13 { code: String },

    /// GS1 DataMatrix with at least one recognized Application Identifier.
    DataMatrix {
        raw: String,
        gtin: Option<String>,
        expiry_date: Option<NaiveDate>,
    },

    /// Anything else. The weight is a best-effort guess.
    InternalCode {
        code: String,
        parsed_weight_grams: Option<f64>,
    },
}

// =============================================================================
// Scan Resolution
// =============================================================================

/// The outcome of resolving one scan. Every resolve call ends in one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanResolution {
    /// The product already existed in the store.
    Found {
        product: Product,
        suggested_expiry: Option<NaiveDate>,
        parsed_weight_grams: Option<f64>,
    },

    /// The product was created during this resolution.
    Created {
        product: Product,
        suggested_expiry: Option<NaiveDate>,
        parsed_weight_grams: Option<f64>,
        /// Winning provider id, or [`crate::AUTO_TEMPLATE_PROVIDER`].
        provider: String,
    },

    /// Nothing usable. Carries whatever the scan itself revealed.
    NotFound {
        barcode: Option<String>,
        internal_code: Option<String>,
        parsed_weight_grams: Option<f64>,
        suggested_expiry: Option<NaiveDate>,
    },
}

impl ScanResolution {
    /// The resolved product, if any.
    pub fn product(&self) -> Option<&Product> {
        match self {
            ScanResolution::Found { product, .. } | ScanResolution::Created { product, .. } => {
                Some(product)
            }
            ScanResolution::NotFound { .. } => None,
        }
    }

    /// Short name of the outcome, for logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            ScanResolution::Found { .. } => "found",
            ScanResolution::Created { .. } => "created",
            ScanResolution::NotFound { .. } => "not_found",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_product() {
        let product = Product::template("4601234567890");
        assert_eq!(product.name, "Товар 4601234567890");
        assert_eq!(product.barcode.as_deref(), Some("4601234567890"));
        assert_eq!(product.category, DEFAULT_CATEGORY);
        assert!(product.nutrition.is_empty());
        assert!(product.brand.is_none());
    }

    #[test]
    fn test_apply_payload_keeps_identity() {
        let mut product = Product::template("4601234567890");
        product.disliked = true;
        let id = product.id.clone();

        let mut payload = LookupPayload::new("4601234567890", "Молоко 3.2%");
        payload.brand = Some("Простоквашино".into());
        payload.nutrition.kcal = Some(58.0);

        product.apply_payload(&payload);

        assert_eq!(product.id, id);
        assert!(product.disliked);
        assert_eq!(product.name, "Молоко 3.2%");
        assert_eq!(product.brand.as_deref(), Some("Простоквашино"));
        assert_eq!(product.nutrition.kcal, Some(58.0));
    }

    #[test]
    fn test_unit_type_round_trip() {
        assert_eq!("pcs".parse::<UnitType>().unwrap(), UnitType::Pcs);
        assert_eq!("ML".parse::<UnitType>().unwrap(), UnitType::Ml);
        assert!("kg".parse::<UnitType>().is_err());
        assert_eq!(UnitType::G.to_string(), "g");
    }

    #[test]
    fn test_resolution_json_tag() {
        let resolution = ScanResolution::NotFound {
            barcode: Some("4601234567890".into()),
            internal_code: None,
            parsed_weight_grams: None,
            suggested_expiry: None,
        };
        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(json["outcome"], "not_found");
        assert_eq!(resolution.outcome(), "not_found");
        assert!(resolution.product().is_none());
    }
}
