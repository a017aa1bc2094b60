//! Local barcode index: a JSON file read once at startup.
//!
//! ```json
//! {
//!   "4601234567890": {
//!     "name": "Молоко 3.2% 930 мл",
//!     "brand": "Простоквашино",
//!     "category": "Молочные продукты",
//!     "nutrition": { "kcal": 60.0, "protein": 3.0, "fat": 3.2, "carbs": 4.7 }
//!   }
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{non_empty, BarcodeProvider};
use crate::error::{LookupError, LookupResult};
use larder_core::{LookupPayload, Nutrition, DEFAULT_CATEGORY};

/// One index entry.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub nutrition: Nutrition,
}

/// Read-only in-memory barcode index.
#[derive(Debug, Default)]
pub struct LocalIndexProvider {
    entries: HashMap<String, IndexEntry>,
}

impl LocalIndexProvider {
    pub const ID: &'static str = "local_index";

    /// Reads and decodes the index file.
    pub fn load(path: &Path) -> LookupResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LookupError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let entries: HashMap<String, IndexEntry> = serde_json::from_str(&contents)?;

        info!(path = %path.display(), entries = entries.len(), "Local barcode index loaded");
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: HashMap<String, IndexEntry>) -> Self {
        LocalIndexProvider { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BarcodeProvider for LocalIndexProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let Some(entry) = self.entries.get(barcode) else {
            return Ok(None);
        };
        let Some(name) = non_empty(Some(&entry.name)) else {
            return Ok(None);
        };

        Ok(Some(LookupPayload {
            barcode: barcode.to_string(),
            name,
            brand: non_empty(entry.brand.as_deref()),
            category: non_empty(entry.category.as_deref())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            nutrition: entry.nutrition,
        }))
    }
}
