//! # Inventory Store
//!
//! The narrow persistence surface the orchestrator needs. The SQLite
//! implementation lives here so `larder-db` stays free of lookup types.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use larder_core::{InternalCodeMapping, Product};
use larder_db::Database;

/// Product and internal-code persistence consumed by [`crate::LookupService`].
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>>;

    async fn find_product_by_internal_code(&self, code: &str) -> StoreResult<Option<Product>>;

    /// Inserts a new product.
    ///
    /// ## Errors
    /// [`StoreError::Conflict`] when a product with the same barcode exists.
    async fn create_product(&self, product: Product) -> StoreResult<Product>;

    async fn update_product(&self, product: Product) -> StoreResult<Product>;

    async fn internal_code_mapping(&self, code: &str) -> StoreResult<Option<InternalCodeMapping>>;
}

#[async_trait]
impl InventoryStore for Database {
    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>> {
        Ok(self.products().get_by_barcode(barcode).await?)
    }

    async fn find_product_by_internal_code(&self, code: &str) -> StoreResult<Option<Product>> {
        Ok(self.products().get_by_internal_code(code).await?)
    }

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        Ok(self.products().insert(&product).await?)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        self.products().update(&product).await?;
        Ok(product)
    }

    async fn internal_code_mapping(&self, code: &str) -> StoreResult<Option<InternalCodeMapping>> {
        Ok(self.internal_codes().get(code).await?)
    }
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use larder_core::LookupPayload;

    #[tokio::test]
    async fn test_database_store_reports_conflict() {
        let db = Database::in_memory().await.unwrap();
        let store: &dyn InventoryStore = &db;

        let created = store
            .create_product(Product::template("4601234567890"))
            .await
            .unwrap();
        let err = store
            .create_product(Product::template("4601234567890"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let found = store
            .find_product_by_barcode("4601234567890")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_database_store_update_and_mapping() {
        let db = Database::in_memory().await.unwrap();
        let store: &dyn InventoryStore = &db;

        let mut product = store
            .create_product(Product::template("4601234567890"))
            .await
            .unwrap();
        product.apply_payload(&LookupPayload::new("4601234567890", "Ряженка 4%"));
        let updated = store.update_product(product.clone()).await.unwrap();
        assert_eq!(updated.name, "Ряженка 4%");

        db.internal_codes()
            .upsert(&InternalCodeMapping {
                code: "2000123".into(),
                product_id: product.id.clone(),
                parsed_weight_grams: Some(450.0),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mapping = store.internal_code_mapping("2000123").await.unwrap().unwrap();
        assert_eq!(mapping.parsed_weight_grams, Some(450.0));

        let mapped = store
            .find_product_by_internal_code("2000123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapped.name, "Ряженка 4%");
        assert!(store.internal_code_mapping("2000999").await.unwrap().is_none());
    }
}
