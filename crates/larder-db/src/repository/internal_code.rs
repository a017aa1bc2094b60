//! # Internal Code Repository
//!
//! Maps store-internal labels (weighed goods, shelf codes) to products.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use larder_core::InternalCodeMapping;

#[derive(Debug, sqlx::FromRow)]
struct MappingRow {
    code: String,
    product_id: String,
    parsed_weight_grams: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<MappingRow> for InternalCodeMapping {
    fn from(row: MappingRow) -> Self {
        InternalCodeMapping {
            code: row.code,
            product_id: row.product_id,
            parsed_weight_grams: row.parsed_weight_grams,
            created_at: row.created_at,
        }
    }
}

/// Repository for internal code mappings.
#[derive(Debug, Clone)]
pub struct InternalCodeRepository {
    pool: SqlitePool,
}

impl InternalCodeRepository {
    /// Creates a new InternalCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InternalCodeRepository { pool }
    }

    /// Gets the mapping for an internal code.
    pub async fn get(&self, code: &str) -> DbResult<Option<InternalCodeMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT code, product_id, parsed_weight_grams, created_at \
             FROM internal_code_mappings WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InternalCodeMapping::from))
    }

    /// Inserts a mapping, or repoints an existing code at a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - `product_id` doesn't exist
    pub async fn upsert(&self, mapping: &InternalCodeMapping) -> DbResult<()> {
        debug!(code = %mapping.code, product_id = %mapping.product_id, "Upserting internal code");

        sqlx::query(
            r#"
            INSERT INTO internal_code_mappings (code, product_id, parsed_weight_grams, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(code) DO UPDATE SET
                product_id = excluded.product_id,
                parsed_weight_grams = excluded.parsed_weight_grams
            "#,
        )
        .bind(&mapping.code)
        .bind(&mapping.product_id)
        .bind(mapping.parsed_weight_grams)
        .bind(mapping.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbError};
    use larder_core::Product;

    fn mapping(code: &str, product_id: &str, grams: Option<f64>) -> InternalCodeMapping {
        InternalCodeMapping {
            code: code.to_string(),
            product_id: product_id.to_string(),
            parsed_weight_grams: grams,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_resolve_product() {
        let db = Database::in_memory().await.unwrap();
        let product = Product::template("4601234567890");
        db.products().insert(&product).await.unwrap();

        db.internal_codes()
            .upsert(&mapping("22-12345", &product.id, Some(500.0)))
            .await
            .unwrap();

        let stored = db.internal_codes().get("22-12345").await.unwrap().unwrap();
        assert_eq!(stored.product_id, product.id);
        assert_eq!(stored.parsed_weight_grams, Some(500.0));

        let mapped = db
            .products()
            .get_by_internal_code("22-12345")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapped.id, product.id);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_mapping() {
        let db = Database::in_memory().await.unwrap();
        let first = Product::template("4601234567890");
        let second = Product::template("4607654321098");
        db.products().insert(&first).await.unwrap();
        db.products().insert(&second).await.unwrap();

        let codes = db.internal_codes();
        codes.upsert(&mapping("A1", &first.id, None)).await.unwrap();
        codes.upsert(&mapping("A1", &second.id, Some(250.0))).await.unwrap();

        let stored = codes.get("A1").await.unwrap().unwrap();
        assert_eq!(stored.product_id, second.id);
        assert_eq!(stored.parsed_weight_grams, Some(250.0));
    }

    #[tokio::test]
    async fn test_mapping_requires_existing_product() {
        let db = Database::in_memory().await.unwrap();
        let err = db
            .internal_codes()
            .upsert(&mapping("A1", "missing-product", None))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.internal_codes().get("nope").await.unwrap().is_none());
        assert!(db
            .products()
            .get_by_internal_code("nope")
            .await
            .unwrap()
            .is_none());
    }
}
