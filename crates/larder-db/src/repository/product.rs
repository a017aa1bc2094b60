//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Row Mapping
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │ products (SQLite)            │        │ larder_core::Product         │
//! │ ──────────────────────────── │        │ ──────────────────────────── │
//! │ default_unit TEXT            │ ─────► │ default_unit: UnitType       │
//! │ kcal, protein, fat, carbs    │ ─────► │ nutrition: Nutrition         │
//! │ disliked INTEGER             │ ─────► │ disliked: bool               │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! Barcodes are UNIQUE: inserting a second product with the same code fails
//! with [`DbError::UniqueViolation`], which callers turn into a read-back.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use larder_core::validation::{validate_barcode, validate_product_name};
use larder_core::{Nutrition, Product, UnitType};

const PRODUCT_COLUMNS: &str = "id, barcode, name, brand, category, default_unit, \
     kcal, protein, fat, carbs, disliked, may_contain_bones, created_at, updated_at";

// =============================================================================
// Row Type
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    barcode: Option<String>,
    name: String,
    brand: Option<String>,
    category: String,
    default_unit: String,
    kcal: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    disliked: bool,
    may_contain_bones: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let default_unit: UnitType = row.default_unit.parse()?;
        Ok(Product {
            id: row.id,
            barcode: row.barcode,
            name: row.name,
            brand: row.brand,
            category: row.category,
            default_unit,
            nutrition: Nutrition {
                kcal: row.kcal,
                protein: row.protein,
                fat: row.fat,
                carbs: row.carbs,
            },
            disliked: row.disliked,
            may_contain_bones: row.may_contain_bones,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_barcode("4601234567890").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets a product by its barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        debug!(barcode = %barcode, "Looking up product by barcode");

        let sql = format!("SELECT {} FROM products WHERE barcode = ?1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets the product an internal code is mapped to.
    pub async fn get_by_internal_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = \
             (SELECT product_id FROM internal_code_mappings WHERE code = ?1)",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The inserted product
    /// * `Err(DbError::UniqueViolation)` - Barcode already exists
    /// * `Err(DbError::Validation)` - Malformed barcode or empty name
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, barcode = ?product.barcode, "Inserting product");

        validate_product_name(&product.name)?;
        if let Some(barcode) = product.barcode.as_deref() {
            validate_barcode(barcode)?;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                id, barcode, name, brand, category, default_unit,
                kcal, protein, fat, carbs,
                disliked, may_contain_bones, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.default_unit.as_str())
        .bind(product.nutrition.kcal)
        .bind(product.nutrition.protein)
        .bind(product.nutrition.fat)
        .bind(product.nutrition.carbs)
        .bind(product.disliked)
        .bind(product.may_contain_bones)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(product.clone()),
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { field, .. } => Err(DbError::UniqueViolation {
                    field,
                    value: product.barcode.clone().unwrap_or_default(),
                }),
                other => Err(other),
            },
        }
    }

    /// Updates an existing product's descriptive fields and preferences.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        validate_product_name(&product.name)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                barcode = ?2,
                name = ?3,
                brand = ?4,
                category = ?5,
                default_unit = ?6,
                kcal = ?7,
                protein = ?8,
                fat = ?9,
                carbs = ?10,
                disliked = ?11,
                may_contain_bones = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.default_unit.as_str())
        .bind(product.nutrition.kcal)
        .bind(product.nutrition.protein)
        .bind(product.nutrition.fat)
        .bind(product.nutrition.carbs)
        .bind(product.disliked)
        .bind(product.may_contain_bones)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
