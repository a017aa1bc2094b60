//! # larder-db
//!
//! SQLite persistence for products and internal-code mappings.
//!
//! ```text
//! larder-lookup::InventoryStore
//!        │  implemented for Database
//!        ▼
//!   Database (pool.rs) ──┬── products()        products, UNIQUE(barcode)
//!        │               └── internal_codes()  internal_code_mappings, FK → products
//!        ▼
//!   SqlitePool (WAL) ──► <data dir>/larder.db
//! ```
//!
//! The schema ships inside the binary ([`migrations`]) and is applied when
//! the pool opens.
//!
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("larder.db")).await?;
//! let product = db.products().get_by_barcode("4601234567890").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::internal_code::InternalCodeRepository;
pub use repository::product::ProductRepository;
