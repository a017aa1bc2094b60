//! # Repository Module
//!
//! Database repository implementations for Larder.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InventoryStore impl (larder-lookup)                                   │
//! │       │                                                                 │
//! │       │  db.products().get_by_barcode("4601234567890")                 │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id / get_by_barcode / get_by_internal_code                 │
//! │  ├── insert (UniqueViolation on a duplicate barcode)                   │
//! │  ├── update                                                            │
//! │  └── count                                                             │
//! │                                                                         │
//! │  InternalCodeRepository                                                │
//! │  ├── get                                                               │
//! │  └── upsert                                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod internal_code;
pub mod product;
