//! # larder-lookup: Scan Resolution for Larder
//!
//! Resolves scanned codes into products by racing unreliable product
//! databases, protected by a shared circuit breaker, request spacing, and a
//! negative cache.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Lookup Service Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 LookupService (orchestrator)                     │  │
//! │  │  parse → local store → race → create / enrich → ScanResolution   │  │
//! │  └──────────────┬───────────────────────────────┬───────────────────┘  │
//! │                 │                               │                       │
//! │                 ▼                               ▼                       │
//! │  ┌────────────────────────────┐   ┌──────────────────────────────┐    │
//! │  │ ProviderRace               │   │ InventoryStore               │    │
//! │  │ one task per provider      │   │ larder_db::Database          │    │
//! │  │ timeout + linear retry     │   │ idempotent create            │    │
//! │  │ first valid hit wins       │   └──────────────────────────────┘    │
//! │  └──────────────┬─────────────┘                                        │
//! │                 │                                                       │
//! │     ┌───────────┴────────────┐                                          │
//! │     ▼                        ▼                                          │
//! │  ┌────────────────┐  ┌─────────────────────────────────────────────┐   │
//! │  │ RuntimeGuard   │  │ BarcodeProvider impls                       │   │
//! │  │ breaker        │  │ local_index, ean_db, open_food_facts,       │   │
//! │  │ spacing        │  │ barcode_list, barcode_list_mirror           │   │
//! │  │ negative cache │  └─────────────────────────────────────────────┘   │
//! │  └────────────────┘                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - TOML + environment configuration, runtime policy
//! - [`error`] - Provider, store, and config errors
//! - [`guard`] - Circuit breaker, request spacing, negative cache
//! - [`orchestrator`] - `LookupService::resolve`
//! - [`providers`] - Provider trait and implementations
//! - [`race`] - First-hit-wins provider race
//! - [`retry`] - Linear retry schedule
//! - [`store`] - Inventory persistence trait
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use larder_db::{Database, DbConfig};
//! use larder_lookup::{build_providers, http_client, LookupConfig, LookupService, RuntimeGuard};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LookupConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let providers = build_providers(&config.providers, http_client()?);
//!
//! let service = LookupService::new(
//!     Arc::new(db),
//!     providers,
//!     config.policy(),
//!     Arc::new(RuntimeGuard::new()),
//! );
//! let resolution = service.resolve_or_create("4601234567890").await;
//! println!("{}", resolution.outcome());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod providers;
pub mod race;
pub mod retry;
pub mod store;

pub use config::{LookupConfig, LookupPolicy};
pub use error::{ConfigError, LookupError, LookupResult, StoreError, StoreResult};
pub use guard::{ProviderState, RuntimeGuard};
pub use orchestrator::LookupService;
pub use providers::{build_providers, http_client, BarcodeProvider, ProviderList};
pub use race::{ProviderOutcome, ProviderRace, RaceOutcome};
pub use store::InventoryStore;
