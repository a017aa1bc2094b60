//! # Lookup Service
//!
//! Turns a raw scan into a [`ScanResolution`]. Never fails: every error is
//! folded into the resolution.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raw ──► scan::parse                                                    │
//! │           │                                                             │
//! │           ├── InternalCode ──► mapping? ──► Found (mapping weight wins) │
//! │           │                         └────► NotFound { internal_code }  │
//! │           │                                                             │
//! │           ├── DataMatrix without GTIN ──► NotFound { expiry }           │
//! │           │                                                             │
//! │           └── barcode                                                   │
//! │                 │                                                       │
//! │                 ├── stored? ──► enrich if placeholder ──► Found         │
//! │                 │                                                       │
//! │                 ├── read-only and negative-cached ──► NotFound          │
//! │                 │                                                       │
//! │                 └── race providers                                      │
//! │                       Hit    create ──► Created { provider }            │
//! │                              read-only ──► NotFound (cache cleared)     │
//! │                       Miss   create ──► Created { auto_template }       │
//! │                              read-only ──► NotFound (cache saved)       │
//! │                       Failed / store error                              │
//! │                              create ──► read or create template         │
//! │                              read-only ──► NotFound (cache saved)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Creation is idempotent: a barcode conflict from the store means a
//! concurrent scan created the product first, and that record is returned.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LookupPolicy;
use crate::error::{StoreError, StoreResult};
use crate::guard::RuntimeGuard;
use crate::providers::ProviderList;
use crate::race::{ProviderRace, RaceOutcome};
use crate::store::InventoryStore;
use larder_core::validation::needs_enrichment;
use larder_core::{scan, Product, ScanPayload, ScanResolution, AUTO_TEMPLATE_PROVIDER};

/// Scan context carried into every resolution for one barcode.
#[derive(Debug, Clone)]
struct ScanContext {
    barcode: String,
    suggested_expiry: Option<NaiveDate>,
}

/// Outcome of the barcode path before it is turned into a resolution.
enum BarcodeStep {
    Done(ScanResolution),
    /// The race failed or the store misbehaved; take the fallback path.
    Fallback,
}

// =============================================================================
// Lookup Service
// =============================================================================

/// Resolves scans against the inventory store and the provider race.
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn InventoryStore>,
    race: ProviderRace,
}

impl LookupService {
    /// Creates a service.
    ///
    /// ## Arguments
    /// * `store` - Product persistence
    /// * `providers` - Registered providers, in tie-break order
    /// * `policy` - Timing and resilience policy
    /// * `guard` - Shared breaker, spacing, and negative-cache state
    pub fn new(
        store: Arc<dyn InventoryStore>,
        providers: ProviderList,
        policy: LookupPolicy,
        guard: Arc<RuntimeGuard>,
    ) -> Self {
        LookupService {
            store,
            race: ProviderRace::new(providers, guard, policy),
        }
    }

    pub fn guard(&self) -> &Arc<RuntimeGuard> {
        self.race.guard()
    }

    /// [`Self::resolve`] with creation allowed.
    pub async fn resolve_or_create(&self, raw: &str) -> ScanResolution {
        self.resolve(raw, true).await
    }

    /// Resolves one raw scan.
    ///
    /// ## Arguments
    /// * `raw` - Scanner output: EAN-13 digits, a GS1 DataMatrix string, or
    ///   a store-internal code
    /// * `allow_create` - Create missing products (from a provider answer or
    ///   a template); when false, misses are remembered in the negative cache
    ///
    /// ## Returns
    /// Always a resolution. Store and provider errors are logged and folded
    /// into `Found`, `Created`, or `NotFound`.
    pub async fn resolve(&self, raw: &str, allow_create: bool) -> ScanResolution {
        let payload = scan::parse(raw);
        debug!(?payload, allow_create, "Resolving scan");

        match payload {
            ScanPayload::Ean13 { code } => {
                let context = ScanContext {
                    barcode: code,
                    suggested_expiry: None,
                };
                self.resolve_barcode(context, allow_create).await
            }
            ScanPayload::DataMatrix {
                gtin: Some(gtin),
                expiry_date,
                ..
            } => {
                let context = ScanContext {
                    barcode: gtin,
                    suggested_expiry: expiry_date,
                };
                self.resolve_barcode(context, allow_create).await
            }
            ScanPayload::DataMatrix {
                gtin: None,
                expiry_date,
                ..
            } => {
                debug!("DataMatrix without GTIN");
                ScanResolution::NotFound {
                    barcode: None,
                    internal_code: None,
                    parsed_weight_grams: None,
                    suggested_expiry: expiry_date,
                }
            }
            ScanPayload::InternalCode {
                code,
                parsed_weight_grams,
            } => self.resolve_internal_code(code, parsed_weight_grams).await,
        }
    }

    // =========================================================================
    // Barcode Path
    // =========================================================================

    async fn resolve_barcode(&self, context: ScanContext, allow_create: bool) -> ScanResolution {
        match self.try_resolve_barcode(&context, allow_create).await {
            Ok(BarcodeStep::Done(resolution)) => resolution,
            Ok(BarcodeStep::Fallback) => self.fallback(&context, allow_create).await,
            Err(e) => {
                warn!(barcode = %context.barcode, error = %e, "Store failure during lookup");
                self.fallback(&context, allow_create).await
            }
        }
    }

    async fn try_resolve_barcode(
        &self,
        context: &ScanContext,
        allow_create: bool,
    ) -> StoreResult<BarcodeStep> {
        let barcode = context.barcode.as_str();
        let guard = self.race.guard();

        if let Some(product) = self.store.find_product_by_barcode(barcode).await? {
            let product = self.enrich_if_needed(product, barcode).await;
            guard.clear(barcode).await;
            return Ok(BarcodeStep::Done(found(product, context)));
        }

        if !allow_create && guard.is_cached(barcode).await {
            debug!(barcode = %barcode, "Negative cache hit, skipping providers");
            return Ok(BarcodeStep::Done(not_found(context)));
        }

        match self.race.run(barcode).await {
            RaceOutcome::Hit {
                provider_id,
                payload,
            } => {
                guard.clear(barcode).await;
                if !allow_create {
                    debug!(barcode = %barcode, provider = %provider_id, "Read-only hit discarded");
                    return Ok(BarcodeStep::Done(not_found(context)));
                }

                let product = self.create_idempotent(Product::from_payload(&payload)).await?;
                info!(barcode = %barcode, provider = %provider_id, "Product created from provider");
                Ok(BarcodeStep::Done(created(product, context, provider_id)))
            }
            RaceOutcome::Miss => {
                if !allow_create {
                    guard
                        .save(barcode, self.race.policy().negative_cache_ttl)
                        .await;
                    return Ok(BarcodeStep::Done(not_found(context)));
                }

                let product = self.create_idempotent(Product::template(barcode)).await?;
                guard.clear(barcode).await;
                info!(barcode = %barcode, "Template product created");
                Ok(BarcodeStep::Done(created(
                    product,
                    context,
                    AUTO_TEMPLATE_PROVIDER.to_string(),
                )))
            }
            RaceOutcome::Failed => Ok(BarcodeStep::Fallback),
        }
    }

    /// Re-queries providers for a stored placeholder and applies a hit.
    ///
    /// A failed update keeps the stored record as it was.
    async fn enrich_if_needed(&self, product: Product, barcode: &str) -> Product {
        if !needs_enrichment(&product, barcode) {
            return product;
        }

        debug!(barcode = %barcode, product_id = %product.id, "Enriching placeholder product");
        let RaceOutcome::Hit {
            provider_id,
            payload,
        } = self.race.run(barcode).await
        else {
            return product;
        };

        let mut enriched = product.clone();
        enriched.apply_payload(&payload);
        match self.store.update_product(enriched).await {
            Ok(updated) => {
                info!(barcode = %barcode, provider = %provider_id, "Product enriched");
                updated
            }
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Enrichment update failed");
                product
            }
        }
    }

    /// Creates a product, resolving a barcode conflict to the stored record.
    async fn create_idempotent(&self, product: Product) -> StoreResult<Product> {
        let barcode = product.barcode.clone();
        match self.store.create_product(product).await {
            Ok(product) => Ok(product),
            Err(StoreError::Conflict { barcode: conflicting }) => {
                debug!(barcode = %conflicting, "Concurrent create detected, reading back");
                let existing = match barcode.as_deref() {
                    Some(barcode) => self.store.find_product_by_barcode(barcode).await?,
                    None => None,
                };
                existing.ok_or(StoreError::Conflict {
                    barcode: conflicting,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Last-resort path after a failed race or a store error.
    async fn fallback(&self, context: &ScanContext, allow_create: bool) -> ScanResolution {
        let barcode = context.barcode.as_str();
        let guard = self.race.guard();

        if !allow_create {
            guard
                .save(barcode, self.race.policy().negative_cache_ttl)
                .await;
            return not_found(context);
        }

        match self.store.find_product_by_barcode(barcode).await {
            Ok(Some(product)) => {
                guard.clear(barcode).await;
                return found(product, context);
            }
            Ok(None) => {}
            Err(e) => warn!(barcode = %barcode, error = %e, "Fallback read failed"),
        }

        match self.create_idempotent(Product::template(barcode)).await {
            Ok(product) => {
                guard.clear(barcode).await;
                info!(barcode = %barcode, "Template product created after provider failure");
                created(product, context, AUTO_TEMPLATE_PROVIDER.to_string())
            }
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Fallback create failed");
                not_found(context)
            }
        }
    }

    // =========================================================================
    // Internal Code Path
    // =========================================================================

    async fn resolve_internal_code(
        &self,
        code: String,
        parsed_weight_grams: Option<f64>,
    ) -> ScanResolution {
        let mapped = match self.lookup_internal_code(&code).await {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!(code = %code, error = %e, "Internal code lookup failed");
                None
            }
        };

        match mapped {
            Some((product, mapping_weight)) => ScanResolution::Found {
                product,
                suggested_expiry: None,
                parsed_weight_grams: mapping_weight.or(parsed_weight_grams),
            },
            None => ScanResolution::NotFound {
                barcode: None,
                internal_code: Some(code),
                parsed_weight_grams,
                suggested_expiry: None,
            },
        }
    }

    async fn lookup_internal_code(&self, code: &str) -> StoreResult<Option<(Product, Option<f64>)>> {
        let Some(mapping) = self.store.internal_code_mapping(code).await? else {
            return Ok(None);
        };
        let product = self.store.find_product_by_internal_code(code).await?;
        Ok(product.map(|product| (product, mapping.parsed_weight_grams)))
    }
}

// =============================================================================
// Resolution Builders
// =============================================================================

fn found(product: Product, context: &ScanContext) -> ScanResolution {
    ScanResolution::Found {
        product,
        suggested_expiry: context.suggested_expiry,
        parsed_weight_grams: None,
    }
}

fn created(product: Product, context: &ScanContext, provider: String) -> ScanResolution {
    ScanResolution::Created {
        product,
        suggested_expiry: context.suggested_expiry,
        parsed_weight_grams: None,
        provider,
    }
}

fn not_found(context: &ScanContext) -> ScanResolution {
    ScanResolution::NotFound {
        barcode: Some(context.barcode.clone()),
        internal_code: None,
        parsed_weight_grams: None,
        suggested_expiry: context.suggested_expiry,
    }
}
