//! Shared fixtures for lookup integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use larder_core::{InternalCodeMapping, LookupPayload, Product};
use larder_lookup::{
    BarcodeProvider, InventoryStore, LookupError, LookupPolicy, LookupResult, LookupService,
    ProviderList, RuntimeGuard, StoreError, StoreResult,
};

// =============================================================================
// In-Memory Store
// =============================================================================

/// Inventory store with the same barcode uniqueness rule as SQLite.
#[derive(Default)]
pub struct MemoryStore {
    products: Mutex<HashMap<String, Product>>,
    mappings: Mutex<HashMap<String, InternalCodeMapping>>,
    pub fail_reads: AtomicBool,
    pub create_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, product: Product) {
        self.products
            .lock()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn map_internal_code(&self, code: &str, product_id: &str, weight: Option<f64>) {
        self.mappings.lock().await.insert(
            code.to_string(),
            InternalCodeMapping {
                code: code.to_string(),
                product_id: product_id.to_string(),
                parsed_weight_grams: weight,
                created_at: chrono::Utc::now(),
            },
        );
    }

    pub async fn products(&self) -> Vec<Product> {
        self.products.lock().await.values().cloned().collect()
    }

    pub async fn by_barcode(&self, barcode: &str) -> Option<Product> {
        self.products
            .lock()
            .await
            .values()
            .find(|p| p.barcode.as_deref() == Some(barcode))
            .cloned()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn find_product_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read failed".into()));
        }
        Ok(self.by_barcode(barcode).await)
    }

    async fn find_product_by_internal_code(&self, code: &str) -> StoreResult<Option<Product>> {
        let Some(product_id) = self
            .mappings
            .lock()
            .await
            .get(code)
            .map(|m| m.product_id.clone())
        else {
            return Ok(None);
        };
        Ok(self.products.lock().await.get(&product_id).cloned())
    }

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut products = self.products.lock().await;

        if let Some(barcode) = &product.barcode {
            if products
                .values()
                .any(|p| p.barcode.as_deref() == Some(barcode.as_str()))
            {
                return Err(StoreError::Conflict {
                    barcode: barcode.clone(),
                });
            }
        }

        products.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let mut products = self.products.lock().await;
        match products.get_mut(&product.id) {
            Some(stored) => {
                *stored = product.clone();
                Ok(product)
            }
            None => Err(StoreError::Backend(format!("no product {}", product.id))),
        }
    }

    async fn internal_code_mapping(&self, code: &str) -> StoreResult<Option<InternalCodeMapping>> {
        Ok(self.mappings.lock().await.get(code).cloned())
    }
}

// =============================================================================
// Scripted Provider
// =============================================================================

#[derive(Clone)]
pub enum Script {
    Name(&'static str),
    Payload(LookupPayload),
    Nothing,
    Fail(u16),
    /// Undecodable body on the first call, then this name.
    BadBodyOnce(&'static str),
}

/// Provider that answers from a script after a fixed delay.
pub struct ScriptedProvider {
    id: &'static str,
    delay: Duration,
    script: Script,
    pub calls: AtomicU32,
    pub completed: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(id: &'static str, delay_ms: u64, script: Script) -> Arc<Self> {
        Arc::new(ScriptedProvider {
            id,
            delay: Duration::from_millis(delay_ms),
            script,
            calls: AtomicU32::new(0),
            completed: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarcodeProvider for ScriptedProvider {
    fn id(&self) -> &str {
        self.id
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        match &self.script {
            Script::Name(name) => Ok(Some(LookupPayload::new(barcode, *name))),
            Script::Payload(payload) => Ok(Some(payload.clone())),
            Script::Nothing => Ok(None),
            Script::Fail(status) => Err(LookupError::Status(*status)),
            Script::BadBodyOnce(_) if call == 1 => Err(LookupError::Decode("truncated JSON".into())),
            Script::BadBodyOnce(name) => Ok(Some(LookupPayload::new(barcode, *name))),
        }
    }
}

// =============================================================================
// Service Builders
// =============================================================================

/// Policy with no request spacing so timings stay easy to reason about.
pub fn test_policy() -> LookupPolicy {
    LookupPolicy {
        provider_spacing: Duration::ZERO,
        ..LookupPolicy::default()
    }
}

pub fn provider_list(providers: &[Arc<ScriptedProvider>]) -> ProviderList {
    providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn BarcodeProvider>)
        .collect()
}

pub fn service(store: Arc<MemoryStore>, providers: &[Arc<ScriptedProvider>]) -> LookupService {
    service_with_policy(store, providers, test_policy())
}

pub fn service_with_policy(
    store: Arc<MemoryStore>,
    providers: &[Arc<ScriptedProvider>],
    policy: LookupPolicy,
) -> LookupService {
    LookupService::new(
        store,
        provider_list(providers),
        policy,
        Arc::new(RuntimeGuard::new()),
    )
}
