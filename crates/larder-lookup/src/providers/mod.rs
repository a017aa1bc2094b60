//! # Barcode Providers
//!
//! Every data source answers the same question: "what is this barcode?".
//!
//! ## Provider Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lookup(barcode) → Result<Option<LookupPayload>, LookupError>           │
//! │                                                                         │
//! │    Ok(Some(payload))  the source knows the product                     │
//! │    Ok(None)           valid answer, no product (includes HTTP 404)     │
//! │    Err(LookupError)   transport failure: retried, breaker-counted      │
//! │                                                                         │
//! │  Registered providers (ids):                                           │
//! │    local_index          JSON file loaded at startup                    │
//! │    ean_db               authenticated REST API                         │
//! │    open_food_facts      open-data REST aggregator                      │
//! │    barcode_list         HTML search page scraper                       │
//! │    barcode_list_mirror  same page through a text-mirroring proxy       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payload quality is not the provider's job: the race runs every answer
//! through [`larder_core::validation::is_meaningful_name`].

pub mod barcode_list;
pub mod ean_db;
pub mod local;
pub mod mirror;
pub mod open_food_facts;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::config::ProviderSettings;
use crate::error::{LookupError, LookupResult};
use larder_core::LookupPayload;

pub use barcode_list::BarcodeListProvider;
pub use ean_db::EanDbProvider;
pub use local::LocalIndexProvider;
pub use mirror::BarcodeListMirrorProvider;
pub use open_food_facts::OpenFoodFactsProvider;

/// User agent sent by every HTTP provider.
pub const USER_AGENT: &str = concat!("larder/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Provider Trait
// =============================================================================

/// A source of product metadata keyed by barcode.
#[async_trait]
pub trait BarcodeProvider: Send + Sync {
    /// Stable id used for breaker state, spacing, logs, and `Created` results.
    fn id(&self) -> &str;

    /// Per-attempt timeout this provider prefers over the policy default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Looks up one barcode.
    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>>;
}

/// Shared, ordered provider list. Order only breaks ties.
pub type ProviderList = Vec<Arc<dyn BarcodeProvider>>;

// =============================================================================
// HTTP Helpers
// =============================================================================

/// Builds the HTTP client shared by every remote provider.
///
/// No client-level timeout: the race applies per-attempt timeouts.
pub fn http_client() -> LookupResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| LookupError::Network(e.to_string()))
}

/// GETs `url`. 404 is a miss, other non-success statuses are errors.
pub(crate) async fn get(client: &Client, url: Url) -> LookupResult<Option<reqwest::Response>> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    Ok(Some(response))
}

/// Trims a string and drops it when empty.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-empty entry of a comma-separated list ("Danone, Простоквашино").
pub(crate) fn first_token(value: Option<&str>) -> Option<String> {
    value?
        .split(',')
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Registry
// =============================================================================

/// Builds the provider list from configuration.
///
/// Disabled providers and providers whose endpoint fails validation are
/// left out with a log line; a broken provider never stops startup.
pub fn build_providers(settings: &ProviderSettings, client: Client) -> ProviderList {
    let mut providers: ProviderList = Vec::new();

    if let Some(path) = &settings.local_index_path {
        match LocalIndexProvider::load(path) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => warn!(path = %path.display(), error = %e, "Local index unavailable"),
        }
    }

    if settings.ean_db_enabled {
        match (settings.ean_db_key(), settings.checked_endpoint(&settings.ean_db_endpoint)) {
            (Some(key), Ok(endpoint)) => {
                providers.push(Arc::new(EanDbProvider::new(client.clone(), endpoint, key)))
            }
            (None, _) => warn!("EAN-DB enabled without an API key, skipping"),
            (_, Err(e)) => warn!(error = %e, "EAN-DB endpoint rejected"),
        }
    }

    if settings.open_food_facts_enabled {
        match settings.checked_endpoint(&settings.open_food_facts_endpoint) {
            Ok(base) => providers.push(Arc::new(OpenFoodFactsProvider::new(client.clone(), base))),
            Err(e) => warn!(error = %e, "Open Food Facts endpoint rejected"),
        }
    }

    let barcode_list_base = settings.checked_endpoint(&settings.barcode_list_endpoint);

    if settings.barcode_list_enabled {
        match &barcode_list_base {
            Ok(base) => providers.push(Arc::new(BarcodeListProvider::new(client.clone(), base.clone()))),
            Err(e) => warn!(error = %e, "barcode-list endpoint rejected"),
        }
    }

    if settings.barcode_list_mirror_enabled {
        let mirror_base = settings.checked_endpoint(&settings.mirror_base_url);
        match (&barcode_list_base, &mirror_base) {
            (Ok(page_base), Ok(mirror_base)) => providers.push(Arc::new(
                BarcodeListMirrorProvider::new(client, mirror_base.clone(), page_base.clone()),
            )),
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "Mirror endpoint rejected"),
        }
    }

    info!(
        providers = ?providers.iter().map(|p| p.id().to_string()).collect::<Vec<_>>(),
        "Lookup providers registered"
    );

    providers
}
