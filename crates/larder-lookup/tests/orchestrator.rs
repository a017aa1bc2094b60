//! End-to-end resolution tests with an in-memory store and scripted providers.

mod common;

use chrono::NaiveDate;
use std::time::Duration;

use common::{
    provider_list, service, service_with_policy, test_policy, MemoryStore, Script,
    ScriptedProvider,
};
use larder_core::{LookupPayload, Nutrition, Product, ScanResolution, AUTO_TEMPLATE_PROVIDER};
use larder_db::Database;
use larder_lookup::{LookupConfig, LookupService, RuntimeGuard};
use std::sync::Arc;

const CODE: &str = "4601234567890";

// =============================================================================
// Creation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_barcode_without_providers_creates_template() {
    let store = MemoryStore::new();
    let service = service(store.clone(), &[]);

    let resolution = service.resolve_or_create(CODE).await;

    match resolution {
        ScanResolution::Created {
            product, provider, ..
        } => {
            assert_eq!(product.name, "Товар 4601234567890");
            assert_eq!(provider, AUTO_TEMPLATE_PROVIDER);
        }
        other => panic!("expected Created, got {:?}", other),
    }
    assert_eq!(store.products().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_datamatrix_carries_expiry_into_created_product() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("open_food_facts", 20, Script::Name("Молоко 3.2%"));
    let service = service(store.clone(), &[provider.clone()]);

    let resolution = service.resolve_or_create("010460123456789017260228").await;

    match resolution {
        ScanResolution::Created {
            product,
            provider,
            suggested_expiry,
            ..
        } => {
            assert_eq!(product.barcode.as_deref(), Some(CODE));
            assert_eq!(product.name, "Молоко 3.2%");
            assert_eq!(provider, "open_food_facts");
            assert_eq!(suggested_expiry, NaiveDate::from_ymd_opt(2026, 2, 28));
        }
        other => panic!("expected Created, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_creates_store_one_product() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 50, Script::Name("Творог 5%"));
    let service = service(store.clone(), &[provider]);

    let (first, second) = tokio::join!(
        service.resolve_or_create(CODE),
        service.resolve_or_create(CODE)
    );

    let first_id = first.product().map(|p| p.id.clone());
    let second_id = second.product().map(|p| p.id.clone());
    assert!(first_id.is_some());
    assert_eq!(first_id, second_id);
    assert_eq!(store.products().await.len(), 1);
    assert_eq!(store.create_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fast_provider_wins_and_slow_is_cancelled() {
    let store = MemoryStore::new();
    let slow = ScriptedProvider::new("barcode_list", 800, Script::Name("Медленный сыр"));
    let fast = ScriptedProvider::new("local_index", 10, Script::Name("Сыр Российский"));
    let service = service(store.clone(), &[slow.clone(), fast.clone()]);

    let resolution = service.resolve_or_create(CODE).await;

    match &resolution {
        ScanResolution::Created {
            product, provider, ..
        } => {
            assert_eq!(provider, "local_index");
            assert_eq!(product.name, "Сыр Российский");
        }
        other => panic!("expected Created, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(slow.calls(), 1);
    assert_eq!(slow.completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_first_answer_is_retried_into_created_product() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::BadBodyOnce("Сметана 20%"));
    let service = service(store.clone(), &[provider.clone()]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Created {
            product, provider, ..
        } => {
            assert_eq!(provider, "ean_db");
            assert_eq!(product.name, "Сметана 20%");
        }
        other => panic!("expected Created, got {:?}", other),
    }
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_answers_fall_back_to_template() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("barcode_list", 5, Script::Name("Поиск"));
    let service = service(store.clone(), &[provider]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Created {
            product, provider, ..
        } => {
            assert_eq!(provider, AUTO_TEMPLATE_PROVIDER);
            assert_eq!(product.name, "Товар 4601234567890");
        }
        other => panic!("expected Created, got {:?}", other),
    }
}

// =============================================================================
// Read-Only Mode and Negative Cache
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_negative_cache_skips_providers_until_expiry() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("open_food_facts", 5, Script::Nothing);
    let service = service(store.clone(), &[provider.clone()]);

    let resolution = service.resolve(CODE, false).await;
    assert!(matches!(resolution, ScanResolution::NotFound { ref barcode, .. } if barcode.as_deref() == Some(CODE)));
    assert_eq!(provider.calls(), 1);

    service.resolve(CODE, false).await;
    assert_eq!(provider.calls(), 1);

    tokio::time::advance(Duration::from_secs(181)).await;
    service.resolve(CODE, false).await;
    assert_eq!(provider.calls(), 2);
    assert!(store.products().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_mode_clears_negative_cache() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("open_food_facts", 5, Script::Nothing);
    let service = service(store.clone(), &[provider.clone()]);

    service.resolve(CODE, false).await;
    assert!(service.guard().is_cached(CODE).await);

    let created = service.resolve_or_create(CODE).await;
    assert_eq!(created.outcome(), "created");
    assert!(!service.guard().is_cached(CODE).await);

    // The stored template still needs enrichment, so providers run again.
    let calls_before = provider.calls();
    let found = service.resolve(CODE, false).await;
    assert_eq!(found.outcome(), "found");
    assert_eq!(provider.calls(), calls_before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_only_hit_is_discarded() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::Name("Йогурт клубничный"));
    let service = service(store.clone(), &[provider]);

    let resolution = service.resolve(CODE, false).await;

    assert!(matches!(resolution, ScanResolution::NotFound { .. }));
    assert!(store.products().await.is_empty());
    assert!(!service.guard().is_cached(CODE).await);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_breaker_stops_calling_failing_provider() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::Fail(503));
    let mut policy = test_policy();
    policy.max_attempts = 1;
    policy.breaker_failure_threshold = 2;
    policy.breaker_cooldown = Duration::from_secs(60);
    let service = service_with_policy(store, &[provider.clone()], policy);

    service.resolve("4600000000001", false).await;
    service.resolve("4600000000002", false).await;
    assert_eq!(provider.calls(), 2);

    service.resolve("4600000000003", false).await;
    assert_eq!(provider.calls(), 2);

    tokio::time::advance(Duration::from_secs(60)).await;
    service.resolve("4600000000004", false).await;
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_race_read_only_saves_negative_cache() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::Fail(401));
    let service = service(store.clone(), &[provider]);

    let resolution = service.resolve(CODE, false).await;

    assert!(matches!(resolution, ScanResolution::NotFound { .. }));
    assert!(service.guard().is_cached(CODE).await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_race_create_mode_falls_back_to_template() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::Fail(401));
    let service = service(store.clone(), &[provider]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Created { provider, .. } => assert_eq!(provider, AUTO_TEMPLATE_PROVIDER),
        other => panic!("expected Created, got {:?}", other),
    }
    assert!(store.by_barcode(CODE).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_store_read_failure_falls_back_to_create() {
    let store = MemoryStore::new();
    store
        .fail_reads
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let provider = ScriptedProvider::new("ean_db", 5, Script::Name("Не будет спрошен"));
    let service = service(store.clone(), &[provider.clone()]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Created { provider, .. } => assert_eq!(provider, AUTO_TEMPLATE_PROVIDER),
        other => panic!("expected Created, got {:?}", other),
    }
    assert_eq!(provider.calls(), 0);

    let read_only = service.resolve("4607654321098", false).await;
    assert!(matches!(read_only, ScanResolution::NotFound { .. }));
}

// =============================================================================
// Stored Products
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stored_template_is_enriched() {
    let store = MemoryStore::new();
    let template = Product::template(CODE);
    store.insert(template.clone()).await;

    let payload = LookupPayload {
        brand: Some("Вкусвилл".into()),
        category: "Молочные продукты".into(),
        nutrition: Nutrition {
            kcal: Some(60.0),
            ..Nutrition::EMPTY
        },
        ..LookupPayload::new(CODE, "Молоко 2.5%")
    };
    let provider = ScriptedProvider::new("open_food_facts", 5, Script::Payload(payload));
    let service = service(store.clone(), &[provider]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Found { product, .. } => {
            assert_eq!(product.id, template.id);
            assert_eq!(product.name, "Молоко 2.5%");
            assert_eq!(product.brand.as_deref(), Some("Вкусвилл"));
        }
        other => panic!("expected Found, got {:?}", other),
    }

    let stored = store.by_barcode(CODE).await.unwrap();
    assert_eq!(stored.category, "Молочные продукты");
    assert_eq!(stored.nutrition.kcal, Some(60.0));
}

#[tokio::test(start_paused = true)]
async fn test_real_product_is_returned_without_provider_calls() {
    let store = MemoryStore::new();
    store
        .insert(Product::from_payload(&LookupPayload::new(CODE, "Кефир 1%")))
        .await;
    let provider = ScriptedProvider::new("open_food_facts", 5, Script::Name("Другое имя"));
    let service = service(store, &[provider.clone()]);

    let resolution = service.resolve(CODE, false).await;

    assert_eq!(resolution.product().map(|p| p.name.as_str()), Some("Кефир 1%"));
    assert_eq!(provider.calls(), 0);
}

// =============================================================================
// Non-Barcode Scans
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_internal_code_prefers_mapping_weight() {
    let store = MemoryStore::new();
    let product = Product::from_payload(&LookupPayload::new("4601111111111", "Свинина шейка"));
    store.insert(product.clone()).await;
    store.map_internal_code("2400450", &product.id, Some(512.0)).await;
    let service = service(store, &[]);

    match service.resolve_or_create("2400450").await {
        ScanResolution::Found {
            product: found,
            parsed_weight_grams,
            ..
        } => {
            assert_eq!(found.id, product.id);
            assert_eq!(parsed_weight_grams, Some(512.0));
        }
        other => panic!("expected Found, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unmapped_internal_code_is_not_found() {
    let store = MemoryStore::new();
    let service = service(store, &[]);

    assert_eq!(
        service.resolve_or_create("2400450").await,
        ScanResolution::NotFound {
            barcode: None,
            internal_code: Some("2400450".into()),
            parsed_weight_grams: Some(450.0),
            suggested_expiry: None,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_datamatrix_without_gtin_is_not_found_with_expiry() {
    let store = MemoryStore::new();
    let service = service(store.clone(), &[]);

    let resolution = service.resolve_or_create("17260228").await;

    assert_eq!(
        resolution,
        ScanResolution::NotFound {
            barcode: None,
            internal_code: None,
            parsed_weight_grams: None,
            suggested_expiry: NaiveDate::from_ymd_opt(2026, 2, 28),
        }
    );
    assert!(store.products().await.is_empty());
}

// =============================================================================
// SQLite Store
// =============================================================================

fn sqlite_service(db: Database, providers: &[Arc<ScriptedProvider>]) -> LookupService {
    LookupService::new(
        Arc::new(db),
        provider_list(providers),
        test_policy(),
        Arc::new(RuntimeGuard::new()),
    )
}

#[tokio::test]
async fn test_long_provider_name_is_stored_with_its_provider() {
    let name = "Молоко ".repeat(30);
    let db = Database::in_memory().await.unwrap();
    let provider = ScriptedProvider::new(
        "open_food_facts",
        1,
        Script::Payload(LookupPayload::new(CODE, name.clone())),
    );
    let service = sqlite_service(db.clone(), &[provider]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Created {
            product, provider, ..
        } => {
            assert_eq!(provider, "open_food_facts");
            assert_eq!(product.name, name);
        }
        other => panic!("expected Created, got {:?}", other),
    }

    let stored = db.products().get_by_barcode(CODE).await.unwrap().unwrap();
    assert_eq!(stored.name.chars().count(), 210);
}

#[tokio::test]
async fn test_long_enrichment_name_replaces_template() {
    let db = Database::in_memory().await.unwrap();
    db.products().insert(&Product::template(CODE)).await.unwrap();
    let name = "Йогурт клубничный ".repeat(15);
    let provider = ScriptedProvider::new(
        "barcode_list",
        1,
        Script::Payload(LookupPayload::new(CODE, name.clone())),
    );
    let service = sqlite_service(db.clone(), &[provider]);

    match service.resolve_or_create(CODE).await {
        ScanResolution::Found { product, .. } => assert_eq!(product.name, name),
        other => panic!("expected Found, got {:?}", other),
    }
    let stored = db.products().get_by_barcode(CODE).await.unwrap().unwrap();
    assert_eq!(stored.name, name);
}

// =============================================================================
// Extreme Configuration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_huge_configured_durations_do_not_break_resolve() {
    let mut config = LookupConfig::default();
    config.apply_overrides(|name| match name {
        "LOOKUP_NEGATIVE_CACHE_SECONDS" | "LOOKUP_CIRCUIT_BREAKER_COOLDOWN_SECONDS" => {
            Some("1e30".to_string())
        }
        "LOOKUP_PROVIDER_COOLDOWN_MS" => Some(u64::MAX.to_string()),
        _ => None,
    });
    config.clamp();
    config.validate().unwrap();

    let store = MemoryStore::new();
    let provider = ScriptedProvider::new("ean_db", 5, Script::Fail(503));
    let service = service_with_policy(store.clone(), &[provider.clone()], config.policy());

    let first = service.resolve(CODE, false).await;
    assert!(matches!(first, ScanResolution::NotFound { .. }));
    assert!(service.guard().is_cached(CODE).await);

    let second = service.resolve(CODE, false).await;
    assert!(matches!(second, ScanResolution::NotFound { .. }));
}
