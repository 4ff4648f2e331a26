//! Partitioning configuration loading through the provider

use partition_manager::resolver::{ConfigDocument, PartitioningConfigProvider};
use partition_manager::storage::InMemorySystemConfigStore;
use partition_manager::{PartitionError, Resolution};
use serde_json::json;
use telemetry_common::error::{ErrorCategory, ErrorClassification};

#[tokio::test]
async fn test_provider_caches_valid_configuration() {
    let store = InMemorySystemConfigStore::with_document(
        "partitioning",
        ConfigDocument::partitioning(2_000_000, 12, true),
    );
    let provider = PartitioningConfigProvider::new(store, "partitioning");
    assert!(!provider.is_loaded());

    let first = provider.get().await.unwrap();
    let second = provider.get().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.target_docs_per_collection, 2_000_000);
    assert_eq!(first.sun_hours_per_day, 12);
    assert_eq!(provider.source().fetch_count(), 1);
    assert!(provider.is_loaded());

    // 43200 docs per day at 1s
    let one_second = Resolution::parse("1s").unwrap();
    assert_eq!(first.days_per_collection(&one_second), 46);
}

#[tokio::test]
async fn test_provider_reads_its_own_document_id() {
    let store = InMemorySystemConfigStore::with_document(
        "partitioning",
        ConfigDocument::partitioning(100, 10, true),
    );
    let provider = PartitioningConfigProvider::new(store, "partitioning_v2");

    let err = provider.get().await.unwrap_err();
    assert!(matches!(err, PartitionError::Configuration(ref msg) if msg.contains("partitioning_v2")));
    assert_eq!(provider.document_id(), "partitioning_v2");
}

#[tokio::test]
async fn test_malformed_document_is_a_configuration_error() {
    let store = InMemorySystemConfigStore::new();
    store.put(
        "partitioning",
        ConfigDocument {
            status: "active".into(),
            body: json!({"partitioning": {"target_docs_per_collection": "lots"}}),
        },
    );
    let provider = PartitioningConfigProvider::new(store, "partitioning");

    let err = provider.get().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.max_retries(), 0);
    assert!(!provider.is_loaded());
}

#[tokio::test]
async fn test_store_failure_is_transient_and_not_cached() {
    let store = InMemorySystemConfigStore::with_document(
        "partitioning",
        ConfigDocument::partitioning(100, 10, true),
    );
    store.set_fail(true);
    let provider = PartitioningConfigProvider::new(store, "partitioning");

    let err = provider.get().await.unwrap_err();
    assert!(matches!(err, PartitionError::Storage(_)));
    assert!(err.is_transient());

    provider.source().set_fail(false);
    assert!(provider.get().await.is_ok());
    assert_eq!(provider.source().fetch_count(), 2);
}
