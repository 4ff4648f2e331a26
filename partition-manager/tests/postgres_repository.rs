//! PostgreSQL/TimescaleDB backend tests
//!
//! Require a TimescaleDB instance:
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/partition_test cargo test -p partition-manager -- --ignored
//! ```

use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use partition_manager::partition::window::DayRange;
use partition_manager::resolver::{ConfigDocument, PartitioningConfigProvider};
use partition_manager::storage::{
    CollectionProvisioning, InsertOutcome, InstrumentRouter, MetadataMigrations,
    PartitionRepository, PgPartitionRepository, PgSystemConfigStore, RepositoryError,
};
use partition_manager::{PartitionError, PartitionRecord, PartitionResolver, ResolverOptions};

async fn setup() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/partition_test".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("DATABASE_URL must point at a TimescaleDB instance");

    MetadataMigrations::new(pool.clone()).run().await.unwrap();
    pool
}

/// Instrument codes unique per test run so reruns start clean
fn instrument(tag: &str) -> String {
    format!("T{}{}", tag, Utc::now().timestamp_micros() % 1_000_000_000)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_insert_conflicts_on_active_start_day() {
    let pool = setup().await;
    let repository = PgPartitionRepository::new(InstrumentRouter::new(pool).allow_unlisted(true));
    let instrument = instrument("C");

    let record = PartitionRecord::new_active(
        &instrument,
        "1s",
        DayRange::new(day(1970, 1, 21), day(1970, 1, 30)),
        "TimescaleDB",
        Utc::now(),
    );
    let shorter = PartitionRecord::new_active(
        &instrument,
        "1s",
        DayRange::new(day(1970, 1, 21), day(1970, 1, 22)),
        "TimescaleDB",
        Utc::now(),
    );

    assert_eq!(repository.insert(&record).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(repository.insert(&shorter).await.unwrap(), InsertOutcome::Conflict);

    let ts = Utc.with_ymd_and_hms(1970, 1, 25, 0, 0, 0).unwrap();
    let found = repository
        .find_overlapping(&instrument, "1s", ts, ts)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].collection_name, record.collection_name);

    let prev = repository
        .find_prev(&instrument, "1s", Utc.with_ymd_and_hms(1970, 2, 1, 0, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(prev.map(|p| p.collection_name), Some(record.collection_name.clone()));

    let next = repository
        .find_next(&instrument, "1s", Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(next.map(|p| p.collection_name), Some(record.collection_name));
}

#[tokio::test]
#[ignore]
async fn test_collection_provisioning_is_idempotent() {
    let pool = setup().await;
    let repository = PgPartitionRepository::new(InstrumentRouter::new(pool.clone()).allow_unlisted(true));
    let instrument = instrument("P");
    let name = format!("data_{}_1m_19700101_19700110", instrument);

    let first = repository
        .create_time_series_collection_if_not_exists(&name, "1m", &instrument)
        .await
        .unwrap();
    let second = repository
        .create_time_series_collection_if_not_exists(&name, "1m", &instrument)
        .await
        .unwrap();

    assert_eq!(first, CollectionProvisioning::Created);
    assert_eq!(second, CollectionProvisioning::AlreadyExists);

    let row = sqlx::query(
        r#"
        SELECT obj_description(c.oid, 'pg_class') AS options
        FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1 AND c.relname = $2
        "#,
    )
    .bind(instrument.to_lowercase())
    .bind(&name)
    .fetch_one(&pool)
    .await
    .unwrap();
    let options: String = row.get("options");
    let options: serde_json::Value = serde_json::from_str(&options).unwrap();
    assert_eq!(options["granularity"], "minutes");
    assert_eq!(options["bucketMaxSpanSeconds"], 3600);
}

#[tokio::test]
#[ignore]
async fn test_resolver_against_database() {
    let pool = setup().await;
    let store = PgSystemConfigStore::new(pool.clone());
    store
        .upsert("partitioning_test", &ConfigDocument::partitioning(360_000, 10, true))
        .await
        .unwrap();

    let resolver = PartitionResolver::new(
        PgPartitionRepository::new(InstrumentRouter::new(pool).allow_unlisted(true)),
        PartitioningConfigProvider::new(store, "partitioning_test"),
        ResolverOptions::default(),
    );
    let instrument = instrument("R");
    let ts = Utc.with_ymd_and_hms(1970, 1, 25, 12, 0, 0).unwrap();

    let first = resolver.resolve_partition(&instrument, "1s", ts).await.unwrap();
    let second = resolver.resolve_partition(&instrument, "1s", ts).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(
        first.collection_name(),
        format!("data_{}_1s_19700121_19700130", instrument)
    );
    assert_eq!(first.collection_name(), second.collection_name());
    assert!(resolver.audit_overlaps(&instrument, "1s").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_unlisted_instrument_is_rejected_before_insert() {
    let pool = setup().await;
    let store = PgSystemConfigStore::new(pool.clone());
    store
        .upsert("partitioning_test", &ConfigDocument::partitioning(360_000, 10, true))
        .await
        .unwrap();

    let resolver = PartitionResolver::new(
        PgPartitionRepository::new(InstrumentRouter::new(pool)),
        PartitioningConfigProvider::new(store, "partitioning_test"),
        ResolverOptions::default(),
    );
    let instrument = instrument("U");
    let ts = Utc.with_ymd_and_hms(1970, 1, 25, 12, 0, 0).unwrap();

    for _ in 0..2 {
        let err = resolver.resolve(&instrument, "1s", ts).await.unwrap_err();
        assert!(matches!(
            err,
            PartitionError::Storage(RepositoryError::Configuration(_))
        ));
    }
    assert!(resolver.list_partitions(&instrument, "1s").await.unwrap().is_empty());
}
