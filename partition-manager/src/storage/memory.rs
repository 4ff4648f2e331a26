//! In-memory partition repository
//!
//! Mirrors the PostgreSQL backend's semantics, including the uniqueness of
//! active `(instrument, resolution, start_date)`. Failure injection hooks let
//! tests exercise degraded reads and write races.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use super::catalog::validate_identifier;
use super::{
    CollectionProvisioning, InsertOutcome, PartitionRepository, RepositoryError,
    RepositoryResult, TimeSeriesOptions,
};
use crate::partition::PartitionRecord;

/// A provisioned in-memory collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedCollection {
    pub instrument: String,
    pub options: TimeSeriesOptions,
}

#[derive(Default)]
struct State {
    partitions: Vec<PartitionRecord>,
    collections: HashMap<String, ProvisionedCollection>,
}

/// Process-local partition repository
#[derive(Default)]
pub struct InMemoryPartitionRepository {
    state: Mutex<State>,
    calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    stale_reads: AtomicUsize,
    disabled: Mutex<HashSet<String>>,
}

impl InMemoryPartitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, bypassing uniqueness. Used to model data left by
    /// earlier runs, including inconsistent data.
    pub fn seed(&self, record: PartitionRecord) {
        self.state.lock().partitions.push(record);
    }

    /// Snapshot of every stored record, in insertion order
    pub fn partitions(&self) -> Vec<PartitionRecord> {
        self.state.lock().partitions.clone()
    }

    pub fn collection(&self, name: &str) -> Option<ProvisionedCollection> {
        self.state.lock().collections.get(name).cloned()
    }

    pub fn collection_count(&self) -> usize {
        self.state.lock().collections.len()
    }

    /// Number of repository operations invoked so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every read fail with `RepositoryError::Unavailable`
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make inserts and collection creation fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `count` reads return nothing, as if another writer's rows
    /// were not yet visible.
    pub fn set_stale_reads(&self, count: usize) {
        self.stale_reads.store(count, Ordering::SeqCst);
    }

    /// Treat `instrument` as disabled in the catalog: target checks and
    /// collection creation fail with `RepositoryError::Configuration`.
    pub fn disable_instrument(&self, instrument: &str) {
        self.disabled.lock().insert(instrument.to_ascii_uppercase());
    }

    fn ensure_enabled(&self, instrument: &str) -> RepositoryResult<()> {
        if self.disabled.lock().contains(&instrument.to_ascii_uppercase()) {
            return Err(RepositoryError::Configuration(format!(
                "Instrument {} is disabled",
                instrument
            )));
        }
        Ok(())
    }

    fn begin_read(&self) -> RepositoryResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("injected read failure".into()));
        }

        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(stale)
    }

    fn begin_write(&self) -> RepositoryResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }

    fn active<'a>(
        partitions: &'a [PartitionRecord],
        instrument: &'a str,
        resolution: &'a str,
    ) -> impl Iterator<Item = &'a PartitionRecord> + 'a {
        partitions.iter().filter(move |p| {
            p.is_active() && p.instrument == instrument && p.resolution == resolution
        })
    }
}

#[async_trait]
impl PartitionRepository for InMemoryPartitionRepository {
    async fn find_overlapping(
        &self,
        instrument: &str,
        resolution: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PartitionRecord>> {
        if self.begin_read()? {
            return Ok(Vec::new());
        }

        let state = self.state.lock();
        let mut found: Vec<PartitionRecord> = Self::active(&state.partitions, instrument, resolution)
            .filter(|p| p.start_date <= end && p.end_date >= start)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.start_date);
        Ok(found)
    }

    async fn find_prev(
        &self,
        instrument: &str,
        resolution: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>> {
        if self.begin_read()? {
            return Ok(None);
        }

        let state = self.state.lock();
        Ok(Self::active(&state.partitions, instrument, resolution)
            .filter(|p| p.end_date < before)
            .max_by_key(|p| p.end_date)
            .cloned())
    }

    async fn find_next(
        &self,
        instrument: &str,
        resolution: &str,
        after: DateTime<Utc>,
    ) -> RepositoryResult<Option<PartitionRecord>> {
        if self.begin_read()? {
            return Ok(None);
        }

        let state = self.state.lock();
        Ok(Self::active(&state.partitions, instrument, resolution)
            .filter(|p| p.start_date > after)
            .min_by_key(|p| p.start_date)
            .cloned())
    }

    async fn list_active(
        &self,
        instrument: &str,
        resolution: &str,
    ) -> RepositoryResult<Vec<PartitionRecord>> {
        if self.begin_read()? {
            return Ok(Vec::new());
        }

        let state = self.state.lock();
        let mut found: Vec<PartitionRecord> = Self::active(&state.partitions, instrument, resolution)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.start_date);
        Ok(found)
    }

    async fn check_target(&self, instrument: &str, collection_name: &str) -> RepositoryResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        validate_identifier(collection_name)?;
        self.ensure_enabled(instrument)
    }

    async fn insert(&self, record: &PartitionRecord) -> RepositoryResult<InsertOutcome> {
        self.begin_write()?;

        let mut state = self.state.lock();
        let duplicate = record.is_active()
            && Self::active(&state.partitions, &record.instrument, &record.resolution)
                .any(|p| p.start_date == record.start_date);

        if duplicate {
            debug!("Partition start already taken: {}", record);
            return Ok(InsertOutcome::Conflict);
        }

        state.partitions.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn create_time_series_collection_if_not_exists(
        &self,
        collection_name: &str,
        resolution: &str,
        instrument: &str,
    ) -> RepositoryResult<CollectionProvisioning> {
        self.begin_write()?;
        validate_identifier(collection_name)?;
        self.ensure_enabled(instrument)?;

        let mut state = self.state.lock();
        if state.collections.contains_key(collection_name) {
            return Ok(CollectionProvisioning::AlreadyExists);
        }

        let options = TimeSeriesOptions::for_resolution(resolution)?;
        state.collections.insert(
            collection_name.to_string(),
            ProvisionedCollection {
                instrument: instrument.to_string(),
                options,
            },
        );
        Ok(CollectionProvisioning::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::window::DayRange;
    use crate::partition::{Granularity, PartitionStatus};
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(first: NaiveDate, last: NaiveDate) -> PartitionRecord {
        PartitionRecord::new_active("SST", "1s", DayRange::new(first, last), "memory", Utc::now())
    }

    #[tokio::test]
    async fn test_find_overlapping_and_neighbours() {
        let repo = InMemoryPartitionRepository::new();
        repo.seed(record(day(1970, 1, 21), day(1970, 1, 30)));
        repo.seed(record(day(1970, 1, 1), day(1970, 1, 10)));
        repo.seed(record(day(1970, 2, 5), day(1970, 2, 14)));

        let range = DayRange::new(day(1970, 1, 5), day(1970, 1, 25));
        let found = repo
            .find_overlapping("SST", "1s", range.start_instant(), range.end_instant())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].first_day(), day(1970, 1, 1));
        assert_eq!(found[1].first_day(), day(1970, 1, 21));

        let target = DayRange::new(day(1970, 2, 1), day(1970, 2, 1));
        let prev = repo.find_prev("SST", "1s", target.start_instant()).await.unwrap();
        assert_eq!(prev.unwrap().last_day(), day(1970, 1, 30));

        let next = repo.find_next("SST", "1s", target.end_instant()).await.unwrap();
        assert_eq!(next.unwrap().first_day(), day(1970, 2, 5));

        let none = repo.find_next("SST", "1m", target.end_instant()).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_inactive_partitions_are_invisible() {
        let repo = InMemoryPartitionRepository::new();
        let mut retired = record(day(1970, 1, 1), day(1970, 1, 10));
        retired.status = PartitionStatus::Retired;
        repo.seed(retired);

        assert!(repo.list_active("SST", "1s").await.unwrap().is_empty());

        // A retired start date does not block a new active partition
        let outcome = repo.insert(&record(day(1970, 1, 1), day(1970, 1, 5))).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_insert_conflict_on_same_start() {
        let repo = InMemoryPartitionRepository::new();
        let first = record(day(1970, 1, 21), day(1970, 1, 30));
        assert_eq!(repo.insert(&first).await.unwrap(), InsertOutcome::Inserted);

        let second = record(day(1970, 1, 21), day(1970, 1, 25));
        assert_eq!(repo.insert(&second).await.unwrap(), InsertOutcome::Conflict);
        assert_eq!(repo.partitions().len(), 1);
    }

    #[tokio::test]
    async fn test_collection_creation_is_idempotent() {
        let repo = InMemoryPartitionRepository::new();
        let name = "data_SST_1m_19700101_19700110";

        let first = repo
            .create_time_series_collection_if_not_exists(name, "1m", "SST")
            .await
            .unwrap();
        let second = repo
            .create_time_series_collection_if_not_exists(name, "1m", "SST")
            .await
            .unwrap();

        assert_eq!(first, CollectionProvisioning::Created);
        assert_eq!(second, CollectionProvisioning::AlreadyExists);
        assert_eq!(repo.collection_count(), 1);
        assert_eq!(repo.collection(name).unwrap().options.granularity, Granularity::Minutes);
    }

    #[tokio::test]
    async fn test_collection_creation_rejects_unknown_granularity() {
        let repo = InMemoryPartitionRepository::new();
        let err = repo
            .create_time_series_collection_if_not_exists("data_SST_1d_x", "1d", "SST")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedGranularity(_)));
        assert_eq!(repo.collection_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_instrument_target() {
        let repo = InMemoryPartitionRepository::new();
        repo.disable_instrument("poemas");
        let name = "data_POEMAS_1s_19700101_19700110";

        let err = repo.check_target("POEMAS", name).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Configuration(_)));
        let err = repo
            .create_time_series_collection_if_not_exists(name, "1s", "POEMAS")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Configuration(_)));
        assert_eq!(repo.collection_count(), 0);

        repo.check_target("SST", "data_SST_1s_19700101_19700110").await.unwrap();
        let err = repo.check_target("SST", "data SST").await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let repo = InMemoryPartitionRepository::new();
        repo.seed(record(day(1970, 1, 1), day(1970, 1, 10)));

        repo.set_stale_reads(1);
        assert!(repo.list_active("SST", "1s").await.unwrap().is_empty());
        assert_eq!(repo.list_active("SST", "1s").await.unwrap().len(), 1);

        repo.set_fail_reads(true);
        assert!(repo.list_active("SST", "1s").await.is_err());

        repo.set_fail_writes(true);
        assert!(repo.insert(&record(day(1970, 2, 1), day(1970, 2, 2))).await.is_err());
        assert_eq!(repo.call_count(), 4);
    }
}
