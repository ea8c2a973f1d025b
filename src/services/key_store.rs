//! Key store - the lifecycle of access keys over a flat JSON file.
//!
//! This service handles:
//! - Loading and persisting the full key collection
//! - Generating single keys and batches
//! - Redeeming (marking used) and validating keys
//! - Removing expired keys and reporting statistics
//!
//! # Persistence
//!
//! Every mutating operation rewrites the whole file. A batch is persisted
//! once, after all of its keys are appended. There is no locking: a single
//! process is expected to own the file for the duration of a run.

use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::StoreConfig;
use crate::error::AppError;
use crate::models::key_record::{KeyFilter, KeyRecord, KeyStatistics, KeyStatus, Validation};
use crate::services::clock::{Clock, SystemClock};
use crate::storage;

/// In-memory key collection bound to its backing file.
pub struct KeyStore {
    config: StoreConfig,
    clock: Box<dyn Clock>,
    /// Insertion order is preserved on disk and in every listing.
    records: Vec<KeyRecord>,
}

impl KeyStore {
    /// Create an empty store without touching the filesystem.
    pub fn new(config: StoreConfig, clock: impl Clock + 'static) -> Self {
        Self {
            config,
            clock: Box::new(clock),
            records: Vec::new(),
        }
    }

    /// Open the store described by `config` using the system clock.
    ///
    /// See [`KeyStore::open_with_clock`].
    pub fn open(config: StoreConfig) -> Result<Self, AppError> {
        Self::open_with_clock(config, SystemClock)
    }

    /// Open the store, creating the backing file if it does not exist.
    ///
    /// # Process
    ///
    /// 1. Create the store file (and its directory) when missing
    /// 2. Load the records
    /// 3. If the file is corrupt, log a warning and continue empty
    ///
    /// # Errors
    ///
    /// - `Io`: the store file cannot be created or read
    pub fn open_with_clock(config: StoreConfig, clock: impl Clock + 'static) -> Result<Self, AppError> {
        if storage::ensure_store_file(&config.keys_file)? {
            tracing::info!("Created new key store at {}", config.keys_file.display());
        }

        let mut store = Self::new(config, clock);
        match store.load() {
            Ok(_) => {}
            Err(e @ AppError::CorruptStore { .. }) => {
                tracing::warn!("{}; starting with an empty store", e);
            }
            Err(e) => return Err(e),
        }

        Ok(store)
    }

    /// Replace the in-memory collection with the persisted one.
    ///
    /// Returns the number of records loaded. A missing file loads as empty.
    ///
    /// # Errors
    ///
    /// - `CorruptStore`: the file is unreadable as a key collection. The
    ///   in-memory collection is left empty so the caller can carry on.
    /// - `Io`: the file could not be read. The in-memory collection is kept,
    ///   so a later save does not replace the file with a partial one.
    pub fn load(&mut self) -> Result<usize, AppError> {
        self.records = match storage::read_records(&self.config.keys_file) {
            Ok(records) => records.unwrap_or_default(),
            Err(e @ AppError::CorruptStore { .. }) => {
                self.records.clear();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!("Loaded {} key(s)", self.records.len());
        Ok(self.records.len())
    }

    /// Write the full collection, overwriting the previous content.
    ///
    /// When a backup directory is configured and the store file exists, the
    /// previous content is snapshotted first. A failed snapshot is logged and
    /// does not prevent the write.
    ///
    /// # Errors
    ///
    /// - `Io` / `Serialization`: the store file could not be written
    pub fn save(&self) -> Result<(), AppError> {
        if let Some(backup_dir) = &self.config.backup_dir {
            if self.config.keys_file.exists() {
                match storage::backup_file(&self.config.keys_file, backup_dir, self.now()) {
                    Ok(path) => tracing::info!("Backup created: {}", path.display()),
                    Err(e) => tracing::warn!("Failed to create backup: {}", e),
                }
            }
        }

        storage::write_records(&self.config.keys_file, &self.records)?;
        tracing::info!("Saved {} key(s)", self.records.len());

        Ok(())
    }

    /// Generate one key valid for `duration_hours` and persist the store.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: `duration_hours` is zero or out of range
    /// - `Io`: the store could not be saved
    pub fn generate(&mut self, duration_hours: u32) -> Result<KeyRecord, AppError> {
        let record = self.issue(duration_hours)?;
        self.records.push(record.clone());
        self.save()?;

        tracing::info!("Generated key {}", record.key);
        Ok(record)
    }

    /// Generate `count` keys and persist the store once at the end.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: `count` or `duration_hours` is zero
    /// - `Io`: the store could not be saved
    pub fn generate_batch(
        &mut self,
        count: u32,
        duration_hours: u32,
    ) -> Result<Vec<KeyRecord>, AppError> {
        if count == 0 {
            return Err(AppError::InvalidInput(
                "Count must be positive".to_string(),
            ));
        }

        let batch = (0..count)
            .map(|_| self.issue(duration_hours))
            .collect::<Result<Vec<_>, _>>()?;

        self.records.extend(batch.iter().cloned());
        self.save()?;

        tracing::info!("Generated {} key(s)", batch.len());
        Ok(batch)
    }

    /// Exact-match lookup.
    pub fn find_by_key(&self, key: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.key == key)
    }

    /// Redeem a key and persist the store.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no record has this key
    /// - `AlreadyUsed`: the key was redeemed before (`usedAt` is unchanged)
    /// - `Io`: the store could not be saved; the in-memory record stays used
    pub fn mark_used(&mut self, key: &str) -> Result<KeyRecord, AppError> {
        let now = self.now();
        let record = self
            .records
            .iter_mut()
            .find(|record| record.key == key)
            .ok_or_else(|| AppError::NotFound(key.to_string()))?;

        record.mark_used(now)?;
        let record = record.clone();
        self.save()?;

        tracing::info!("Key {} marked as used", record.key);
        Ok(record)
    }

    /// Check whether `key` can be redeemed right now.
    ///
    /// Checks run in order: existence, then used, then expiry. A key that is
    /// both used and past expiry reports `AlreadyUsed`.
    pub fn validate(&self, key: &str) -> Validation {
        let now = self.now();

        match self.find_by_key(key) {
            None => Validation::NotFound,
            Some(record) if record.used => Validation::AlreadyUsed,
            Some(record) if record.expiry <= now => Validation::Expired,
            Some(_) => Validation::Valid,
        }
    }

    /// Remove every unused key whose expiry has passed.
    ///
    /// Used keys are kept regardless of expiry. The store is saved only when
    /// something was removed.
    pub fn clean_expired(&mut self) -> Result<usize, AppError> {
        let now = self.now();
        let before = self.records.len();

        self.records.retain(|record| !record.is_expired_at(now));
        let removed = before - self.records.len();

        if removed > 0 {
            self.save()?;
            tracing::info!("Removed {} expired key(s)", removed);
        }

        Ok(removed)
    }

    pub fn statistics(&self) -> KeyStatistics {
        let now = self.now();

        self.records
            .iter()
            .fold(
                KeyStatistics {
                    total: self.records.len(),
                    ..KeyStatistics::default()
                },
                |mut stats, record| {
                    match record.status_at(now) {
                        KeyStatus::Valid => stats.valid += 1,
                        KeyStatus::Used => stats.used += 1,
                        KeyStatus::Expired => stats.expired += 1,
                    }
                    stats
                },
            )
    }

    /// Records matching `filter`, in insertion order.
    pub fn list_filtered(&self, filter: KeyFilter) -> Vec<&KeyRecord> {
        let now = self.now();
        self.records
            .iter()
            .filter(|record| filter.matches(record, now))
            .collect()
    }

    /// The `limit` most recently generated records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&KeyRecord> {
        let mut records: Vec<&KeyRecord> = self.records.iter().collect();
        records.sort_by(|a, b| b.generated.cmp(&a.generated));
        records.truncate(limit);
        records
    }

    /// Write the currently valid keys to a timestamped file in the export
    /// directory and return its path. The store itself is not modified.
    ///
    /// A second export within the same second gets a numbered suffix.
    pub fn export_valid(&self) -> Result<PathBuf, AppError> {
        let now = self.now();
        let valid = self.list_filtered(KeyFilter::Valid);

        let path =
            storage::timestamped_path(&self.config.export_dir, storage::EXPORT_PREFIX, now);
        storage::write_json(&path, &valid)?;

        tracing::info!("Exported {} valid key(s) to {}", valid.len(), path.display());
        Ok(path)
    }

    /// Derived status of `record` at the store's current instant.
    pub fn status_of(&self, record: &KeyRecord) -> KeyStatus {
        record.status_at(self.now())
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn default_duration_hours(&self) -> u32 {
        self.config.default_duration_hours
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn issue(&self, duration_hours: u32) -> Result<KeyRecord, AppError> {
        if duration_hours == 0 {
            return Err(AppError::InvalidInput(
                "Duration must be at least one hour".to_string(),
            ));
        }

        KeyRecord::issue(self.now(), TimeDelta::hours(i64::from(duration_hours))).ok_or_else(
            || AppError::InvalidInput(format!("Duration of {} hours is too large", duration_hours)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::FixedClock;
    use chrono::TimeZone;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn open_store(temp_dir: &TempDir) -> (KeyStore, Rc<FixedClock>) {
        let clock = Rc::new(FixedClock::new(start()));
        let store =
            KeyStore::open_with_clock(StoreConfig::in_dir(temp_dir.path()), clock.clone()).unwrap();
        (store, clock)
    }

    /// A valid, B expired and unused, C used and past expiry.
    fn three_key_scenario(store: &mut KeyStore, clock: &FixedClock) -> [String; 3] {
        let c = store.generate(1).unwrap().key;
        store.mark_used(&c).unwrap();
        let b = store.generate(1).unwrap().key;

        clock.advance(TimeDelta::hours(2));
        let a = store.generate(24).unwrap().key;

        [a, b, c]
    }

    #[test]
    fn test_open_creates_store_file() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = open_store(&temp_dir);

        assert!(store.records().is_empty());
        assert!(temp_dir.path().join("keys.json").exists());
    }

    #[test]
    fn test_generate_sets_expiry_from_duration() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);

        let record = store.generate(24).unwrap();

        assert_eq!(record.generated, start());
        assert_eq!(record.expiry.timestamp(), start().timestamp() + 86_400);
        assert!(!record.used);
        assert!(record.used_at.is_none());
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn test_generate_zero_duration() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);

        let result = store.generate(0);

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_generate_batch_persists_all() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);

        let batch = store.generate_batch(5, 12).unwrap();
        assert_eq!(batch.len(), 5);

        let persisted = storage::read_records(&store.config().keys_file)
            .unwrap()
            .unwrap();
        assert_eq!(persisted, batch);
    }

    #[test]
    fn test_generate_batch_zero_count() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);

        assert!(matches!(
            store.generate_batch(0, 24),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_find_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);
        let record = store.generate(24).unwrap();

        assert_eq!(store.find_by_key(&record.key), Some(&record));
        assert!(store.find_by_key("MISSING").is_none());
    }

    #[test]
    fn test_mark_used_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);

        match store.mark_used("NOPE") {
            Err(AppError::NotFound(key)) => assert_eq!(key, "NOPE"),
            other => panic!("Expected NotFound, got {:?}", other.map(|r| r.key)),
        }
    }

    #[test]
    fn test_mark_used_twice() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let key = store.generate(24).unwrap().key;

        let first = store.mark_used(&key).unwrap();
        assert_eq!(first.used_at, Some(start()));

        clock.advance(TimeDelta::hours(1));
        let result = store.mark_used(&key);

        assert!(matches!(result, Err(AppError::AlreadyUsed(_))));
        assert_eq!(store.find_by_key(&key).unwrap().used_at, Some(start()));
    }

    #[test]
    fn test_validate_order() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let [a, b, c] = three_key_scenario(&mut store, &clock);

        assert_eq!(store.validate(&a), Validation::Valid);
        assert_eq!(store.validate(&b), Validation::Expired);
        // Used and expired reports used
        assert_eq!(store.validate(&c), Validation::AlreadyUsed);
        assert_eq!(store.validate("UNKNOWN"), Validation::NotFound);
    }

    #[test]
    fn test_validate_at_exact_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let key = store.generate(1).unwrap().key;

        clock.advance(TimeDelta::hours(1) - TimeDelta::seconds(1));
        assert!(store.validate(&key).is_valid());

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(store.validate(&key), Validation::Expired);
    }

    #[test]
    fn test_clean_expired_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let [a, b, c] = three_key_scenario(&mut store, &clock);

        let removed = store.clean_expired().unwrap();

        assert_eq!(removed, 1);
        let remaining: Vec<&str> = store.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(remaining, vec![c.as_str(), a.as_str()]);
        assert!(store.find_by_key(&b).is_none());

        assert_eq!(
            store.statistics(),
            KeyStatistics {
                total: 2,
                valid: 1,
                used: 1,
                expired: 0,
            }
        );
    }

    #[test]
    fn test_clean_expired_nothing_to_remove_skips_save() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);
        store.generate(24).unwrap();
        let backups = temp_dir.path().join("backups");
        let backups_before = fs::read_dir(&backups).map(|d| d.count()).unwrap_or(0);

        assert_eq!(store.clean_expired().unwrap(), 0);

        let backups_after = fs::read_dir(&backups).map(|d| d.count()).unwrap_or(0);
        assert_eq!(backups_before, backups_after);
    }

    #[test]
    fn test_statistics_buckets_sum_to_total() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        three_key_scenario(&mut store, &clock);
        store.generate_batch(3, 5).unwrap();

        for hours in [0, 3, 10, 48] {
            clock.advance(TimeDelta::hours(hours));
            let stats = store.statistics();
            assert_eq!(stats.total, stats.valid + stats.used + stats.expired);
            assert_eq!(stats.total, 6);
        }
    }

    #[test]
    fn test_list_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let [a, b, c] = three_key_scenario(&mut store, &clock);

        let keys = |filter| -> Vec<String> {
            store
                .list_filtered(filter)
                .into_iter()
                .map(|r| r.key.clone())
                .collect()
        };

        assert_eq!(keys(KeyFilter::All), vec![c.clone(), b.clone(), a.clone()]);
        assert_eq!(keys(KeyFilter::Valid), vec![a]);
        assert_eq!(keys(KeyFilter::Used), vec![c]);
        assert_eq!(keys(KeyFilter::Expired), vec![b]);
    }

    #[test]
    fn test_recent_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let mut keys = Vec::new();
        for _ in 0..7 {
            keys.push(store.generate(24).unwrap().key);
            clock.advance(TimeDelta::minutes(1));
        }

        let recent: Vec<&str> = store.recent(5).iter().map(|r| r.key.as_str()).collect();
        let expected: Vec<&str> = keys.iter().rev().take(5).map(String::as_str).collect();
        assert_eq!(recent, expected);
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        three_key_scenario(&mut store, &clock);
        let before = store.records().to_vec();

        store.save().unwrap();
        let count = store.load().unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn test_corrupt_store_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("keys.json"), "[{\"key\": 12").unwrap();

        let (mut store, _) = open_store(&temp_dir);
        assert!(store.records().is_empty());

        let result = store.load();
        assert!(matches!(result, Err(AppError::CorruptStore { .. })));
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_non_utf8_store_opens_empty() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("keys.json"), [0xff, 0xfe, b'[', b']']).unwrap();

        let (mut store, _) = open_store(&temp_dir);
        assert!(store.records().is_empty());
        assert!(matches!(store.load(), Err(AppError::CorruptStore { .. })));
    }

    #[test]
    fn test_unreadable_store_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);
        store.generate_batch(2, 24).unwrap();
        let before = store.records().to_vec();

        // A directory in place of the file cannot be read
        let keys_file = store.config().keys_file.clone();
        fs::remove_file(&keys_file).unwrap();
        fs::create_dir(&keys_file).unwrap();

        assert!(matches!(store.load(), Err(AppError::Io(_))));
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn test_save_creates_backup_of_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);
        let previous = fs::read_to_string(&store.config().keys_file).unwrap();

        store.generate(24).unwrap();

        let backups: Vec<_> = fs::read_dir(temp_dir.path().join("backups"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), previous);
    }

    #[test]
    fn test_backup_failure_does_not_abort_save() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the backup directory should be
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut config = StoreConfig::in_dir(temp_dir.path());
        config.backup_dir = Some(blocker.join("backups"));
        let mut store =
            KeyStore::open_with_clock(config, FixedClock::new(start())).unwrap();

        let record = store.generate(24).unwrap();

        let persisted = storage::read_records(&store.config().keys_file)
            .unwrap()
            .unwrap();
        assert_eq!(persisted, vec![record]);
    }

    #[test]
    fn test_export_valid_writes_only_valid_keys() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, clock) = open_store(&temp_dir);
        let [a, _, _] = three_key_scenario(&mut store, &clock);

        let path = store.export_valid().unwrap();

        let exported = storage::read_records(&path).unwrap().unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].key, a);
        assert_eq!(store.records().len(), 3);
        assert!(path.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_exports_in_same_second_do_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let (mut store, _) = open_store(&temp_dir);
        let first_key = store.generate(24).unwrap().key;
        let first = store.export_valid().unwrap();

        store.generate(24).unwrap();
        let second = store.export_valid().unwrap();

        assert_ne!(first, second);
        let earlier = storage::read_records(&first).unwrap().unwrap();
        assert_eq!(earlier.len(), 1);
        assert_eq!(earlier[0].key, first_key);
        assert_eq!(storage::read_records(&second).unwrap().unwrap().len(), 2);
    }
}
