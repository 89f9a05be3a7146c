//! Catalog store
//!
//! Owns every [`ScenarioRecord`] behind one short-held lock. Callers get
//! copies, never references into the map, since a refresh may rebuild it
//! at any time. Disk writes happen after the lock is released.

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    default_scenarios, validate_code, CatalogSnapshot, Origin, ScenarioRecord,
};
use crate::error::AutomationError;
use crate::persist::write_json_atomic;

/// Outcome of a catalog refresh merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Codes not previously in the catalog
    pub inserted: usize,
    /// Unmodified imported records replaced wholesale
    pub replaced: usize,
    /// User-modified imported records that only took new popularity
    pub stats_refreshed: usize,
    /// User-defined records left untouched
    pub preserved: usize,
}

/// In-memory scenario catalog
#[derive(Default)]
pub struct CatalogStore {
    records: Mutex<HashMap<String, ScenarioRecord>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ScenarioRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.code.clone(), record))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    /// Store seeded with the built-in scenarios
    pub fn with_defaults() -> Self {
        Self::from_records(default_scenarios())
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot = CatalogSnapshot::from_file(path)?;
        tracing::debug!(
            "Loaded {} scenarios from {}",
            snapshot.scenarios.len(),
            path.display()
        );
        Ok(Self::from_records(snapshot.scenarios))
    }

    /// Load a snapshot file, seeding the built-in scenarios if it is absent
    ///
    /// A present but unreadable or corrupt file is still an error.
    pub fn load_or_defaults(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let missing = AutomationError::ConfigurationMissing {
                what: format!("catalog snapshot {}", path.display()),
            };
            tracing::warn!("{}, seeding built-in scenarios", missing);
            Ok(Self::with_defaults())
        }
    }

    /// Persist the catalog
    ///
    /// On failure the in-memory catalog is kept; the error is logged and
    /// returned for the caller to report.
    pub fn save(&self, path: &Path) -> Result<(), AutomationError> {
        let snapshot = CatalogSnapshot::new(self.snapshot());
        write_json_atomic(path, &snapshot, "catalog snapshot").inspect_err(|e| {
            tracing::error!("Failed to save catalog: {}", e);
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScenarioRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only computation over the records under the lock
    ///
    /// The closure must be pure in-memory work.
    pub fn with_records<R>(&self, f: impl FnOnce(&HashMap<String, ScenarioRecord>) -> R) -> R {
        let records = self.lock();
        f(&records)
    }

    pub fn get(&self, code: &str) -> Option<ScenarioRecord> {
        self.lock().get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.lock().contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every record, sorted by case-insensitive name then code
    pub fn snapshot(&self) -> Vec<ScenarioRecord> {
        let mut records: Vec<ScenarioRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.code.cmp(&b.code))
        });
        records
    }

    /// Sorted distinct tags across the catalog
    pub fn available_tags(&self) -> Vec<String> {
        let tags: BTreeSet<String> = self
            .lock()
            .values()
            .flat_map(|record| record.tags.iter().cloned())
            .filter(|tag| !tag.trim().is_empty())
            .collect();
        tags.into_iter().collect()
    }

    /// Insert a user-created scenario
    pub fn add_user_scenario(&self, mut record: ScenarioRecord) -> Result<(), AutomationError> {
        record.code = validate_code(&record.code)?;
        record.origin = Origin::UserDefined;
        record.is_user_modified = false;

        let code = record.code.clone();
        {
            let mut records = self.lock();
            if records.contains_key(&code) {
                return Err(AutomationError::DuplicateScenario { code });
            }
            records.insert(code.clone(), record);
        }
        tracing::info!("Added user scenario {}", code);
        Ok(())
    }

    /// Hand-edit a scenario's user-editable fields
    pub fn update_scenario(&self, code: &str, edited: &ScenarioRecord) -> Result<(), AutomationError> {
        {
            let mut records = self.lock();
            let record = records
                .get_mut(code)
                .ok_or_else(|| AutomationError::UnknownScenario {
                    code: code.to_string(),
                })?;

            record.apply_edit(edited);
            if record.origin == Origin::Imported {
                record.is_user_modified = true;
            }
        }
        tracing::debug!("Updated scenario {}", code);
        Ok(())
    }

    /// Explicit user deletion
    pub fn remove_scenario(&self, code: &str) -> Result<ScenarioRecord, AutomationError> {
        let removed = self
            .lock()
            .remove(code)
            .ok_or_else(|| AutomationError::UnknownScenario {
                code: code.to_string(),
            })?;
        tracing::info!("Removed scenario {}", code);
        Ok(removed)
    }

    /// Correct the stored shot count from the host-reported one
    ///
    /// Returns true when the record changed. This is not a user edit.
    pub fn heal_shot_count(&self, code: &str, reported: u32) -> bool {
        let previous = {
            let mut records = self.lock();
            match records.get_mut(code) {
                Some(record) if record.shot_count != reported => {
                    Some(std::mem::replace(&mut record.shot_count, reported))
                }
                _ => None,
            }
        };

        match previous {
            Some(previous) => {
                tracing::info!("Healed shot count for {}: {} -> {}", code, previous, reported);
                true
            }
            None => false,
        }
    }

    /// Merge a catalog refresh into the store
    ///
    /// Per incoming code:
    /// - absent: insert
    /// - existing user-defined: untouched
    /// - existing user-modified import: keep edits, take new popularity
    /// - existing unmodified import: replace
    ///
    /// The whole merge runs under one lock acquisition, so readers see
    /// either the old catalog or the merged one.
    pub fn merge_catalog_refresh(
        &self,
        incoming: impl IntoIterator<Item = ScenarioRecord>,
    ) -> MergeReport {
        let incoming: Vec<ScenarioRecord> = incoming.into_iter().collect();
        let mut report = MergeReport::default();

        let mut records = self.lock();
        for mut record in incoming {
            record.origin = Origin::Imported;
            record.is_user_modified = false;

            match records.get_mut(&record.code) {
                None => {
                    report.inserted += 1;
                    records.insert(record.code.clone(), record);
                }
                Some(existing) if existing.origin == Origin::UserDefined => {
                    report.preserved += 1;
                }
                Some(existing) if existing.is_user_modified => {
                    existing.popularity = record.popularity;
                    report.stats_refreshed += 1;
                }
                Some(existing) => {
                    *existing = record;
                    report.replaced += 1;
                }
            }
        }

        drop(records);

        tracing::info!(
            inserted = report.inserted,
            replaced = report.replaced,
            stats_refreshed = report.stats_refreshed,
            preserved = report.preserved,
            "Merged catalog refresh"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DifficultyTier, Popularity};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(code: &str, name: &str) -> ScenarioRecord {
        ScenarioRecord::new(code, name)
    }

    #[test]
    fn test_load_or_defaults_seeds_when_missing() {
        let temp = TempDir::new().unwrap();
        let store = CatalogStore::load_or_defaults(&temp.path().join("catalog.json")).unwrap();
        assert_eq!(store.len(), 10);
        assert!(store.contains("CE79-F64D-344F-5F1E"));
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(CatalogStore::load_or_defaults(&path).is_err());
    }

    #[test]
    fn test_save_load_roundtrip_user_defined() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");

        let store = CatalogStore::new();
        let mut custom = record("ABCD-0000-1111-2222", "My Pack");
        custom.creator = "me".to_string();
        custom.difficulty = DifficultyTier::Diamond;
        custom.tags.insert("aerial".to_string());
        custom.shot_count = 7;
        custom.video_url = Some("https://example.com/v".to_string());
        custom.popularity = Popularity { likes: 3, plays: 9 };
        store.add_user_scenario(custom).unwrap();
        store.save(&path).unwrap();

        let loaded = CatalogStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert_eq!(
            loaded.get("ABCD-0000-1111-2222").unwrap().origin,
            Origin::UserDefined
        );
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_codes() {
        let store = CatalogStore::new();
        store
            .add_user_scenario(record("abcd-0000-1111-2222", "a"))
            .unwrap();
        assert!(store.contains("ABCD-0000-1111-2222"));

        let dup = store.add_user_scenario(record("ABCD-0000-1111-2222", "b"));
        assert!(matches!(dup, Err(AutomationError::DuplicateScenario { .. })));

        let bad = store.add_user_scenario(record("bad", "c"));
        assert!(matches!(bad, Err(AutomationError::InvalidCode { .. })));
    }

    #[test]
    fn test_update_marks_imported_as_modified() {
        let store = CatalogStore::from_records([record("AAAA-AAAA-AAAA-AAAA", "Old")]);
        let mut edited = record("AAAA-AAAA-AAAA-AAAA", "New");
        edited.shot_count = 5;
        store.update_scenario("AAAA-AAAA-AAAA-AAAA", &edited).unwrap();

        let updated = store.get("AAAA-AAAA-AAAA-AAAA").unwrap();
        assert_eq!(updated.name, "New");
        assert!(updated.is_user_modified);
        assert_eq!(updated.origin, Origin::Imported);

        assert!(matches!(
            store.update_scenario("FFFF-FFFF-FFFF-FFFF", &edited),
            Err(AutomationError::UnknownScenario { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let store = CatalogStore::from_records([record("AAAA-AAAA-AAAA-AAAA", "x")]);
        assert_eq!(store.remove_scenario("AAAA-AAAA-AAAA-AAAA").unwrap().name, "x");
        assert!(store.is_empty());
        assert!(store.remove_scenario("AAAA-AAAA-AAAA-AAAA").is_err());
    }

    #[test]
    fn test_heal_does_not_mark_modified() {
        let mut r = record("AAAA-AAAA-AAAA-AAAA", "x");
        r.shot_count = 10;
        let store = CatalogStore::from_records([r]);

        assert!(!store.heal_shot_count("AAAA-AAAA-AAAA-AAAA", 10));
        assert!(store.heal_shot_count("AAAA-AAAA-AAAA-AAAA", 12));
        assert!(!store.heal_shot_count("FFFF-FFFF-FFFF-FFFF", 12));

        let healed = store.get("AAAA-AAAA-AAAA-AAAA").unwrap();
        assert_eq!(healed.shot_count, 12);
        assert!(!healed.is_user_modified);
    }

    #[test]
    fn test_merge_rules() {
        let plain = record("AAAA-AAAA-AAAA-AAAA", "Plain");

        let mut edited = record("BBBB-BBBB-BBBB-BBBB", "My Edit");
        edited.is_user_modified = true;

        let mut custom = record("CCCC-CCCC-CCCC-CCCC", "Custom");
        custom.origin = Origin::UserDefined;

        let store = CatalogStore::from_records([plain, edited, custom.clone()]);

        let mut new_plain = record("AAAA-AAAA-AAAA-AAAA", "Plain v2");
        new_plain.popularity.likes = 5;
        let mut new_edited = record("BBBB-BBBB-BBBB-BBBB", "Upstream Name");
        new_edited.popularity = Popularity { likes: 7, plays: 70 };
        let new_custom = record("CCCC-CCCC-CCCC-CCCC", "Upstream Custom");
        let brand_new = record("DDDD-DDDD-DDDD-DDDD", "New");

        let report = store.merge_catalog_refresh([new_plain, new_edited, new_custom, brand_new]);
        assert_eq!(
            report,
            MergeReport {
                inserted: 1,
                replaced: 1,
                stats_refreshed: 1,
                preserved: 1
            }
        );

        assert_eq!(store.get("AAAA-AAAA-AAAA-AAAA").unwrap().name, "Plain v2");

        let kept = store.get("BBBB-BBBB-BBBB-BBBB").unwrap();
        assert_eq!(kept.name, "My Edit");
        assert!(kept.is_user_modified);
        assert_eq!(kept.popularity, Popularity { likes: 7, plays: 70 });

        assert_eq!(store.get("CCCC-CCCC-CCCC-CCCC").unwrap(), custom);
        assert!(store.contains("DDDD-DDDD-DDDD-DDDD"));
    }

    #[test]
    fn test_available_tags_sorted_distinct() {
        let mut a = record("AAAA-AAAA-AAAA-AAAA", "a");
        a.tags = ["shooting", "aerial"].iter().map(|s| s.to_string()).collect();
        let mut b = record("BBBB-BBBB-BBBB-BBBB", "b");
        b.tags = ["aerial", "defense"].iter().map(|s| s.to_string()).collect();

        let store = CatalogStore::from_records([a, b]);
        assert_eq!(store.available_tags(), vec!["aerial", "defense", "shooting"]);
    }
}
