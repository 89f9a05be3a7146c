//! Usage ledger
//!
//! Tracks how often and how recently each scenario was loaded. A record
//! exists only for codes loaded at least once. When backed by a file, the
//! ledger is written after every increment, outside the lock.
//!
//! Persisted as `usage.json`:
//!
//! ```json
//! { "version": 1, "stats": { "CE79-F64D-344F-5F1E": { "loadCount": 3, "lastLoadedAt": "..." } } }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::AutomationError;
use crate::persist::write_json_atomic;

pub const USAGE_SNAPSHOT_VERSION: u32 = 1;

/// Per-code usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub load_count: u64,
    pub last_loaded_at: DateTime<Utc>,
}

/// On-disk usage document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub stats: BTreeMap<String, UsageRecord>,
}

/// Shared usage ledger
#[derive(Default)]
pub struct UsageLedger {
    stats: Mutex<HashMap<String, UsageRecord>>,
    path: Option<PathBuf>,
}

impl UsageLedger {
    /// Ledger that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed ledger; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stats = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read usage ledger: {}", path.display()))?;
            let snapshot: UsageSnapshot = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse usage ledger: {}", path.display()))?;
            snapshot.stats.into_iter().collect()
        } else {
            tracing::debug!("No usage ledger at {}, starting fresh", path.display());
            HashMap::new()
        };

        Ok(Self {
            stats: Mutex::new(stats),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UsageRecord>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a load of `code` now
    pub fn record_load(&self, code: &str) -> Result<UsageRecord, AutomationError> {
        self.record_load_at(code, Utc::now())
    }

    /// Count a load of `code` at a given time
    ///
    /// The in-memory increment always happens. A persistence failure is
    /// logged and returned, and the increment is kept.
    pub fn record_load_at(
        &self,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord, AutomationError> {
        let (updated, snapshot) = {
            let mut stats = self.lock();
            let entry = stats.entry(code.to_string()).or_insert(UsageRecord {
                load_count: 0,
                last_loaded_at: at,
            });
            entry.load_count += 1;
            entry.last_loaded_at = at;
            let updated = *entry;

            let snapshot = self.path.as_ref().map(|_| Self::to_snapshot(&stats));
            (updated, snapshot)
        };

        tracing::debug!(code, load_count = updated.load_count, "Recorded scenario load");

        if let (Some(path), Some(snapshot)) = (&self.path, snapshot) {
            write_json_atomic(path, &snapshot, "usage ledger").inspect_err(|e| {
                tracing::error!("Failed to save usage ledger: {}", e);
            })?;
        }
        Ok(updated)
    }

    fn to_snapshot(stats: &HashMap<String, UsageRecord>) -> UsageSnapshot {
        UsageSnapshot {
            version: USAGE_SNAPSHOT_VERSION,
            stats: stats.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<UsageRecord> {
        self.lock().get(code).copied()
    }

    /// Copy of every usage record
    pub fn snapshot(&self) -> HashMap<String, UsageRecord> {
        self.lock().clone()
    }

    /// True until the first load has been recorded
    pub fn is_first_run(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_first_run()
    }
}
