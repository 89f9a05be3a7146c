//! Persisted catalog snapshot and remote refresh
//!
//! ```json
//! {
//!   "version": 1,
//!   "lastUpdated": "2025-01-01T00:00:00Z",
//!   "totalCount": 2,
//!   "scenarios": [ { "code": "CE79-F64D-344F-5F1E", "name": "...", ... } ]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};

use super::ScenarioRecord;

/// Current snapshot document version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshots older than this are due for a refresh (7 days)
pub const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// On-disk catalog document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub total_count: usize,

    #[serde(default)]
    pub scenarios: Vec<ScenarioRecord>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl CatalogSnapshot {
    pub fn new(scenarios: Vec<ScenarioRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            last_updated: Utc::now(),
            total_count: scenarios.len(),
            scenarios,
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(content).context("Failed to parse catalog snapshot")?;
        if snapshot.total_count != snapshot.scenarios.len() {
            tracing::debug!(
                "Snapshot totalCount {} differs from {} scenarios",
                snapshot.total_count,
                snapshot.scenarios.len()
            );
        }
        Ok(snapshot)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid catalog snapshot: {}", path.display()))
    }
}

/// Download a snapshot document from a URL
pub async fn fetch_snapshot(client: &reqwest::Client, url: &str) -> Result<CatalogSnapshot> {
    tracing::debug!("Fetching catalog snapshot from {}", url);

    let response = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("Failed to fetch catalog snapshot from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!(
            "Failed to fetch catalog snapshot: HTTP {} from {}",
            response.status(),
            url
        );
    }

    let content = response
        .text()
        .await
        .context("Failed to read catalog snapshot response")?;

    CatalogSnapshot::from_json(&content)
}

/// True if the snapshot file is missing or older than `max_age`
pub fn is_snapshot_stale(path: &Path, max_age: Duration) -> bool {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return true,
    };

    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);

    if age > max_age {
        tracing::debug!("Catalog snapshot is stale (age: {:?})", age);
        true
    } else {
        false
    }
}
