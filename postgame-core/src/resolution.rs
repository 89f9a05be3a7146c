//! Filtering, usage ranking and the scenario fallback chain

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::catalog::{default_scenario_codes, normalize_code, CatalogStore, DifficultyTier, ScenarioRecord};
use crate::usage::{UsageLedger, UsageRecord};

/// Conjunction of optional criteria; the default matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Case-insensitive substring of name, code, creator or a tag
    pub search: Option<String>,
    /// Accepted tiers; empty accepts every tier
    pub difficulties: BTreeSet<DifficultyTier>,
    /// Exact tag, compared case-insensitively
    pub tag: Option<String>,
    pub min_shots: Option<u32>,
    pub video_only: bool,
}

impl Filter {
    pub fn matches(&self, record: &ScenarioRecord) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = record.name.to_lowercase().contains(&needle)
                || record.code.to_lowercase().contains(&needle)
                || record.creator.to_lowercase().contains(&needle)
                || record
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self.difficulties.is_empty() && !self.difficulties.contains(&record.difficulty) {
            return false;
        }

        if let Some(tag) = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if !record.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }

        if let Some(min) = self.min_shots {
            if record.shot_count < min {
                return false;
            }
        }

        !self.video_only || record.has_video()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Creator,
    Difficulty,
    ShotCount,
    Likes,
    Plays,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "creator" => Ok(SortKey::Creator),
            "difficulty" => Ok(SortKey::Difficulty),
            "shots" | "shot-count" | "shot_count" => Ok(SortKey::ShotCount),
            "likes" => Ok(SortKey::Likes),
            "plays" => Ok(SortKey::Plays),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Name => "name",
            SortKey::Creator => "creator",
            SortKey::Difficulty => "difficulty",
            SortKey::ShotCount => "shots",
            SortKey::Likes => "likes",
            SortKey::Plays => "plays",
        };
        f.write_str(name)
    }
}

/// Sort key plus direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub descending: bool,
}

impl Sort {
    pub fn ascending(key: SortKey) -> Self {
        Self { key, descending: false }
    }

    pub fn descending(key: SortKey) -> Self {
        Self { key, descending: true }
    }

    /// Compare two records; the code tie-break is always ascending
    pub fn compare(&self, a: &ScenarioRecord, b: &ScenarioRecord) -> Ordering {
        let primary = match self.key {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Creator => a.creator.to_lowercase().cmp(&b.creator.to_lowercase()),
            SortKey::Difficulty => a.difficulty.cmp(&b.difficulty),
            SortKey::ShotCount => a.shot_count.cmp(&b.shot_count),
            SortKey::Likes => a.popularity.likes.cmp(&b.popularity.likes),
            SortKey::Plays => a.popularity.plays.cmp(&b.popularity.plays),
        };
        let primary = if self.descending { primary.reverse() } else { primary };
        primary.then_with(|| a.code.cmp(&b.code))
    }
}

/// Owned result of a filter pass
///
/// Iterating does not touch the store, so a view can be walked any number
/// of times while a refresh runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredScenarios {
    records: Vec<ScenarioRecord>,
}

impl FilteredScenarios {
    pub fn iter(&self) -> std::slice::Iter<'_, ScenarioRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<ScenarioRecord> {
        self.records
    }
}

impl IntoIterator for FilteredScenarios {
    type Item = ScenarioRecord;
    type IntoIter = std::vec::IntoIter<ScenarioRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a FilteredScenarios {
    type Item = &'a ScenarioRecord;
    type IntoIter = std::slice::Iter<'a, ScenarioRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Matching records, sorted, copied out under one lock acquisition
pub fn filter(store: &CatalogStore, filter: &Filter, sort: Sort) -> FilteredScenarios {
    let mut records: Vec<ScenarioRecord> = store.with_records(|records| {
        records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    });
    records.sort_by(|a, b| sort.compare(a, b));
    FilteredScenarios { records }
}

/// Codes ordered by load count desc, last load desc, then code asc
///
/// Only codes present in `usage` can appear.
pub fn rank_usage(usage: &HashMap<String, UsageRecord>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&String, &UsageRecord)> = usage.iter().collect();
    ranked.sort_by(|(code_a, a), (code_b, b)| {
        b.load_count
            .cmp(&a.load_count)
            .then_with(|| b.last_loaded_at.cmp(&a.last_loaded_at))
            .then_with(|| code_a.cmp(code_b))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(code, _)| code.clone())
        .collect()
}

/// Most-used scenarios still present in the catalog
///
/// Scenarios never loaded are excluded, not ranked as zero. The ledger and
/// catalog locks are taken one after the other, never nested.
pub fn ranked_favorites(
    catalog: &CatalogStore,
    ledger: &UsageLedger,
    limit: usize,
) -> Vec<ScenarioRecord> {
    let usage = ledger.snapshot();
    let ranked = rank_usage(&usage, usage.len());

    catalog.with_records(|records| {
        ranked
            .iter()
            .filter_map(|code| records.get(code))
            .take(limit)
            .cloned()
            .collect()
    })
}

/// Which step of the fallback chain produced a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioSource {
    QuickPick,
    Favorite,
    BuiltInDefault,
}

impl fmt::Display for ScenarioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioSource::QuickPick => "quick pick",
            ScenarioSource::Favorite => "favorite",
            ScenarioSource::BuiltInDefault => "built-in default",
        };
        f.write_str(name)
    }
}

/// Resolve the scenario to load: quick pick, then top favorite, then the
/// first built-in default
///
/// Each step only yields codes present in the catalog, so an empty catalog
/// resolves to nothing.
pub fn resolve_scenario(
    quick_pick: Option<&str>,
    catalog: &CatalogStore,
    ledger: &UsageLedger,
) -> Option<(String, ScenarioSource)> {
    if let Some(pick) = quick_pick.map(normalize_code).filter(|c| !c.is_empty()) {
        if catalog.contains(&pick) {
            return Some((pick, ScenarioSource::QuickPick));
        }
        tracing::debug!("Quick pick {} is not in the catalog", pick);
    }

    if let Some(top) = ranked_favorites(catalog, ledger, 1).into_iter().next() {
        return Some((top.code, ScenarioSource::Favorite));
    }

    default_scenario_codes()
        .find(|code| catalog.contains(code))
        .map(|code| (code.to_string(), ScenarioSource::BuiltInDefault))
}
