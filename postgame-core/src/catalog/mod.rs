//! Scenario catalog
//!
//! Holds the practice scenarios the automation can load after a match.
//!
//! # Overview
//!
//! - [`ScenarioRecord`] describes one scenario, keyed by its code
//! - [`CatalogStore`] owns the records and applies refresh merges
//! - [`CatalogSnapshot`] is the persisted `catalog.json` document
//! - built-in default scenarios seed a fresh installation
//! - the freeplay arena table backs the Freeplay mode
//!
//! ```text
//! remote snapshot ──fetch_snapshot──► merge_catalog_refresh
//!                                          │
//! catalog.json ◄──save── CatalogStore ◄────┘
//!                             │
//!                             ▼
//!                  resolution (filter, favorites)
//! ```

mod defaults;
mod freeplay;
mod record;
mod snapshot;
mod store;

pub use defaults::{default_scenario_codes, default_scenarios};
pub use freeplay::{
    find_freeplay_map, resolve_freeplay_map, FreeplayMap, DEFAULT_FREEPLAY_MAP, FREEPLAY_MAPS,
};
pub use record::{
    is_valid_code, normalize_code, validate_code, DifficultyTier, Origin, Popularity,
    ScenarioRecord,
};
pub use snapshot::{
    fetch_snapshot, is_snapshot_stale, CatalogSnapshot, SNAPSHOT_MAX_AGE, SNAPSHOT_VERSION,
};
pub use store::{CatalogStore, MergeReport};
