//! Postgame - post-match practice automation
//!
//! After a match ends, load a freeplay arena, a practice scenario or an
//! installed community map, and optionally rejoin matchmaking.
//!
//! # Components
//!
//! - [`settings`]: host-owned configuration, read through a narrow provider
//! - [`catalog`]: practice scenarios and their persisted snapshot
//! - [`usage`]: per-scenario load counts
//! - [`resolution`]: filtering, favorites and the scenario fallback chain
//! - [`engine`]: the match-end decision and deferred scheduling
//! - [`acquisition`]: community map search, download and install
//! - [`host`]: command, scheduler and event interfaces to the game
//! - [`automation`]: wires the above together

pub mod acquisition;
pub mod automation;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod host;
mod persist;
pub mod resolution;
pub mod settings;
pub mod usage;

pub use automation::Automation;
pub use engine::{effective_delay, DecisionEngine, MIN_DELAY_SECS};
pub use error::{AcquisitionError, AutomationError};
