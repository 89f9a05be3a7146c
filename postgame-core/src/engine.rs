//! Decision engine
//!
//! On match end: pick what to load, clamp the delay, and hand the host a
//! deferred load (plus an independent deferred requeue). Nothing here runs
//! synchronously inside the match-end callback, and no failure escapes it.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{resolve_freeplay_map, CatalogStore};
use crate::host::{HostCommand, HostCommands, Scheduler};
use crate::resolution::{resolve_scenario, ScenarioSource};
use crate::settings::{AutomationSettings, MapMode, SettingsProvider};
use crate::usage::UsageLedger;

/// Hard lower bound on every deferred command, in seconds
pub const MIN_DELAY_SECS: f64 = 0.1;

/// Clamp a configured delay to the floor
///
/// Anything below the floor, negative or NaN becomes exactly the floor.
pub fn effective_delay(configured_secs: f64) -> Duration {
    let floor = Duration::from_secs_f64(MIN_DELAY_SECS);
    if configured_secs.is_nan() || configured_secs < MIN_DELAY_SECS {
        return floor;
    }
    Duration::try_from_secs_f64(configured_secs).unwrap_or(Duration::MAX)
}

/// A resolved load, ready to schedule
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    pub command: HostCommand,
    pub delay: Duration,
    /// The mode actually used (Workshop may fall back to Freeplay)
    pub mode: MapMode,
    /// Scenario code to count once the load is issued
    pub record_usage: Option<String>,
    pub source: Option<ScenarioSource>,
}

/// Everything scheduled for one match end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchEndPlan {
    pub load: Option<LoadPlan>,
    pub requeue_delay: Option<Duration>,
}

impl MatchEndPlan {
    pub fn is_empty(&self) -> bool {
        self.load.is_none() && self.requeue_delay.is_none()
    }
}

pub struct DecisionEngine {
    settings: Arc<dyn SettingsProvider>,
    catalog: Arc<CatalogStore>,
    ledger: Arc<UsageLedger>,
    host: Arc<dyn HostCommands>,
    scheduler: Arc<dyn Scheduler>,
}

impl DecisionEngine {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        catalog: Arc<CatalogStore>,
        ledger: Arc<UsageLedger>,
        host: Arc<dyn HostCommands>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            settings,
            catalog,
            ledger,
            host,
            scheduler,
        }
    }

    /// Work out what a match end would schedule, without scheduling it
    pub fn plan(&self) -> MatchEndPlan {
        let settings = AutomationSettings::read(self.settings.as_ref());
        if !settings.enabled {
            debug!("Automation disabled, nothing to schedule");
            return MatchEndPlan::default();
        }

        let load = self.plan_load(&settings);
        if load.is_none() {
            debug!(mode = %settings.mode, "Nothing to load, skipping");
        }

        let requeue_delay = settings
            .auto_requeue
            .then(|| effective_delay(settings.requeue_delay_secs));

        MatchEndPlan { load, requeue_delay }
    }

    fn plan_load(&self, settings: &AutomationSettings) -> Option<LoadPlan> {
        match settings.mode {
            MapMode::Freeplay => Some(Self::freeplay_plan(settings)),
            MapMode::Scenario => {
                let (code, source) = resolve_scenario(
                    settings.quick_pick.as_deref(),
                    &self.catalog,
                    &self.ledger,
                )?;
                debug!(code = %code, source = %source, "Resolved scenario");
                Some(LoadPlan {
                    command: HostCommand::LoadScenario { code: code.clone() },
                    delay: effective_delay(settings.scenario_delay_secs),
                    mode: MapMode::Scenario,
                    record_usage: Some(code),
                    source: Some(source),
                })
            }
            MapMode::Workshop => match settings.workshop_path.as_deref() {
                Some(path) if path.is_file() => Some(LoadPlan {
                    command: HostCommand::LoadWorkshop {
                        path: path.to_path_buf(),
                    },
                    delay: effective_delay(settings.workshop_delay_secs),
                    mode: MapMode::Workshop,
                    record_usage: None,
                    source: None,
                }),
                Some(path) => {
                    warn!(
                        "Workshop map {} not found, loading freeplay instead",
                        path.display()
                    );
                    Some(Self::freeplay_plan(settings))
                }
                None => {
                    warn!("No workshop map configured, loading freeplay instead");
                    Some(Self::freeplay_plan(settings))
                }
            },
        }
    }

    fn freeplay_plan(settings: &AutomationSettings) -> LoadPlan {
        LoadPlan {
            command: HostCommand::LoadFreeplay {
                map: resolve_freeplay_map(&settings.freeplay_map),
            },
            delay: effective_delay(settings.freeplay_delay_secs),
            mode: MapMode::Freeplay,
            record_usage: None,
            source: None,
        }
    }

    /// Handle the match-end signal
    ///
    /// Schedules at most one load and one requeue; both timers start now.
    pub fn on_match_ended(&self) {
        let plan = self.plan();

        if let Some(load) = plan.load {
            info!(command = %load.command, delay = ?load.delay, "Scheduling post-match load");
            let host = self.host.clone();
            let ledger = self.ledger.clone();
            let LoadPlan {
                command,
                delay,
                record_usage,
                ..
            } = load;

            self.scheduler.schedule_once(
                delay,
                Box::new(move || {
                    host.execute(&command.to_command_line());
                    if let Some(code) = record_usage {
                        if let Err(e) = ledger.record_load(&code) {
                            warn!("Usage for {} not persisted: {}", code, e);
                        }
                    }
                }),
            );
        }

        if let Some(delay) = plan.requeue_delay {
            info!(delay = ?delay, "Scheduling matchmaking requeue");
            let host = self.host.clone();
            self.scheduler.schedule_once(
                delay,
                Box::new(move || host.execute(&HostCommand::JoinMatchmaking.to_command_line())),
            );
        }
    }
}
