//! Composition root
//!
//! Builds the stores and the decision engine, and registers the only two
//! event handlers the core needs. Anything else that wants `match_ended`
//! or `scenario_loaded` has to be folded into these handlers.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{normalize_code, CatalogStore};
use crate::engine::DecisionEngine;
use crate::error::AutomationError;
use crate::host::{HookEvent, HookTable, HostCommands, Scheduler};
use crate::settings::{DataPaths, SettingsProvider, KEY_QUICK_PICK};
use crate::usage::UsageLedger;

pub struct Automation {
    catalog: Arc<CatalogStore>,
    ledger: Arc<UsageLedger>,
    engine: Arc<DecisionEngine>,
    hooks: HookTable,
}

impl Automation {
    /// Wire everything together and register the event handlers
    ///
    /// When `catalog_path` is set, shot-count heals are persisted there.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        catalog: Arc<CatalogStore>,
        ledger: Arc<UsageLedger>,
        host: Arc<dyn HostCommands>,
        scheduler: Arc<dyn Scheduler>,
        catalog_path: Option<PathBuf>,
    ) -> Result<Self, AutomationError> {
        let engine = Arc::new(DecisionEngine::new(
            settings.clone(),
            catalog.clone(),
            ledger.clone(),
            host,
            scheduler,
        ));

        let hooks = HookTable::new();

        let match_engine = engine.clone();
        hooks.register(
            HookEvent::MATCH_ENDED,
            Arc::new(move |_| match_engine.on_match_ended()),
        )?;

        let heal_catalog = catalog.clone();
        hooks.register(
            HookEvent::SCENARIO_LOADED,
            Arc::new(move |event| {
                if let HookEvent::ScenarioLoaded { code, shot_count } = event {
                    if heal_catalog.heal_shot_count(code, *shot_count) {
                        if let Some(path) = &catalog_path {
                            // Failure is already logged; the healed value stays in memory
                            let _ = heal_catalog.save(path);
                        }
                    }
                }
            }),
        )?;

        let pick_catalog = catalog.clone();
        settings.subscribe(
            KEY_QUICK_PICK,
            Arc::new(move |_, value| {
                let code = normalize_code(value);
                if !code.is_empty() && !pick_catalog.contains(&code) {
                    tracing::warn!("Quick pick {} is not in the catalog and will be skipped", code);
                }
            }),
        );

        Ok(Self {
            catalog,
            ledger,
            engine,
            hooks,
        })
    }

    /// Load the catalog and usage ledger from a data directory
    pub fn open(
        paths: &DataPaths,
        settings: Arc<dyn SettingsProvider>,
        host: Arc<dyn HostCommands>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let catalog = Arc::new(CatalogStore::load_or_defaults(&paths.catalog_file)?);
        let ledger = Arc::new(UsageLedger::open(&paths.usage_file)?);
        let automation = Self::new(
            settings,
            catalog,
            ledger,
            host,
            scheduler,
            Some(paths.catalog_file.clone()),
        )?;
        Ok(automation)
    }

    /// Deliver a host event; false if no handler is registered for it
    pub fn handle_event(&self, event: &HookEvent) -> bool {
        self.hooks.fire(event)
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScenarioRecord;
    use crate::host::TickScheduler;
    use crate::settings::MemorySettings;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        lines: Mutex<Vec<String>>,
    }

    impl HostCommands for RecordingHost {
        fn execute(&self, command_line: &str) {
            self.lines.lock().unwrap().push(command_line.to_string());
        }
    }

    #[test]
    fn test_registers_both_hooks_once() {
        let automation = Automation::new(
            Arc::new(MemorySettings::new()),
            Arc::new(CatalogStore::new()),
            Arc::new(UsageLedger::in_memory()),
            Arc::new(RecordingHost::default()),
            Arc::new(TickScheduler::new()),
            None,
        )
        .unwrap();

        assert!(automation.hooks().is_registered(HookEvent::MATCH_ENDED));
        assert!(automation.hooks().is_registered(HookEvent::SCENARIO_LOADED));

        let again = automation
            .hooks()
            .register(HookEvent::MATCH_ENDED, Arc::new(|_| {}));
        assert!(matches!(again, Err(AutomationError::DuplicateHook { .. })));
    }

    #[test]
    fn test_match_end_event_drives_engine() {
        let settings = MemorySettings::with_values([("postgame_enabled", "true")]);
        let host = Arc::new(RecordingHost::default());
        let scheduler = Arc::new(TickScheduler::new());
        let automation = Automation::new(
            Arc::new(settings),
            Arc::new(CatalogStore::new()),
            Arc::new(UsageLedger::in_memory()),
            host.clone(),
            scheduler.clone(),
            None,
        )
        .unwrap();

        assert!(automation.handle_event(&HookEvent::MatchEnded));
        assert!(host.lines.lock().unwrap().is_empty());
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*host.lines.lock().unwrap(), vec!["load_freeplay Stadium_P"]);
    }

    #[test]
    fn test_scenario_loaded_heals_and_persists() {
        let temp = TempDir::new().unwrap();
        let paths = DataPaths::at(temp.path());
        let mut record = ScenarioRecord::new("AAAA-AAAA-AAAA-AAAA", "Pack");
        record.shot_count = 10;
        CatalogStore::from_records([record]).save(&paths.catalog_file).unwrap();

        let automation = Automation::open(
            &paths,
            Arc::new(MemorySettings::new()),
            Arc::new(RecordingHost::default()),
            Arc::new(TickScheduler::new()),
        )
        .unwrap();

        automation.handle_event(&HookEvent::ScenarioLoaded {
            code: "AAAA-AAAA-AAAA-AAAA".to_string(),
            shot_count: 12,
        });

        let reloaded = CatalogStore::load(&paths.catalog_file).unwrap();
        let healed = reloaded.get("AAAA-AAAA-AAAA-AAAA").unwrap();
        assert_eq!(healed.shot_count, 12);
        assert!(!healed.is_user_modified);
    }
}
