//! Match-end automation driven through the public API

mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{scenario, RecordingHost};
use postgame_core::catalog::{default_scenario_codes, CatalogStore};
use postgame_core::host::{HookEvent, TickScheduler};
use postgame_core::resolution::{ranked_favorites, ScenarioSource};
use postgame_core::settings::{DataPaths, MapMode, MemorySettings, KEY_MODE, KEY_QUICK_PICK};
use postgame_core::usage::UsageLedger;
use postgame_core::{effective_delay, Automation, MIN_DELAY_SECS};

struct Harness {
    settings: Arc<MemorySettings>,
    host: Arc<RecordingHost>,
    scheduler: Arc<TickScheduler>,
    automation: Automation,
}

fn harness(values: &[(&str, &str)], catalog: CatalogStore, ledger: UsageLedger) -> Harness {
    let settings = Arc::new(MemorySettings::with_values(values.iter().copied()));
    let host = Arc::new(RecordingHost::default());
    let scheduler = Arc::new(TickScheduler::new());
    let automation = Automation::new(
        settings.clone(),
        Arc::new(catalog),
        Arc::new(ledger),
        host.clone(),
        scheduler.clone(),
        None,
    )
    .unwrap();
    Harness {
        settings,
        host,
        scheduler,
        automation,
    }
}

#[test]
fn test_empty_catalog_in_scenario_mode_schedules_nothing() {
    let h = harness(
        &[("postgame_enabled", "1"), ("postgame_mode", "scenario")],
        CatalogStore::new(),
        UsageLedger::in_memory(),
    );

    assert!(h.automation.handle_event(&HookEvent::MatchEnded));
    assert_eq!(h.scheduler.pending(), 0);
    h.scheduler.advance(Duration::from_secs(60));
    assert!(h.host.lines().is_empty());
}

#[test]
fn test_empty_catalog_still_requeues() {
    let h = harness(
        &[
            ("postgame_enabled", "true"),
            ("postgame_mode", "scenario"),
            ("postgame_auto_requeue", "true"),
            ("postgame_delay_requeue", "3"),
        ],
        CatalogStore::new(),
        UsageLedger::in_memory(),
    );

    h.automation.handle_event(&HookEvent::MatchEnded);
    assert_eq!(h.scheduler.pending_delays(), vec![Duration::from_secs(3)]);
    h.scheduler.advance(Duration::from_secs(3));
    assert_eq!(h.host.lines(), vec!["queue"]);
}

#[test]
fn test_quick_pick_issued_at_clamped_delay() {
    let code = "AAAA-AAAA-AAAA-AAAA";
    let h = harness(
        &[
            ("postgame_enabled", "true"),
            ("postgame_mode", "scenario"),
            ("postgame_quick_pick", "aaaa-aaaa-aaaa-aaaa"),
            ("postgame_delay_scenario", "0.01"),
        ],
        CatalogStore::from_records([scenario(code, "Quick", 10)]),
        UsageLedger::in_memory(),
    );

    let plan = h.automation.engine().plan();
    let load = plan.load.unwrap();
    assert_eq!(load.source, Some(ScenarioSource::QuickPick));
    assert_eq!(load.delay, effective_delay(MIN_DELAY_SECS));

    h.automation.handle_event(&HookEvent::MatchEnded);
    h.scheduler.advance(Duration::from_millis(99));
    assert!(h.host.lines().is_empty());
    h.scheduler.advance(Duration::from_millis(1));
    assert_eq!(h.host.lines(), vec![format!("load_training {code}")]);
    assert_eq!(h.automation.ledger().get(code).unwrap().load_count, 1);
}

#[test]
fn test_delays_below_floor_all_clamp() {
    for configured in [0.0, 0.05, -4.0, f64::NAN] {
        assert_eq!(effective_delay(configured), Duration::from_millis(100), "{configured}");
    }
    assert_eq!(effective_delay(2.5), Duration::from_millis(2500));
}

#[test]
fn test_most_loaded_scenario_is_the_favorite() {
    let x = "1111-1111-1111-1111";
    let y = "2222-2222-2222-2222";
    let ledger = UsageLedger::in_memory();
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    for i in 0..3 {
        ledger.record_load_at(x, base + ChronoDuration::minutes(i)).unwrap();
    }
    // Y loaded most recently, but only once
    ledger.record_load_at(y, base + ChronoDuration::hours(1)).unwrap();

    let catalog = CatalogStore::from_records([scenario(x, "X", 10), scenario(y, "Y", 10)]);
    let favorites = ranked_favorites(&catalog, &ledger, 1);
    let codes: Vec<&str> = favorites.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec![x]);

    let h = harness(
        &[("postgame_enabled", "true"), ("postgame_mode", "scenario")],
        catalog,
        ledger,
    );
    let load = h.automation.engine().plan().load.unwrap();
    assert_eq!(load.source, Some(ScenarioSource::Favorite));
    assert_eq!(load.record_usage.as_deref(), Some(x));
}

#[test]
fn test_favorites_ties_independent_of_load_order() {
    let codes = ["CCCC-0000-0000-0000", "AAAA-0000-0000-0000", "BBBB-0000-0000-0000"];
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
    let catalog = CatalogStore::from_records(codes.map(|c| scenario(c, c, 10)));

    let forward = UsageLedger::in_memory();
    for code in codes {
        forward.record_load_at(code, at).unwrap();
    }
    let backward = UsageLedger::in_memory();
    for code in codes.iter().rev() {
        backward.record_load_at(code, at).unwrap();
    }

    let order = |ledger: &UsageLedger| -> Vec<String> {
        ranked_favorites(&catalog, ledger, 10)
            .into_iter()
            .map(|r| r.code)
            .collect()
    };
    assert_eq!(order(&forward), order(&backward));
    assert_eq!(
        order(&forward),
        vec!["AAAA-0000-0000-0000", "BBBB-0000-0000-0000", "CCCC-0000-0000-0000"]
    );
}

#[test]
fn test_never_loaded_scenarios_fall_back_to_defaults() {
    let h = harness(
        &[("postgame_enabled", "true"), ("postgame_mode", "scenario")],
        CatalogStore::with_defaults(),
        UsageLedger::in_memory(),
    );

    let first_default = default_scenario_codes().next().unwrap();
    assert!(ranked_favorites(h.automation.catalog(), h.automation.ledger(), 5).is_empty());

    let load = h.automation.engine().plan().load.unwrap();
    assert_eq!(load.source, Some(ScenarioSource::BuiltInDefault));
    assert_eq!(load.record_usage.as_deref(), Some(first_default));
}

#[test]
fn test_settings_changes_apply_to_next_match() {
    let code = "ABCD-ABCD-ABCD-ABCD";
    let h = harness(
        &[("postgame_enabled", "true")],
        CatalogStore::from_records([scenario(code, "Pick", 8)]),
        UsageLedger::in_memory(),
    );

    h.automation.handle_event(&HookEvent::MatchEnded);
    h.scheduler.advance(Duration::from_secs(1));

    h.settings.set(KEY_MODE, MapMode::Scenario.to_string());
    h.settings.set(KEY_QUICK_PICK, code);
    h.automation.handle_event(&HookEvent::MatchEnded);
    h.scheduler.advance(Duration::from_secs(1));

    assert_eq!(
        h.host.lines(),
        vec!["load_freeplay Stadium_P".to_string(), format!("load_training {code}")]
    );
}

#[test]
fn test_workshop_mode_without_map_loads_freeplay() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("gone.upk");
    let h = harness(
        &[
            ("postgame_enabled", "true"),
            ("postgame_mode", "workshop"),
            ("postgame_workshop_path", missing.to_str().unwrap()),
            ("postgame_freeplay_map", "Park_P"),
            ("postgame_delay_freeplay", "1"),
            ("postgame_delay_workshop", "5"),
        ],
        CatalogStore::new(),
        UsageLedger::in_memory(),
    );

    h.automation.handle_event(&HookEvent::MatchEnded);
    assert_eq!(h.scheduler.pending_delays(), vec![Duration::from_secs(1)]);
    h.scheduler.advance(Duration::from_secs(1));
    assert_eq!(h.host.lines(), vec!["load_freeplay Park_P"]);
}

#[test]
fn test_usage_survives_restart() {
    let temp = TempDir::new().unwrap();
    let paths = DataPaths::at(temp.path());
    paths.ensure().unwrap();
    let code = "AAAA-AAAA-AAAA-AAAA";
    CatalogStore::from_records([scenario(code, "Persisted", 10)])
        .save(&paths.catalog_file)
        .unwrap();

    let settings = Arc::new(MemorySettings::with_values([
        ("postgame_enabled", "true"),
        ("postgame_mode", "scenario"),
        ("postgame_quick_pick", code),
    ]));
    let scheduler = Arc::new(TickScheduler::new());
    let automation = Automation::open(
        &paths,
        settings,
        Arc::new(RecordingHost::default()),
        scheduler.clone(),
    )
    .unwrap();

    for _ in 0..2 {
        automation.handle_event(&HookEvent::MatchEnded);
        scheduler.advance(Duration::from_secs(1));
    }

    let reopened = UsageLedger::open(&paths.usage_file).unwrap();
    assert_eq!(reopened.get(code).unwrap().load_count, 2);
    assert!(!reopened.is_first_run());
}
