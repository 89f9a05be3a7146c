//! Match-end dry run
//!
//! Wires the automation to a host that prints commands instead of sending
//! them to a game, fires `match_ended` and runs the scheduled work.

use anyhow::Result;
use clap::Parser;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use postgame_core::catalog::normalize_code;
use postgame_core::host::{HookEvent, HostCommands, Scheduler, TickScheduler, TokioScheduler};
use postgame_core::settings::{
    DataPaths, MapMode, SettingsFile, KEY_ENABLED, KEY_MODE, KEY_QUICK_PICK,
};
use postgame_core::Automation;

#[derive(Parser, Debug)]
pub struct SimulateCommand {
    /// Override the configured mode for this run
    #[clap(long)]
    mode: Option<MapMode>,

    /// Override the quick pick for this run
    #[clap(long)]
    quick_pick: Option<String>,

    /// Run even if the automation is disabled in settings
    #[clap(long)]
    force: bool,

    /// Wait out the real delays instead of skipping ahead
    #[clap(long)]
    realtime: bool,

    /// Also report that this scenario loaded with the given shot count
    #[clap(long, value_names = ["CODE", "SHOTS"], num_args = 2)]
    loaded: Option<Vec<String>>,
}

/// Prints each command with the simulated time it was issued at
struct PrintingHost {
    clock: Mutex<Duration>,
}

impl PrintingHost {
    fn new() -> Self {
        Self {
            clock: Mutex::new(Duration::ZERO),
        }
    }

    fn set_clock(&self, now: Duration) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl HostCommands for PrintingHost {
    fn execute(&self, command_line: &str) {
        let now = *self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        println!("[+{:>6.2}s] {}", now.as_secs_f64(), command_line);
    }
}

impl SimulateCommand {
    pub async fn execute(self, paths: &DataPaths) -> Result<()> {
        let settings = Arc::new(SettingsFile::new(&paths.settings_file).load()?);
        if let Some(mode) = self.mode {
            settings.set(KEY_MODE, mode.to_string());
        }
        if let Some(pick) = self.quick_pick {
            settings.set(KEY_QUICK_PICK, pick);
        }
        if self.force {
            settings.set(KEY_ENABLED, "true");
        }

        let host = Arc::new(PrintingHost::new());
        let ticks = Arc::new(TickScheduler::new());
        let scheduler: Arc<dyn Scheduler> = if self.realtime {
            Arc::new(TokioScheduler::current())
        } else {
            ticks.clone()
        };

        let automation = Automation::open(paths, settings, host.clone(), scheduler)?;

        let plan = automation.engine().plan();
        if plan.is_empty() {
            println!("Nothing would be scheduled (is postgame_enabled set? try --force)");
        }
        if let Some(load) = &plan.load {
            let source = load
                .source
                .map(|s| format!(" from {s}"))
                .unwrap_or_default();
            println!("Plan: {} mode{}, {:?} delay", load.mode, source, load.delay);
        }

        automation.handle_event(&HookEvent::MatchEnded);

        if self.realtime {
            let started = Instant::now();
            let longest = plan
                .load
                .as_ref()
                .map(|l| l.delay)
                .into_iter()
                .chain(plan.requeue_delay)
                .max()
                .unwrap_or(Duration::ZERO);
            while started.elapsed() <= longest {
                host.set_clock(started.elapsed());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            // Let the last timer fire
            tokio::time::sleep(Duration::from_millis(50)).await;
        } else {
            let mut now = Duration::ZERO;
            while let Some(next) = ticks.pending_delays().first().copied() {
                now += next;
                host.set_clock(now);
                ticks.advance(next);
            }
        }

        if let Some(loaded) = self.loaded {
            if let [code, shots] = loaded.as_slice() {
                let code = normalize_code(code);
                let shot_count = shots.parse()?;
                automation.handle_event(&HookEvent::ScenarioLoaded {
                    code: code.clone(),
                    shot_count,
                });
                if let Some(record) = automation.catalog().get(&code) {
                    println!("{} now has {} shots", record.code, record.shot_count);
                }
            }
        }

        Ok(())
    }
}
