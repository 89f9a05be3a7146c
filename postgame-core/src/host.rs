//! Host interfaces
//!
//! The game owns command execution, deferred scheduling and event
//! delivery. The core reaches it only through the traits here and stores
//! nothing the host hands out beyond plain data.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::AutomationError;

/// The four command shapes the host accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    LoadFreeplay { map: String },
    LoadScenario { code: String },
    LoadWorkshop { path: PathBuf },
    JoinMatchmaking,
}

impl HostCommand {
    /// Text form understood by the host console
    pub fn to_command_line(&self) -> String {
        match self {
            HostCommand::LoadFreeplay { map } => format!("load_freeplay {map}"),
            HostCommand::LoadScenario { code } => format!("load_training {code}"),
            HostCommand::LoadWorkshop { path } => format!("load_workshop \"{}\"", path.display()),
            HostCommand::JoinMatchmaking => "queue".to_string(),
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Text-command entry point, called on the game context only
pub trait HostCommands: Send + Sync {
    fn execute(&self, command_line: &str);
}

/// One-shot closure run by a [`Scheduler`]
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// "Run this once, after at least `delay`, on the game context"
///
/// Tasks cannot be cancelled; a task that may outlive its purpose must
/// check a guard when it fires.
pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, task: DeferredTask);
}

#[derive(Default)]
struct TickQueue {
    now: Duration,
    next_seq: u64,
    order: BinaryHeap<Reverse<(Duration, u64)>>,
    tasks: HashMap<u64, DeferredTask>,
}

/// Scheduler pumped by the host's game loop
///
/// Each frame the host calls [`TickScheduler::advance`] with the time since
/// the previous frame; every task whose due time has passed runs on that
/// thread, in due order.
#[derive(Default)]
pub struct TickScheduler {
    queue: Mutex<TickQueue>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TickQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance the clock and run everything now due
    ///
    /// Returns the number of tasks run. Tasks scheduled by a running task
    /// are queued relative to the advanced clock.
    pub fn advance(&self, elapsed: Duration) -> usize {
        let due = {
            let mut queue = self.lock();
            queue.now += elapsed;
            let now = queue.now;

            let mut due = Vec::new();
            while let Some(Reverse((at, seq))) = queue.order.peek().copied() {
                if at > now {
                    break;
                }
                queue.order.pop();
                if let Some(task) = queue.tasks.remove(&seq) {
                    due.push(task);
                }
            }
            due
        };

        let ran = due.len();
        for task in due {
            task();
        }
        ran
    }

    /// Tasks still waiting
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Delays of every waiting task, measured from the current clock
    pub fn pending_delays(&self) -> Vec<Duration> {
        let queue = self.lock();
        let mut delays: Vec<Duration> = queue
            .order
            .iter()
            .map(|Reverse((at, _))| at.saturating_sub(queue.now))
            .collect();
        delays.sort();
        delays
    }
}

impl Scheduler for TickScheduler {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        let mut queue = self.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        let at = queue.now + delay;
        queue.order.push(Reverse((at, seq)));
        queue.tasks.insert(seq, task);
    }
}

/// Scheduler backed by tokio timers
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling task
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// Events the host delivers to the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    MatchEnded,
    ScenarioLoaded { code: String, shot_count: u32 },
}

impl HookEvent {
    pub const MATCH_ENDED: &'static str = "match_ended";
    pub const SCENARIO_LOADED: &'static str = "scenario_loaded";

    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::MatchEnded => Self::MATCH_ENDED,
            HookEvent::ScenarioLoaded { .. } => Self::SCENARIO_LOADED,
        }
    }
}

pub type HookHandler = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// Event routing with exactly one handler per event name
///
/// Concerns that need the same event must share one handler; registering
/// a second is an error rather than being silently ignored.
#[derive(Default)]
pub struct HookTable {
    handlers: Mutex<HashMap<&'static str, HookHandler>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event: &'static str, handler: HookHandler) -> Result<(), AutomationError> {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        if handlers.contains_key(event) {
            return Err(AutomationError::DuplicateHook {
                event: event.to_string(),
            });
        }
        handlers.insert(event, handler);
        tracing::debug!("Registered handler for {}", event);
        Ok(())
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event)
    }

    /// Deliver an event; returns false when nothing handles it
    pub fn fire(&self, event: &HookEvent) -> bool {
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.name())
            .cloned();

        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                tracing::debug!("No handler for {}", event.name());
                false
            }
        }
    }
}
