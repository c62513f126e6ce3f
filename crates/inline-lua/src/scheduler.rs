//! Script timers.
//!
//! `inline.schedule` queues a task here. Nothing runs on its own: the host
//! pumps [`ScriptRuntime::run_due_timers`](crate::ScriptRuntime::run_due_timers)
//! from its dispatch thread, so timer callbacks are serialized with text
//! events.
//!
//! Every task carries the environment generation it was created in. A reload
//! drops all pending tasks and bumps the generation; anything tagged with an
//! older generation is discarded instead of run.

use mlua::Function;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier returned by `inline.schedule`.
pub type TaskId = u64;

struct Task {
    due: Instant,
    period: Option<Duration>,
    callable: Function,
    generation: u64,
}

/// A task whose time has come.
pub struct DueTask {
    pub id: TaskId,
    pub callable: Function,
    pub generation: u64,
}

struct SchedulerState {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, Task>,
}

pub struct Scheduler {
    state: Mutex<SchedulerState>,
    generation: Arc<AtomicU64>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                next_id: 1,
                tasks: BTreeMap::new(),
            }),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues `callable` to run after `delay`, then every `period` if given.
    pub fn schedule(
        &self,
        delay: Duration,
        period: Option<Duration>,
        callable: Function,
    ) -> TaskId {
        self.schedule_at(Instant::now() + delay, period, callable)
    }

    pub fn schedule_at(
        &self,
        due: Instant,
        period: Option<Duration>,
        callable: Function,
    ) -> TaskId {
        let generation = self.generation();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.tasks.insert(
            id,
            Task {
                due,
                period: period.filter(|p| !p.is_zero()),
                callable,
                generation,
            },
        );
        id
    }

    /// Cancels a pending task. Unknown ids are ignored.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.state.lock().tasks.remove(&id).is_some()
    }

    /// Drops every pending task and starts a new generation.
    pub fn reset(&self) -> u64 {
        self.state.lock().tasks.clear();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Token that reports whether the current generation is still live.
    #[must_use]
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            generation: self.generation(),
            current: Arc::clone(&self.generation),
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Earliest due time among pending tasks.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.state.lock().tasks.values().map(|t| t.due).min()
    }

    /// Removes and returns the tasks due at `now`, ordered by due time then
    /// id. Periodic tasks are re-queued for their next period.
    pub fn take_due(&self, now: Instant) -> Vec<DueTask> {
        let mut state = self.state.lock();

        let mut due: Vec<(Instant, TaskId)> = state
            .tasks
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(id, t)| (t.due, *id))
            .collect();
        due.sort();

        let mut out = Vec::with_capacity(due.len());
        for (_, id) in due {
            let Some(task) = state.tasks.remove(&id) else {
                continue;
            };
            out.push(DueTask {
                id,
                callable: task.callable.clone(),
                generation: task.generation,
            });
            if let Some(period) = task.period {
                let mut next = task.due + period;
                if next <= now {
                    next = now + period;
                }
                state.tasks.insert(id, Task { due: next, ..task });
            }
        }
        out
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Captured environment generation.
///
/// Hosts that hand work to their own async facilities keep a token and check
/// [`is_current`](Self::is_current) before re-entering the engine.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}
