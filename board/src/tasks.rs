//! Task arena: background work owned by a board session.
//!
//! Every timer and subscription forwarder a session starts is spawned
//! through its [`TaskArena`]. Aborting the arena (explicitly on leave, or
//! implicitly on drop) cancels all of them, so no callback outlives the
//! session it was started for.

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tasks_test;

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TaskArena {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` onto the current runtime, owned by this arena.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(future)));
    }

    /// Run `tick` every `period`, first one `period` from now. Ticks missed
    /// while a previous one was still running are skipped.
    pub fn spawn_interval<F, Fut>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
    }

    /// Tasks still running.
    #[must_use]
    pub fn live(&self) -> usize {
        self.tasks.iter().filter(|(_, handle)| !handle.is_finished()).count()
    }

    /// Cancel everything. Safe to call more than once.
    pub fn abort_all(&mut self) {
        for (name, handle) in self.tasks.drain(..) {
            if !handle.is_finished() {
                debug!(task = name, "aborting session task");
            }
            handle.abort();
        }
    }
}

impl Drop for TaskArena {
    fn drop(&mut self) {
        self.abort_all();
    }
}
