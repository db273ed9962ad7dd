//! Timer trigger runtime.

use std::sync::mpsc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::worker::WorkerHandle;

use super::schedule::Schedule;

/// Invocation context handed to a timer handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerInfo {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
    /// The invocation started later than the past-due tolerance allows.
    pub is_past_due: bool,
    pub last: Option<DateTime<Utc>>,
    pub next: Option<DateTime<Utc>>,
}

/// Timer handler function type.
pub type TimerHandler = Box<dyn Fn(&TimerInfo) + Send + Sync>;

/// A named schedule plus the handler it drives.
pub struct TimerTrigger {
    name: String,
    schedule: Schedule,
    handler: TimerHandler,
    past_due_after: Duration,
}

impl TimerTrigger {
    pub fn new<F>(name: impl Into<String>, schedule: Schedule, handler: F) -> Self
    where
        F: Fn(&TimerInfo) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            schedule,
            handler: Box::new(handler),
            past_due_after: Duration::seconds(1),
        }
    }

    pub fn with_past_due_after(mut self, tolerance: Duration) -> Self {
        self.past_due_after = tolerance;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Invoke the handler for the occurrence `scheduled`, observed at `fired`.
    pub fn fire(
        &self,
        scheduled: DateTime<Utc>,
        fired: DateTime<Utc>,
        last: Option<DateTime<Utc>>,
    ) -> TimerInfo {
        let info = TimerInfo {
            name: self.name.clone(),
            scheduled_at: scheduled,
            fired_at: fired,
            is_past_due: fired - scheduled > self.past_due_after,
            last,
            next: self.schedule.next_after(scheduled),
        };
        (self.handler)(&info);
        info
    }

    /// Run the trigger on a background thread until shut down.
    ///
    /// Missed occurrences are not replayed: after a late wake-up the trigger
    /// fires once (past due) and then waits for the next future occurrence.
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name(format!("timer-{}", self.name))
            .spawn(move || timer_loop(self, shutdown_rx))?;
        Ok(WorkerHandle::new(shutdown_tx, join))
    }
}

impl std::fmt::Debug for TimerTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerTrigger")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("past_due_after", &self.past_due_after)
            .finish_non_exhaustive()
    }
}

fn timer_loop(trigger: TimerTrigger, shutdown_rx: mpsc::Receiver<()>) {
    info!(timer = %trigger.name, schedule = %trigger.schedule, "timer trigger started");
    let mut last: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let cursor = last.map_or(now, |l| l.max(now));
        let Some(next) = trigger.schedule.next_after(cursor) else {
            warn!(timer = %trigger.name, "schedule has no further occurrences");
            break;
        };

        let wait = (next - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
        debug!(timer = %trigger.name, next = %next, "waiting for next occurrence");
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        trigger.fire(next, Utc::now(), last);
        last = Some(next);
    }

    info!(timer = %trigger.name, "timer trigger stopped");
}
