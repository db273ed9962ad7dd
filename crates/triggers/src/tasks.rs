//! Built-in timer functions.

use tracing::{info, warn};

use crate::timer::{Schedule, ScheduleError, TimerInfo, TimerTrigger};

pub const SCHEDULED_TASK: &str = "scheduledTask";
pub const SCHEDULED_TASK_SCHEDULE: &str = "0 */5 * * * *";

pub const DAILY_TASK: &str = "dailyTask";
pub const DAILY_TASK_SCHEDULE: &str = "0 0 0 * * *";

/// Runs every five minutes.
pub fn scheduled_task(timer: &TimerInfo) {
    if timer.is_past_due {
        warn!(timer = %timer.name, scheduled_at = %timer.scheduled_at, "timer is running late");
    }
    info!(timer = %timer.name, fired_at = %timer.fired_at, "timer trigger function executed");
    info!(timer = %timer.name, "scheduled task completed");
}

/// Runs at midnight UTC.
pub fn daily_task(timer: &TimerInfo) {
    info!(timer = %timer.name, fired_at = %timer.fired_at, "daily task started");
    let next = timer.next.map(|n| n.to_rfc3339());
    info!(
        timer = %timer.name,
        past_due = timer.is_past_due,
        next = next.as_deref().unwrap_or("none"),
        "daily statistics generated"
    );
    info!(timer = %timer.name, "daily task completed");
}

/// The timers the host runs when timers are enabled.
pub fn default_timers() -> Result<Vec<TimerTrigger>, ScheduleError> {
    Ok(vec![
        TimerTrigger::new(SCHEDULED_TASK, Schedule::parse(SCHEDULED_TASK_SCHEDULE)?, scheduled_task),
        TimerTrigger::new(DAILY_TASK, Schedule::parse(DAILY_TASK_SCHEDULE)?, daily_task),
    ])
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn default_timers_use_documented_schedules() {
        let timers = default_timers().unwrap();
        let names: Vec<_> = timers.iter().map(|t| (t.name(), t.schedule().expression())).collect();
        assert_eq!(
            names,
            vec![
                (SCHEDULED_TASK, "0 */5 * * * *"),
                (DAILY_TASK, "0 0 0 * * *"),
            ]
        );
    }

    #[test]
    fn daily_task_next_is_following_midnight() {
        let timers = default_timers().unwrap();
        let daily = &timers[1];
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let info = daily.fire(midnight, midnight, None);
        assert_eq!(info.next, Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
    }
}
