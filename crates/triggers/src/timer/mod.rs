//! Timer triggers driven by six-field NCRONTAB schedules.

pub mod runner;
pub mod schedule;

pub use runner::{TimerHandler, TimerInfo, TimerTrigger};
pub use schedule::{Schedule, ScheduleError};
