//! Maintenance scheduling.
//!
//! Keeps the periodic maintenance wake-up armed and routes lifecycle
//! signals to the right store maintenance. The [`gateway`] owns the single
//! pending wake-up, with [`alarm`] as the delivery seam beneath it; the
//! [`dispatcher`] ties both to the usage history store.

pub mod alarm;
pub mod dispatcher;
pub mod gateway;

pub use alarm::{AlarmDriver, AlarmError, InProcessAlarm, WakeupKind};
pub use dispatcher::{DEFAULT_RECHECK_DELAY, MaintenanceDispatcher, Signal, UserScope};
pub use gateway::{DEFAULT_JOB_INTERVAL_MS, PeriodicScheduler, ScheduleError, ScheduleState};
