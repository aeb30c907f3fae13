//! Upkeep: periodic maintenance scheduling for a retention-pruned usage
//! history store.
//!
//! The crate keeps a local time-series store from growing without bound:
//! lifecycle signals from the host (boot, package replacement, clock
//! changes, the periodic wake-up itself) are routed to the maintenance
//! they imply, and a single exact wake-up is kept armed for the next pass.
//!
//! # Architecture
//!
//! Maintenance is built from small parts wired through an async channel:
//! - **History store**: SQLite-backed usage records via `rusqlite`
//! - **Retention policy**: pure window arithmetic over epoch milliseconds
//! - **Scheduler gateway**: owns the single pending wake-up, with the
//!   delivery mechanism behind the [`scheduler::AlarmDriver`] seam
//! - **Dispatcher**: maps each lifecycle [`scheduler::Signal`] to store
//!   maintenance and re-scheduling, never blocking the caller

pub mod config;
pub mod error;
pub mod history;
pub mod retention;
pub mod scheduler;

pub use config::UpkeepConfig;
pub use error::{Result, UpkeepError};
pub use history::{HistoryStore, UsageRecord};
pub use retention::RetentionWindow;
pub use scheduler::{
    AlarmDriver, InProcessAlarm, MaintenanceDispatcher, PeriodicScheduler, ScheduleState, Signal,
    UserScope,
};
