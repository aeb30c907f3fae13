//! Periodic wake-up scheduling.
//!
//! [`PeriodicScheduler`] owns the single pending maintenance wake-up. It
//! aligns triggers to fixed interval boundaries so repeated calls from
//! different lifecycle signals converge on the same schedule, and it treats
//! re-scheduling as replacement so at most one wake-up is ever pending.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scheduler::alarm::{AlarmDriver, AlarmError, WakeupKind};

/// Default spacing between periodic maintenance wake-ups: one hour.
pub const DEFAULT_JOB_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Errors raised while (re)scheduling the maintenance wake-up.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The platform refuses exact wake-ups; nothing was armed.
    #[error("exact wake-ups denied by platform policy")]
    ExactAlarmDenied,

    /// The alarm driver failed to arm the wake-up.
    #[error("alarm driver error: {0}")]
    Driver(String),
}

impl From<AlarmError> for ScheduleError {
    fn from(e: AlarmError) -> Self {
        match e {
            AlarmError::ExactDenied => Self::ExactAlarmDenied,
            AlarmError::Driver(msg) => Self::Driver(msg),
        }
    }
}

/// The pending wake-up as last armed by [`PeriodicScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Epoch milliseconds at which the wake-up fires.
    pub next_fire_ms: u64,
    /// Whether the armed wake-up fires exactly on time even while idle.
    pub exact: bool,
}

/// Owns the lifecycle of the periodic maintenance wake-up.
pub struct PeriodicScheduler {
    driver: Arc<dyn AlarmDriver>,
    state: Mutex<Option<ScheduleState>>,
    interval_ms: u64,
}

impl PeriodicScheduler {
    /// Create a scheduler over `driver` with the default hourly interval.
    pub fn new(driver: Arc<dyn AlarmDriver>) -> Self {
        Self {
            driver,
            state: Mutex::new(None),
            interval_ms: DEFAULT_JOB_INTERVAL_MS,
        }
    }

    /// Override the wake-up interval in milliseconds (minimum 1).
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(1);
        self
    }

    /// The wake-up interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// The next interval boundary strictly after `now_ms`.
    pub fn next_trigger_at(&self, now_ms: u64) -> u64 {
        (now_ms / self.interval_ms + 1) * self.interval_ms
    }

    /// Arm (or re-arm) the periodic wake-up for the next interval boundary.
    ///
    /// Replaces any previously pending wake-up, so calling this from every
    /// lifecycle signal is safe: exactly one wake-up remains pending. If the
    /// platform denies exact wake-ups nothing stays armed and
    /// [`ScheduleError::ExactAlarmDenied`] is returned.
    pub fn ensure_scheduled(&self, now_ms: u64) -> Result<ScheduleState, ScheduleError> {
        if !self.driver.can_schedule_exact() {
            warn!("exact wake-ups denied; leaving maintenance unscheduled");
            self.cancel();
            return Err(ScheduleError::ExactAlarmDenied);
        }

        let trigger = self.next_trigger_at(now_ms);
        let kind = match self.driver.arm(trigger) {
            Ok(kind) => kind,
            Err(e) => {
                // Driver state is unknown after a failed arm; claim nothing.
                *self.state_guard() = None;
                return Err(e.into());
            }
        };

        let state = ScheduleState {
            next_fire_ms: trigger,
            exact: matches!(kind, WakeupKind::Exact),
        };
        *self.state_guard() = Some(state);

        let when =
            chrono::DateTime::from_timestamp_millis(i64::try_from(trigger).unwrap_or_default())
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| format!("{trigger}ms"));
        info!("maintenance wake-up armed for {when}");
        Ok(state)
    }

    /// Drop the pending wake-up. No-op when nothing is scheduled.
    pub fn cancel(&self) {
        if self.state_guard().take().is_some() {
            self.driver.disarm();
            debug!("maintenance wake-up cancelled");
        }
    }

    /// Whether a wake-up is currently pending.
    pub fn is_scheduled(&self) -> bool {
        self.state_guard().is_some()
    }

    /// The pending wake-up, if any.
    pub fn schedule_state(&self) -> Option<ScheduleState> {
        *self.state_guard()
    }

    fn state_guard(&self) -> MutexGuard<'_, Option<ScheduleState>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
