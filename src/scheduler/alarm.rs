//! Wake-up delivery seam for the periodic scheduler.
//!
//! The scheduler decides *when* the next maintenance pass should run; an
//! [`AlarmDriver`] decides *how* the wake-up is delivered. Hosts with a
//! platform alarm facility implement the trait over it. [`InProcessAlarm`]
//! is the built-in driver: a Tokio timer that lives only as long as the
//! process and feeds the wake-up back through the signal channel.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::history::types::now_epoch_millis;
use crate::scheduler::dispatcher::Signal;

/// Errors raised while arming a wake-up.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    /// The platform refuses exact wake-ups for this process.
    #[error("exact wake-ups denied by platform policy")]
    ExactDenied,

    /// Driver-specific failure.
    #[error("alarm driver error: {0}")]
    Driver(String),
}

/// How an armed wake-up will fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupKind {
    /// Fires at the trigger time regardless of idle or doze state.
    Exact,
    /// May be deferred by the platform to batch wake-ups.
    Inexact,
}

/// A facility that delivers at most one pending wake-up at an absolute time.
///
/// Arming while a wake-up is already pending replaces it; a driver never
/// holds more than one pending wake-up.
pub trait AlarmDriver: Send + Sync {
    /// Whether the platform currently permits exact wake-ups.
    fn can_schedule_exact(&self) -> bool;

    /// Arm (or replace) the pending wake-up for `trigger_at_ms` epoch
    /// milliseconds. Returns the kind of wake-up actually armed.
    fn arm(&self, trigger_at_ms: u64) -> Result<WakeupKind, AlarmError>;

    /// Drop the pending wake-up, if any.
    fn disarm(&self);
}

/// Tokio-backed in-process driver.
///
/// Sleeps until the trigger time and then sends [`Signal::PeriodicRecheck`]
/// into the dispatcher's signal channel. Must be used from within a Tokio
/// runtime.
pub struct InProcessAlarm {
    signal_tx: mpsc::UnboundedSender<Signal>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl InProcessAlarm {
    /// Create a driver that delivers wake-ups on `signal_tx`.
    pub fn new(signal_tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self {
            signal_tx,
            pending: Mutex::new(None),
        }
    }

    fn replace_pending(&self, next: Option<JoinHandle<()>>) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = next;
    }
}

impl AlarmDriver for InProcessAlarm {
    fn can_schedule_exact(&self) -> bool {
        // Process-local timers need no platform permission.
        true
    }

    fn arm(&self, trigger_at_ms: u64) -> Result<WakeupKind, AlarmError> {
        let delay_ms = trigger_at_ms.saturating_sub(now_epoch_millis());
        let tx = self.signal_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            if tx.send(Signal::PeriodicRecheck).is_err() {
                debug!("wake-up fired but the signal channel is closed");
            }
        });
        self.replace_pending(Some(handle));
        debug!("in-process wake-up armed in {delay_ms}ms");
        Ok(WakeupKind::Exact)
    }

    fn disarm(&self) {
        self.replace_pending(None);
    }
}
