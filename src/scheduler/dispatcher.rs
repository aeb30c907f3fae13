//! Lifecycle signal dispatch.
//!
//! [`MaintenanceDispatcher`] is the single entry point host adapters call
//! when the platform reports a lifecycle event: boot finished, the package
//! was replaced or unsuspended, setup completed, the wall clock changed, or
//! the periodic wake-up fired. Each signal maps to a fixed pair of actions:
//! keep the periodic wake-up armed, and prune or reset the usage history.
//!
//! Store maintenance never runs on the caller's thread. Deletions are
//! spawned onto the blocking pool and the dispatch call returns immediately;
//! the returned [`JoinHandle`] lets tests and shutdown paths await the
//! deletion without the dispatch path ever blocking on it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UpkeepConfig;
use crate::error::{Result, UpkeepError};
use crate::history::HistoryStore;
use crate::history::types::now_epoch_millis;
use crate::retention::RetentionWindow;
use crate::scheduler::alarm::InProcessAlarm;
use crate::scheduler::gateway::{PeriodicScheduler, ScheduleError, ScheduleState};

/// Delay before re-trying the schedule after an exact wake-up denial.
pub const DEFAULT_RECHECK_DELAY: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Lifecycle events the dispatcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// The device finished booting.
    BootCompleted,
    /// Our package was upgraded in place.
    PackageReplaced,
    /// Our package came back from a suspended state.
    PackageUnsuspended,
    /// First-run setup completed.
    SetupWizardFinished,
    /// The periodic maintenance wake-up fired.
    PeriodicRecheck,
    /// The wall clock was changed by the user or the network.
    TimeChanged,
}

impl Signal {
    /// Map a canonical action token to a signal.
    ///
    /// Host adapters translate platform-specific action strings into these
    /// tokens; anything unrecognized maps to `None` and is ignored.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "boot_completed" => Some(Self::BootCompleted),
            "package_replaced" => Some(Self::PackageReplaced),
            "package_unsuspended" => Some(Self::PackageUnsuspended),
            "setup_wizard_finished" => Some(Self::SetupWizardFinished),
            "periodic_recheck" => Some(Self::PeriodicRecheck),
            "time_changed" => Some(Self::TimeChanged),
            _ => None,
        }
    }

    /// The canonical action token for this signal.
    pub fn action(&self) -> &'static str {
        match self {
            Self::BootCompleted => "boot_completed",
            Self::PackageReplaced => "package_replaced",
            Self::PackageUnsuspended => "package_unsuspended",
            Self::SetupWizardFinished => "setup_wizard_finished",
            Self::PeriodicRecheck => "periodic_recheck",
            Self::TimeChanged => "time_changed",
        }
    }
}

/// Which device user the dispatcher runs maintenance for.
///
/// Work-profile users share the primary user's store and scheduler, so
/// running maintenance there would double up the work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserScope {
    /// The device owner. Maintenance runs normally.
    #[default]
    Primary,
    /// A managed work profile. All signals are skipped.
    WorkProfile,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes lifecycle signals to store maintenance and wake-up scheduling.
///
/// Dispatch must happen from within a Tokio runtime; deletions run on the
/// blocking pool and denial retries use the runtime timer.
pub struct MaintenanceDispatcher {
    store: Arc<HistoryStore>,
    scheduler: PeriodicScheduler,
    window: RetentionWindow,
    scope: UserScope,
    recheck_delay: Duration,
    signal_tx: mpsc::UnboundedSender<Signal>,
}

impl MaintenanceDispatcher {
    /// Create a dispatcher over `store` and `scheduler`.
    ///
    /// `signal_tx` is the sending half of the host's signal channel; the
    /// dispatcher uses it to re-deliver [`Signal::PeriodicRecheck`] to
    /// itself, both from [`Self::invoke_job_recheck`] and when retrying after
    /// an exact wake-up denial.
    pub fn new(
        store: Arc<HistoryStore>,
        scheduler: PeriodicScheduler,
        signal_tx: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self {
            store,
            scheduler,
            window: RetentionWindow::default(),
            scope: UserScope::default(),
            recheck_delay: DEFAULT_RECHECK_DELAY,
            signal_tx,
        }
    }

    /// Override the retention window used when pruning expired records.
    pub fn with_retention_window(mut self, window: RetentionWindow) -> Self {
        self.window = window;
        self
    }

    /// Set the user scope this dispatcher serves.
    pub fn with_user_scope(mut self, scope: UserScope) -> Self {
        self.scope = scope;
        self
    }

    /// Override the delay before retrying after an exact wake-up denial.
    pub fn with_recheck_delay(mut self, delay: Duration) -> Self {
        self.recheck_delay = delay;
        self
    }

    /// Assemble a dispatcher over the in-process alarm driver from `config`.
    ///
    /// Opens (or creates) the history store under the configured storage
    /// root and returns the receiving end of the signal channel; the host
    /// loop drives `on_signal` from it so alarm fires and self-rechecks flow
    /// through the same path as host signals. Hosts with a platform alarm
    /// facility should implement [`crate::scheduler::AlarmDriver`] and wire
    /// [`Self::new`] directly instead.
    pub fn bootstrap(config: &UpkeepConfig) -> Result<(Self, mpsc::UnboundedReceiver<Signal>)> {
        let store = HistoryStore::open(&config.storage.root_dir)
            .map_err(|e| UpkeepError::Store(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Arc::new(InProcessAlarm::new(tx.clone()));
        let scheduler = PeriodicScheduler::new(driver).with_interval_ms(config.job.interval_ms());
        let dispatcher = Self::new(Arc::new(store), scheduler, tx)
            .with_retention_window(config.retention.window())
            .with_recheck_delay(config.job.recheck_delay());
        Ok((dispatcher, rx))
    }

    /// React to a lifecycle signal.
    ///
    /// `None` (an unrecognized or absent action) is a no-op, as is any
    /// signal while serving a work profile. When the signal triggers store
    /// maintenance the spawned deletion's handle is returned; the deletion
    /// is applied eventually and never blocks the dispatch call.
    pub fn on_signal(&self, signal: Option<Signal>) -> Option<JoinHandle<()>> {
        if self.scope == UserScope::WorkProfile {
            debug!("work profile scope; skipping lifecycle signal");
            return None;
        }
        let Some(signal) = signal else {
            debug!("ignoring unrecognized lifecycle action");
            return None;
        };

        info!("handling lifecycle signal: {}", signal.action());
        match signal {
            Signal::BootCompleted => {
                self.refresh_periodic_job();
                Some(self.spawn_expired_cleanup())
            }
            Signal::PackageReplaced
            | Signal::PackageUnsuspended
            | Signal::SetupWizardFinished
            | Signal::PeriodicRecheck => {
                self.refresh_periodic_job();
                None
            }
            Signal::TimeChanged => {
                let reset = self.spawn_full_reset();
                self.refresh_periodic_job();
                Some(reset)
            }
        }
    }

    /// Emit exactly one [`Signal::PeriodicRecheck`] through the signal
    /// channel, asking the host loop to re-run scheduling soon.
    pub fn invoke_job_recheck(&self) -> Result<()> {
        self.signal_tx
            .send(Signal::PeriodicRecheck)
            .map_err(|e| UpkeepError::Channel(e.to_string()))
    }

    /// Whether the periodic wake-up is currently armed.
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// The pending wake-up, if any.
    pub fn schedule_state(&self) -> Option<ScheduleState> {
        self.scheduler.schedule_state()
    }

    /// The user scope this dispatcher serves.
    pub fn user_scope(&self) -> UserScope {
        self.scope
    }

    /// The retention window applied to expired-record pruning.
    pub fn retention_window(&self) -> RetentionWindow {
        self.window
    }

    fn refresh_periodic_job(&self) {
        match self.scheduler.ensure_scheduled(now_epoch_millis()) {
            Ok(state) => {
                debug!("periodic wake-up pending at {}ms", state.next_fire_ms);
            }
            Err(ScheduleError::ExactAlarmDenied) => {
                warn!(
                    "exact wake-ups denied; rechecking in {}s",
                    self.recheck_delay.as_secs()
                );
                let tx = self.signal_tx.clone();
                let delay = self.recheck_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(Signal::PeriodicRecheck).is_err() {
                        debug!("recheck due but the signal channel is closed");
                    }
                });
            }
            Err(e) => warn!("cannot arm maintenance wake-up: {e}"),
        }
    }

    fn spawn_expired_cleanup(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let window = self.window;
        tokio::task::spawn_blocking(move || {
            match store.delete_expired(window, now_epoch_millis()) {
                Ok(0) => debug!("no expired usage records to prune"),
                Ok(removed) => info!("pruned {removed} usage records older than {window}"),
                Err(e) => warn!("cannot prune expired usage records: {e}"),
            }
        })
    }

    fn spawn_full_reset(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || match store.delete_all() {
            Ok(removed) => info!("cleared {removed} usage records after a clock change"),
            Err(e) => warn!("cannot clear usage history: {e}"),
        })
    }
}
