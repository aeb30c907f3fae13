#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use upkeep::scheduler::{AlarmDriver, AlarmError, WakeupKind};
use upkeep::{
    HistoryStore, MaintenanceDispatcher, PeriodicScheduler, RetentionWindow, Signal, UpkeepConfig,
    UsageRecord, UserScope,
};

fn now_ms() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Recording driver standing in for a platform alarm facility.
#[derive(Default)]
struct FakeAlarm {
    deny_exact: AtomicBool,
    armed: Mutex<Option<u64>>,
    arm_calls: AtomicUsize,
}

impl FakeAlarm {
    fn denying() -> Self {
        Self {
            deny_exact: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn armed_trigger(&self) -> Option<u64> {
        *self.armed.lock().unwrap()
    }
}

impl AlarmDriver for FakeAlarm {
    fn can_schedule_exact(&self) -> bool {
        !self.deny_exact.load(Ordering::SeqCst)
    }

    fn arm(&self, trigger_at_ms: u64) -> Result<WakeupKind, AlarmError> {
        self.arm_calls.fetch_add(1, Ordering::SeqCst);
        *self.armed.lock().unwrap() = Some(trigger_at_ms);
        Ok(WakeupKind::Exact)
    }

    fn disarm(&self) {
        *self.armed.lock().unwrap() = None;
    }
}

fn seeded_store(records: &[UsageRecord]) -> Arc<HistoryStore> {
    let store = HistoryStore::open_in_memory().expect("open in-memory store");
    for record in records {
        store.insert(record).expect("insert record");
    }
    Arc::new(store)
}

fn dispatcher_over(
    store: &Arc<HistoryStore>,
    driver: &Arc<FakeAlarm>,
) -> (MaintenanceDispatcher, mpsc::UnboundedReceiver<Signal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = PeriodicScheduler::new(Arc::clone(driver) as Arc<dyn AlarmDriver>);
    let dispatcher = MaintenanceDispatcher::new(Arc::clone(store), scheduler, tx);
    (dispatcher, rx)
}

#[tokio::test]
async fn boot_prunes_expired_records_and_arms_the_wakeup() {
    let window = RetentionWindow::days(1);
    let now = now_ms();
    let boundary = now - window.as_millis();
    let store = seeded_store(&[
        UsageRecord::new(boundary - 1, "com.app.older"),
        UsageRecord::new(boundary, "com.app.boundary"),
        UsageRecord::new(now, "com.app.fresh"),
    ]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);
    let dispatcher = dispatcher.with_retention_window(window);

    let cleanup = dispatcher
        .on_signal(Some(Signal::BootCompleted))
        .expect("boot spawns a cleanup");
    cleanup.await.expect("cleanup completes");

    // Records at and before the boundary are gone; the fresh one survives.
    let remaining = store.get_all_after(0).expect("read survivors");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].package, "com.app.fresh");
    assert!(dispatcher.is_scheduled());
    assert!(driver.armed_trigger().is_some());
}

#[tokio::test]
async fn boot_keeps_records_inside_the_window() {
    let window = RetentionWindow::days(1);
    let now = now_ms();
    let store = seeded_store(&[
        UsageRecord::new(now - window.as_millis() + 60_000, "com.app.oldest"),
        UsageRecord::new(now - 1_000, "com.app.recent"),
        UsageRecord::new(now, "com.app.fresh"),
    ]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);
    let dispatcher = dispatcher.with_retention_window(window);

    let cleanup = dispatcher
        .on_signal(Some(Signal::BootCompleted))
        .expect("boot spawns a cleanup");
    cleanup.await.expect("cleanup completes");

    assert_eq!(store.count().expect("count"), 3);
    assert!(dispatcher.is_scheduled());
}

#[tokio::test]
async fn reschedule_signals_arm_without_touching_the_store() {
    let signals = [
        Signal::PackageReplaced,
        Signal::PackageUnsuspended,
        Signal::SetupWizardFinished,
        Signal::PeriodicRecheck,
    ];
    for signal in signals {
        let now = now_ms();
        // Old enough to be expired; these signals must not prune it.
        let store = seeded_store(&[UsageRecord::new(now - 30 * 86_400_000, "com.app.ancient")]);
        let driver = Arc::new(FakeAlarm::default());
        let (dispatcher, _rx) = dispatcher_over(&store, &driver);

        let handle = dispatcher.on_signal(Some(signal));

        assert!(handle.is_none(), "{signal:?} should not spawn maintenance");
        assert!(dispatcher.is_scheduled(), "{signal:?} should arm the wakeup");
        assert_eq!(store.count().expect("count"), 1);
    }
}

#[tokio::test]
async fn time_change_resets_history_and_rearms() {
    let now = now_ms();
    let store = seeded_store(&[
        UsageRecord::new(now - 86_400_000, "com.app.yesterday"),
        UsageRecord::new(now - 1_000, "com.app.recent"),
        UsageRecord::new(now, "com.app.fresh"),
    ]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);

    let reset = dispatcher
        .on_signal(Some(Signal::TimeChanged))
        .expect("time change spawns a reset");
    reset.await.expect("reset completes");

    assert_eq!(store.count().expect("count"), 0);
    assert!(dispatcher.is_scheduled());
}

#[tokio::test]
async fn work_profile_scope_skips_every_signal() {
    let now = now_ms();
    let store = seeded_store(&[UsageRecord::new(now - 30 * 86_400_000, "com.app.ancient")]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);
    let dispatcher = dispatcher.with_user_scope(UserScope::WorkProfile);

    let signals = [
        Signal::BootCompleted,
        Signal::PackageReplaced,
        Signal::PackageUnsuspended,
        Signal::SetupWizardFinished,
        Signal::PeriodicRecheck,
        Signal::TimeChanged,
    ];
    for signal in signals {
        assert!(dispatcher.on_signal(Some(signal)).is_none());
    }

    assert!(!dispatcher.is_scheduled());
    assert_eq!(driver.arm_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.count().expect("count"), 1);
}

#[tokio::test]
async fn unrecognized_actions_are_ignored() {
    let store = seeded_store(&[]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);

    assert_eq!(Signal::from_action("network_changed"), None);
    let handle = dispatcher.on_signal(Signal::from_action("network_changed"));

    assert!(handle.is_none());
    assert!(!dispatcher.is_scheduled());
    assert_eq!(driver.arm_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_signals_keep_exactly_one_wakeup_pending() {
    let store = seeded_store(&[]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, _rx) = dispatcher_over(&store, &driver);
    let before = now_ms();

    dispatcher.on_signal(Some(Signal::PackageReplaced));
    dispatcher.on_signal(Some(Signal::PeriodicRecheck));
    dispatcher.on_signal(Some(Signal::SetupWizardFinished));

    assert_eq!(driver.arm_calls.load(Ordering::SeqCst), 3);
    let state = dispatcher.schedule_state().expect("scheduled");
    assert_eq!(driver.armed_trigger(), Some(state.next_fire_ms));
    assert!(state.exact);
    assert!(state.next_fire_ms > before);
}

#[tokio::test]
async fn invoke_job_recheck_emits_exactly_one_signal() {
    let store = seeded_store(&[]);
    let driver = Arc::new(FakeAlarm::default());
    let (dispatcher, mut rx) = dispatcher_over(&store, &driver);

    dispatcher.invoke_job_recheck().expect("send recheck");

    assert_eq!(rx.try_recv().expect("one signal"), Signal::PeriodicRecheck);
    assert!(rx.try_recv().is_err(), "no second signal may be emitted");
}

#[tokio::test]
async fn bootstrap_wires_the_store_and_the_in_process_alarm() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = UpkeepConfig::default();
    config.storage.root_dir = dir.path().to_path_buf();
    config.job.interval_secs = 1;

    let (dispatcher, mut rx) = MaintenanceDispatcher::bootstrap(&config).expect("bootstrap");

    let cleanup = dispatcher
        .on_signal(Some(Signal::BootCompleted))
        .expect("boot spawns a cleanup");
    cleanup.await.expect("cleanup completes");

    assert!(dispatcher.is_scheduled());
    assert!(dir.path().join("upkeep.db").exists());

    // The armed in-process alarm fires on the next interval boundary and
    // feeds the signal loop the host would drive.
    let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("alarm fires")
        .expect("channel open");
    assert_eq!(fired, Signal::PeriodicRecheck);
}

#[tokio::test]
async fn denied_exact_wakeups_schedule_a_delayed_recheck() {
    let store = seeded_store(&[]);
    let driver = Arc::new(FakeAlarm::denying());
    let (dispatcher, mut rx) = dispatcher_over(&store, &driver);
    let dispatcher = dispatcher.with_recheck_delay(Duration::ZERO);

    dispatcher.on_signal(Some(Signal::PackageReplaced));

    assert!(!dispatcher.is_scheduled());
    assert_eq!(driver.arm_calls.load(Ordering::SeqCst), 0);

    let retry = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("recheck arrives")
        .expect("channel open");
    assert_eq!(retry, Signal::PeriodicRecheck);

    // Once the platform relents, replaying the recheck arms the wakeup.
    driver.deny_exact.store(false, Ordering::SeqCst);
    dispatcher.on_signal(Some(retry));
    assert!(dispatcher.is_scheduled());
}
