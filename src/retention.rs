//! Retention window policy for the usage history store.
//!
//! Pure age decisions only, with no clock access and no store access. Callers
//! pass an explicit `now` in epoch milliseconds, so behaviour stays
//! deterministic and testable.

use serde::{Deserialize, Serialize};

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: u64 = 86_400_000;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 9;

/// Maximum age a record may reach before it is eligible for deletion.
///
/// The boundary is inclusive: a record aged exactly the window is expired.
/// Records strictly younger are retained, and records stamped in the future
/// are never expired (the time-changed reset covers clock anomalies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionWindow {
    days: u32,
}

impl RetentionWindow {
    /// A window of `days` whole days. Zero expires everything already written.
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    /// Window length in days.
    pub fn as_days(&self) -> u32 {
        self.days
    }

    /// Window length in milliseconds.
    pub fn as_millis(&self) -> u64 {
        u64::from(self.days) * MILLIS_PER_DAY
    }

    /// Largest timestamp still considered expired at `now_ms`, or `None`
    /// when the window reaches past the epoch and nothing can be expired.
    ///
    /// A record is expired iff `timestamp_ms <= cutoff`.
    pub fn cutoff(&self, now_ms: u64) -> Option<u64> {
        now_ms.checked_sub(self.as_millis())
    }

    /// Returns `true` iff a record stamped `timestamp_ms` has reached the
    /// window age at `now_ms`, i.e. `now_ms - timestamp_ms >= window`.
    pub fn is_expired(&self, timestamp_ms: u64, now_ms: u64) -> bool {
        match self.cutoff(now_ms) {
            Some(cutoff) => timestamp_ms <= cutoff,
            None => false,
        }
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl std::fmt::Display for RetentionWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.days)
    }
}
