//! Shared record types and clock helpers for the history subsystem.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Core struct
// ---------------------------------------------------------------------------

/// One usage observation, stamped by the external data producer.
///
/// Immutable once written. The maintenance core only ever reads and deletes
/// these; it never interprets `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Epoch milliseconds at which the observation was taken.
    pub timestamp_ms: u64,
    /// Package the observation belongs to.
    pub package: String,
    /// Opaque producer payload (typically a serialized snapshot blob).
    #[serde(default)]
    pub payload: String,
}

impl UsageRecord {
    /// Create a record with an empty payload.
    pub fn new(timestamp_ms: u64, package: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            package: package.into(),
            payload: String::new(),
        }
    }

    /// Create a record carrying a producer payload.
    pub fn with_payload(
        timestamp_ms: u64,
        package: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            package: package.into(),
            payload: payload.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Clock helpers
// ---------------------------------------------------------------------------

/// Returns current UTC milliseconds since epoch.
pub(crate) fn now_epoch_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
