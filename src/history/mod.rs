//! Local usage history, the time-series store maintenance operates on.
//!
//! Sub-modules:
//! - `types`: backend-agnostic record type and clock helpers.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: the SQLite-backed [`HistoryStore`] accessor.

pub(crate) mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{HistoryStore, HistoryStoreError};
pub use types::UsageRecord;
