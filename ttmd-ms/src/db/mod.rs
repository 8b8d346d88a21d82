//! Statistics queries over the shared SQLite database
//!
//! Pool and schema initialization live in `ttmd_common::db`; this layer
//! is the query surface the HTTP handlers use.

pub mod contributors;
pub mod songs;
pub mod stats;

use chrono::Utc;

/// Timestamp format stored in TEXT columns
pub(crate) fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
