// tests/common/mod.rs
// Shared fixtures for integration tests. No test here depends on a live
// network or database (SPEC_FULL.md §E) — everything is built from the
// trait seams the core pipeline is injected through.

use chrono::{DateTime, TimeZone, Utc};

pub fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}
