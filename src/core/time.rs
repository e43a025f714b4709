//! Shared timestamp/event helpers for deterministic envelopes and period keys.

use chrono::{DateTime, Datelike, Duration, IsoWeek, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns the current UTC time as an RFC 3339 string (second precision).
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

pub fn to_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Period key for a daily window: the UTC calendar date, e.g. `2026-08-26`.
pub fn utc_day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Period key for a weekly window: the ISO week, e.g. `2026-W35`.
pub fn iso_week_key(ts: DateTime<Utc>) -> String {
    let week: IsoWeek = ts.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Start of the UTC calendar day containing `ts`.
pub fn start_of_utc_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Start of the ISO week (Monday 00:00 UTC) containing `ts`.
pub fn start_of_iso_week(ts: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = ts.weekday().num_days_from_monday() as i64;
    start_of_utc_day(ts) - Duration::days(days_from_monday)
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_iso(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
