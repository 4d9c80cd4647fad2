// src/core/orchestrator/schedule.rs

//! Pure due-time logic for the Orchestrator's schedule table.
//! Kept free of I/O so it can be tested without advancing real time.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::time::Duration;

pub const METRICS_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const LOGS_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const ALERTS_INTERVAL: Duration = Duration::from_secs(2 * 60);
pub const DAILY_REPORT_HOUR: u32 = 9;
pub const WEEKLY_REPORT_HOUR: u32 = 10;
pub const WEEKLY_MIN_DAYS_SINCE_DAILY: i64 = 6;

/// Whether an interval-based task is due: never run, or `interval` has
/// elapsed since its last run.
pub fn is_due(last_run: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_run {
        None => true,
        Some(last) => now.signed_duration_since(last) >= chrono::Duration::from_std(interval).unwrap(),
    }
}

/// Daily report: due at local hour 09, at most once per calendar day.
/// Times are treated as UTC (no local-timezone source is plumbed through).
pub fn should_emit_daily(last_daily: Option<NaiveDate>, now: DateTime<Utc>) -> bool {
    now.hour() >= DAILY_REPORT_HOUR && last_daily != Some(now.date_naive())
}

/// Weekly report: due Monday at hour 10, only when at least
/// `WEEKLY_MIN_DAYS_SINCE_DAILY` days have passed since the last daily
/// report, and at most once per calendar week.
pub fn should_emit_weekly(
    last_weekly: Option<NaiveDate>,
    last_daily: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> bool {
    if now.weekday() != chrono::Weekday::Mon || now.hour() < WEEKLY_REPORT_HOUR {
        return false;
    }
    if last_weekly == Some(now.date_naive()) {
        return false;
    }
    match last_daily {
        Some(daily) => (now.date_naive() - daily).num_days() >= WEEKLY_MIN_DAYS_SINCE_DAILY,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn interval_task_due_when_never_run() {
        assert!(is_due(None, Utc::now(), METRICS_INTERVAL));
    }

    #[test]
    fn interval_task_not_due_before_elapsed() {
        let now = Utc::now();
        assert!(!is_due(Some(now), now, METRICS_INTERVAL));
    }

    #[test]
    fn daily_report_due_once_past_the_hour() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 5, 0).unwrap();
        assert!(should_emit_daily(None, now));
        assert!(!should_emit_daily(Some(now.date_naive()), now));
    }

    #[test]
    fn weekly_report_requires_monday_and_six_days_since_daily() {
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 10, 5, 0).unwrap();
        let last_daily = monday.date_naive() - chrono::Duration::days(6);
        assert!(should_emit_weekly(None, Some(last_daily), monday));

        let too_recent = monday.date_naive() - chrono::Duration::days(2);
        assert!(!should_emit_weekly(None, Some(too_recent), monday));

        let tuesday = monday + chrono::Duration::days(1);
        assert!(!should_emit_weekly(None, Some(last_daily), tuesday));
    }
}
