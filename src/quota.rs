use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};

use crate::models::plans::Plan;

/// Receipts left this month; `None` means unlimited.
pub fn remaining(plan: Plan, current_month_usage: i64) -> Option<i64> {
    plan.monthly_limit()
        .map(|limit| (limit - current_month_usage).max(0))
}

pub fn can_generate(plan: Plan, current_month_usage: i64) -> bool {
    match plan.monthly_limit() {
        None => true,
        Some(limit) => current_month_usage < limit,
    }
}

/// First instant of the current calendar month, local time. The quota
/// window is the calendar month, not a rolling 30 days.
pub fn month_start(now: DateTime<Local>) -> NaiveDateTime {
    let today = now.date_naive();
    NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .unwrap_or(today)
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_local())
}
