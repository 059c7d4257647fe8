// crates/core/src/calendar.rs
//! Day arithmetic for follow-up deadlines.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::signals::CalendarMode;

fn is_weekend(t: DateTime<Utc>) -> bool {
    matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `hours` as a duration, clamped to the representable range.
pub fn saturating_hours(hours: i64) -> Duration {
    Duration::try_hours(hours).unwrap_or(if hours < 0 { Duration::MIN } else { Duration::MAX })
}

/// `start + delta`, pinned to the first or last representable instant on overflow.
pub fn saturating_add(start: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    start.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Advance `start` by `days` under the given calendar.
///
/// Business-day mode counts only steps that land on Monday..Friday (UTC),
/// keeping the time of day. A Friday 17:00 message with 3 business days lands
/// on Wednesday 17:00. Out-of-range results saturate.
pub fn add_days(start: DateTime<Utc>, days: i64, mode: CalendarMode) -> DateTime<Utc> {
    match mode {
        CalendarMode::CalendarDays => {
            let delta = Duration::try_days(days)
                .unwrap_or(if days < 0 { Duration::MIN } else { Duration::MAX });
            saturating_add(start, delta)
        }
        CalendarMode::BusinessDays => {
            let mut remaining = days.max(0);
            // Any seven consecutive days hold five weekdays; jump whole weeks
            // and leave 1..=5 steps so the landing day is found by walking.
            let weeks = remaining.saturating_sub(1) / 5;
            remaining -= weeks * 5;
            let jump = weeks
                .checked_mul(7)
                .and_then(Duration::try_days)
                .unwrap_or(Duration::MAX);
            let mut cursor = saturating_add(start, jump);
            while remaining > 0 {
                let next = saturating_add(cursor, Duration::days(1));
                if next == cursor {
                    break;
                }
                cursor = next;
                if !is_weekend(cursor) {
                    remaining -= 1;
                }
            }
            cursor
        }
    }
}

/// Whole days between two instants, never negative.
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_days().max(0)
}
