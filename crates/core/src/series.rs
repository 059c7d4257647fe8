// crates/core/src/series.rs
//! Time-bucketed follow-up metrics for dashboards.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc};
use replyradar_types::{FollowupEvent, FollowupSummary, Granularity, SeriesPoint, TimeRange};

/// Floor `t` to the start of its UTC bucket. Weeks start on Monday.
pub fn floor_to_bucket(t: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let date = t.date_naive();
    let midnight = |d: chrono::NaiveDate| d.and_time(NaiveTime::MIN).and_utc();
    match granularity {
        Granularity::Hour => midnight(date) + Duration::hours(i64::from(t.hour())),
        Granularity::Day => midnight(date),
        Granularity::Week => {
            midnight(date - Duration::days(i64::from(date.weekday().num_days_from_monday())))
        }
        Granularity::Month => midnight(date - Duration::days(i64::from(date.day0()))),
    }
}

fn next_bucket(start: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    match granularity {
        Granularity::Hour => start + Duration::hours(1),
        Granularity::Day => start + Duration::days(1),
        Granularity::Week => start + Duration::days(7),
        // From the 1st, +32 days always lands in the following month.
        Granularity::Month => floor_to_bucket(start + Duration::days(32), Granularity::Month),
    }
}

/// Start of the first bucket a series over `range` ending at `now` covers.
/// Episodes sent at or after this instant belong in the series.
pub fn series_window_start(
    range: TimeRange,
    granularity: Option<Granularity>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let granularity = granularity.unwrap_or_else(|| range.default_granularity());
    floor_to_bucket(now - range.duration(), granularity)
}

/// Bucket episodes by `followup_sent_at` over `range` ending at `now`.
///
/// Emits one row for every bucket from `floor(now - range)` through
/// `floor(now)` inclusive, zero-filled. Episodes outside the window are ignored.
pub fn build_followup_series(
    events: &[FollowupEvent],
    range: TimeRange,
    granularity: Option<Granularity>,
    now: DateTime<Utc>,
) -> Vec<SeriesPoint> {
    let granularity = granularity.unwrap_or_else(|| range.default_granularity());
    let first = series_window_start(range, Some(granularity), now);
    let last = floor_to_bucket(now, granularity);

    let mut buckets = BTreeMap::new();
    let mut cursor = first;
    while cursor <= last {
        buckets.insert(cursor, SeriesPoint::empty(cursor));
        cursor = next_bucket(cursor, granularity);
    }

    for event in events {
        let key = floor_to_bucket(event.followup_sent_at, granularity);
        if let Some(point) = buckets.get_mut(&key) {
            point.events += 1;
            point.revived += u32::from(event.revived);
            point.immediate_loss += u32::from(event.immediate_loss);
        }
    }

    buckets.into_values().collect()
}

/// Roll a set of episodes up into effectiveness numbers.
pub fn summarize_followups(events: &[FollowupEvent]) -> FollowupSummary {
    let total = events.len() as u32;
    let revived = events.iter().filter(|e| e.revived).count() as u32;
    let immediate_loss = events.iter().filter(|e| e.immediate_loss).count() as u32;
    let unanswered = events.iter().filter(|e| !e.has_response()).count() as u32;

    let mut idle: Vec<i64> = events.iter().filter_map(|e| e.idle_seconds).collect();
    idle.sort_unstable();
    let median_idle_hours = match idle.len() {
        0 => None,
        n if n % 2 == 1 => Some(idle[n / 2] as f64 / 3600.0),
        n => Some((idle[n / 2 - 1] + idle[n / 2]) as f64 / 2.0 / 3600.0),
    };

    FollowupSummary {
        total,
        revived,
        immediate_loss,
        unanswered,
        revival_rate: ratio(revived, total),
        immediate_loss_rate: ratio(immediate_loss, revived),
        median_idle_hours,
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}
