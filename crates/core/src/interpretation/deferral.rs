//! Coarse deferral buckets to concrete follow-up dates.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn first_of_next_month(t: DateTime<Utc>) -> DateTime<Utc> {
    let day = start_of_day(t);
    let first = day - Duration::days(i64::from(day.day0()));
    let next_month = first + Duration::days(32);
    next_month - Duration::days(i64::from(next_month.day0()))
}

/// Map a bucket label to a UTC date relative to `now`.
///
/// Dates are midnight UTC on the day the customer implied:
/// `TODAY` is `now` itself, `TOMORROW` the next day, `THIS_WEEK` the Friday
/// of this week (tomorrow once Friday has arrived), `NEXT_WEEK` next Monday,
/// `TWO_WEEKS` fourteen days out, `THIS_MONTH` the last day of the month
/// (tomorrow on that day), `NEXT_MONTH` the 1st of next month. Labels are
/// case-insensitive; unknown labels yield `None`.
pub fn map_deferred_bucket_to_date(bucket: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let label = bucket.trim().to_ascii_uppercase().replace([' ', '-'], "_");
    let today = start_of_day(now);
    let tomorrow = today + Duration::days(1);
    let weekday = i64::from(now.weekday().num_days_from_monday());

    let date = match label.as_str() {
        "TODAY" => now,
        "TOMORROW" => tomorrow,
        "THIS_WEEK" => {
            let friday = today + Duration::days(4 - weekday);
            friday.max(tomorrow)
        }
        "NEXT_WEEK" => today + Duration::days(7 - weekday),
        "TWO_WEEKS" => today + Duration::days(14),
        "THIS_MONTH" => {
            let last_day = first_of_next_month(now) - Duration::days(1);
            last_day.max(tomorrow)
        }
        "NEXT_MONTH" => first_of_next_month(now),
        _ => return None,
    };
    Some(date)
}
