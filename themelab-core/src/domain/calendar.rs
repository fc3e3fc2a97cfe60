//! Weekday trading calendar.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Resolve a requested date to the evaluation date: weekdays map to
/// themselves, Saturday and Sunday to the preceding Friday.
///
/// Exchange holidays are not modelled; the provider is expected to hand over
/// the last bar on or before the returned date.
pub fn previous_trading_date(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// The `count` most recent weekdays ending at `end` (inclusive), ascending.
pub fn trailing_weekdays(end: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = previous_trading_date(end);
    while dates.len() < count {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(current);
        }
        current -= Duration::days(1);
    }
    dates.reverse();
    dates
}
