//! Local calendar-day window used by the due-date scan.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Day boundaries, in Unix epoch milliseconds, for the day containing `now`.
///
/// `[today_start, tomorrow_start)` is "today", `[tomorrow_start, day_after_start)`
/// is "tomorrow". Boundaries follow the local calendar, so a DST day is 23 or
/// 25 hours long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub today_start: i64,
    pub tomorrow_start: i64,
    pub day_after_start: i64,
}

impl DayWindow {
    /// Computes the window for the local calendar day of `now` in its own zone.
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let tomorrow = next_day(today);
        let day_after = next_day(tomorrow);

        Self {
            today_start: day_start_millis(&tz, today),
            tomorrow_start: day_start_millis(&tz, tomorrow),
            day_after_start: day_start_millis(&tz, day_after),
        }
    }

    /// Range handed to the store: `[today_start, day_after_start)`.
    pub fn scan_range(&self) -> (i64, i64) {
        (self.today_start, self.day_after_start)
    }

    pub fn is_today(&self, due_ms: i64) -> bool {
        (self.today_start..self.tomorrow_start).contains(&due_ms)
    }

    pub fn is_tomorrow(&self, due_ms: i64) -> bool {
        (self.tomorrow_start..self.day_after_start).contains(&due_ms)
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// First instant of `date` in `tz`.
///
/// Ambiguous midnights take the earlier instant. A midnight skipped by a DST
/// gap resolves to the first valid quarter hour after it.
fn day_start_millis<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::default());
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(start) => start.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => first_valid_after(tz, midnight)
            .unwrap_or_else(|| tz.from_utc_datetime(&midnight).timestamp_millis()),
    }
}

fn first_valid_after<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<i64> {
    (1..=96).find_map(|quarter| {
        tz.from_local_datetime(&(local + Duration::minutes(15 * quarter)))
            .earliest()
            .map(|start| start.timestamp_millis())
    })
}
