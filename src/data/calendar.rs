//! Calendar arithmetic in the display time zone.
//!
//! All period boundaries are computed on local wall-clock time and then
//! mapped back to Unix milliseconds, so "today" means the viewer's today.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use weatherwatch_types::CalendarUnit;

/// Convert Unix milliseconds to local wall-clock time.
pub fn to_local<Tz: TimeZone>(ms: i64, tz: &Tz) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(tz).naive_local())
}

/// Convert local wall-clock time to Unix milliseconds.
///
/// Ambiguous times resolve to the earlier instant; times inside a DST gap
/// are pushed forward by an hour.
pub fn from_local<Tz: TimeZone>(local: NaiveDateTime, tz: &Tz) -> Option<i64> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.timestamp_millis())
}

/// Midnight at the start of the period containing `local`. Weeks start on Sunday.
pub fn start_of(unit: CalendarUnit, local: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = local.date();
    let start = match unit {
        CalendarUnit::Day => date,
        CalendarUnit::Week => {
            date - Duration::days(date.weekday().num_days_from_sunday() as i64)
        }
        CalendarUnit::Month => date.with_day(1)?,
        CalendarUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
    };
    Some(start.and_time(NaiveTime::MIN))
}

/// Midnight at the start of the period following the one containing `local`.
pub fn start_of_next(unit: CalendarUnit, local: NaiveDateTime) -> Option<NaiveDateTime> {
    let start = start_of(unit, local)?;
    match unit {
        CalendarUnit::Day => start.checked_add_signed(Duration::days(1)),
        CalendarUnit::Week => start.checked_add_signed(Duration::days(7)),
        CalendarUnit::Month => start.checked_add_months(Months::new(1)),
        CalendarUnit::Year => start.checked_add_months(Months::new(12)),
    }
}

/// First and last millisecond of the period containing `marker_ms`.
pub fn period_bounds<Tz: TimeZone>(
    unit: CalendarUnit,
    marker_ms: i64,
    tz: &Tz,
) -> Option<(i64, i64)> {
    let local = to_local(marker_ms, tz)?;
    let lo = from_local(start_of(unit, local)?, tz)?;
    let hi = from_local(start_of_next(unit, local)?, tz)? - 1;
    Some((lo, hi))
}
