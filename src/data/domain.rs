//! "Nice" time-axis domains and tick marks for charts.
//!
//! Given the first and last timestamp to plot, pick a human-readable step
//! (whole seconds, minutes, hours, days, weeks, months or years) and widen
//! the interval outward so that every tick lands on a step boundary.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use weatherwatch_types::CalendarUnit;

use super::calendar::{from_local, start_of, to_local};

/// Upper bound on the number of ticks [`nice_domain_and_ticks`] produces.
pub const MAX_TICK_COUNT: usize = 32;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Horizontal extent of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Let the chart renderer scale the axis from the data.
    Auto,
    /// Fixed `[lo, hi]` in Unix milliseconds.
    Fixed { lo: i64, hi: i64 },
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Domain::Auto => serializer.serialize_str("auto"),
            Domain::Fixed { lo, hi } => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(lo)?;
                tuple.serialize_element(hi)?;
                tuple.end()
            }
        }
    }
}

/// A domain together with its tick marks.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Axis {
    pub domain: Domain,
    pub ticks: Vec<i64>,
}

impl Axis {
    /// Auto-scaled axis with no explicit ticks.
    pub fn auto() -> Self {
        Self {
            domain: Domain::Auto,
            ticks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Second(u32),
    Minute(u32),
    Hour(u32),
    Day(u32),
    Week,
    Month(u32),
    Year(u32),
}

const LADDER: [Step; 17] = [
    Step::Second(1),
    Step::Second(5),
    Step::Second(15),
    Step::Second(30),
    Step::Minute(1),
    Step::Minute(5),
    Step::Minute(15),
    Step::Minute(30),
    Step::Hour(1),
    Step::Hour(3),
    Step::Hour(6),
    Step::Hour(12),
    Step::Day(1),
    Step::Day(2),
    Step::Week,
    Step::Month(1),
    Step::Month(3),
];

/// Year multiples tried after the fixed ladder is exhausted.
const YEAR_STEPS: [u32; 10] = [1, 2, 5, 10, 20, 50, 100, 200, 500, 1000];

impl Step {
    /// Length in milliseconds for steps shorter than a day.
    fn fixed_ms(self) -> Option<i64> {
        match self {
            Step::Second(n) => Some(n as i64 * SECOND_MS),
            Step::Minute(n) => Some(n as i64 * MINUTE_MS),
            Step::Hour(n) => Some(n as i64 * HOUR_MS),
            _ => None,
        }
    }

    fn floor(self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = t.date();
        match self {
            Step::Second(n) => date.and_hms_opt(t.hour(), t.minute(), t.second() / n * n),
            Step::Minute(n) => date.and_hms_opt(t.hour(), t.minute() / n * n, 0),
            Step::Hour(n) => date.and_hms_opt(t.hour() / n * n, 0, 0),
            Step::Day(n) => {
                let back = (date.day0() % n) as i64;
                (date - Duration::days(back)).and_hms_opt(0, 0, 0)
            }
            Step::Week => start_of(CalendarUnit::Week, t),
            Step::Month(n) => {
                NaiveDate::from_ymd_opt(date.year(), date.month0() / n * n + 1, 1)?
                    .and_hms_opt(0, 0, 0)
            }
            Step::Year(n) => {
                let year = date.year().div_euclid(n as i32) * n as i32;
                NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
            }
        }
    }

    fn advance(self, t: NaiveDateTime, k: u32) -> Option<NaiveDateTime> {
        match self {
            Step::Second(_) | Step::Minute(_) | Step::Hour(_) => None,
            Step::Day(n) => {
                let days = Duration::try_days(n.checked_mul(k)? as i64)?;
                t.checked_add_signed(days)
            }
            Step::Week => t.checked_add_signed(Duration::try_days(7 * k as i64)?),
            Step::Month(n) => t.checked_add_months(Months::new(n.checked_mul(k)?)),
            Step::Year(n) => {
                let months = n.checked_mul(k)?.checked_mul(12)?;
                t.checked_add_months(Months::new(months))
            }
        }
    }

    /// The `intervals + 1` step boundaries starting at the floor of `t_min`.
    fn boundaries<Tz: TimeZone>(self, t_min: i64, intervals: u32, tz: &Tz) -> Option<Vec<i64>> {
        let start = self.floor(to_local(t_min, tz)?)?;
        match self.fixed_ms() {
            // Sub-day steps are exact durations so ticks stay evenly spaced across DST shifts.
            Some(ms) => {
                let lo = from_local(start, tz)?;
                (0..=intervals as i64)
                    .map(|k| lo.checked_add(k.checked_mul(ms)?))
                    .collect()
            }
            None => (0..=intervals)
                .map(|k| from_local(self.advance(start, k)?, tz))
                .collect(),
        }
    }
}

/// Compute a rounded domain covering `[t_min, t_max]` and `tick_count` ticks.
///
/// The smallest step whose `tick_count - 1` multiples cover the input wins;
/// the ticks are the step boundaries from `lo` to `hi`, so they are strictly
/// increasing and lie within the domain. An empty or degenerate input
/// (`t_min >= t_max`, `tick_count == 0`) yields [`Axis::auto`]. Tick counts
/// above [`MAX_TICK_COUNT`] are treated as [`MAX_TICK_COUNT`].
pub fn nice_domain_and_ticks<Tz: TimeZone>(
    t_min: i64,
    t_max: i64,
    tick_count: usize,
    tz: &Tz,
) -> Axis {
    if tick_count == 0 || t_min >= t_max {
        return Axis::auto();
    }
    let tick_count = tick_count.min(MAX_TICK_COUNT);
    let intervals = (tick_count as u32 - 1).max(1);

    let steps = LADDER.into_iter().chain(YEAR_STEPS.into_iter().map(Step::Year));
    for step in steps {
        let Some(mut bounds) = step.boundaries(t_min, intervals, tz) else {
            continue;
        };
        let (Some(&lo), Some(&hi)) = (bounds.first(), bounds.last()) else {
            continue;
        };
        if lo <= t_min && hi >= t_max {
            bounds.truncate(tick_count);
            return Axis {
                domain: Domain::Fixed { lo, hi },
                ticks: bounds,
            };
        }
    }

    Axis::auto()
}
