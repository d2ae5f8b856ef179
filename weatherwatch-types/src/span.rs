//! Time spans - the fixed set of display periods and their fetch options.

use alloc::string::String;
use core::fmt;
use core::str::FromStr;

/// One of the fixed display periods of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TimeSpanKey {
    /// A rolling window of the last few minutes, fed live.
    #[default]
    Recent,
    /// The current calendar day.
    Day,
    /// The current calendar week.
    Week,
    /// The current calendar month.
    Month,
    /// The current calendar year.
    Year,
}

/// Calendar period a non-recent time span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarUnit {
    Day,
    Week,
    Month,
    Year,
}

impl TimeSpanKey {
    /// All keys, in tab order.
    pub const ALL: [TimeSpanKey; 5] = [
        TimeSpanKey::Recent,
        TimeSpanKey::Day,
        TimeSpanKey::Week,
        TimeSpanKey::Month,
        TimeSpanKey::Year,
    ];

    /// The lowercase key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSpanKey::Recent => "recent",
            TimeSpanKey::Day => "day",
            TimeSpanKey::Week => "week",
            TimeSpanKey::Month => "month",
            TimeSpanKey::Year => "year",
        }
    }

    /// The calendar period covered, or `None` for the rolling `recent` window.
    pub fn calendar_unit(&self) -> Option<CalendarUnit> {
        match self {
            TimeSpanKey::Recent => None,
            TimeSpanKey::Day => Some(CalendarUnit::Day),
            TimeSpanKey::Week => Some(CalendarUnit::Week),
            TimeSpanKey::Month => Some(CalendarUnit::Month),
            TimeSpanKey::Year => Some(CalendarUnit::Year),
        }
    }

    /// The statistics aggregation shown alongside this selection.
    ///
    /// `recent` always shows the day's statistics.
    pub fn stats_key(&self) -> TimeSpanKey {
        match self {
            TimeSpanKey::Recent => TimeSpanKey::Day,
            other => *other,
        }
    }

    /// Position in [`TimeSpanKey::ALL`].
    pub fn index(&self) -> usize {
        match self {
            TimeSpanKey::Recent => 0,
            TimeSpanKey::Day => 1,
            TimeSpanKey::Week => 2,
            TimeSpanKey::Month => 3,
            TimeSpanKey::Year => 4,
        }
    }

    /// Cycle to the next key.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Cycle to the previous key.
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for TimeSpanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown time span key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeSpanError(pub String);

impl fmt::Display for ParseTimeSpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown time span '{}' (expected recent, day, week, month or year)",
            self.0
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseTimeSpanError {}

impl FromStr for TimeSpanKey {
    type Err = ParseTimeSpanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSpanKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseTimeSpanError(s.into()))
    }
}

/// Tags that narrow a measurement to one platform and stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TagFilter {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub platform: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub stream: Option<String>,
}

impl TagFilter {
    /// Check whether a packet carrying the given tags passes this filter.
    ///
    /// An unset filter tag matches anything, including a missing packet tag.
    pub fn matches(&self, platform: Option<&str>, stream: Option<&str>) -> bool {
        let ok = |want: &Option<String>, got: Option<&str>| match want {
            None => true,
            Some(w) => got == Some(w.as_str()),
        };
        ok(&self.platform, platform) && ok(&self.stream, stream)
    }
}

/// Fetch and display options for one time span.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSpanOptions {
    /// The measurement (telemetry stream) the span reads from.
    pub measurement: String,

    /// Tag filter applied to fetches and subscriptions.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: TagFilter,

    /// Aggregation bucket size in milliseconds, or `None` for raw packets.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub aggregation_ms: Option<u64>,

    /// Start-of-period marker (Unix milliseconds).
    pub start_ms: i64,

    /// Length of the displayed window in minutes. Only used by `recent`.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub detail_minutes: Option<u32>,
}

impl TimeSpanOptions {
    /// Create options for a raw (unaggregated) measurement.
    pub fn new(measurement: &str, start_ms: i64) -> Self {
        Self {
            measurement: measurement.into(),
            start_ms,
            ..Self::default()
        }
    }

    /// Set the aggregation bucket size.
    pub fn aggregation(mut self, aggregation_ms: u64) -> Self {
        self.aggregation_ms = Some(aggregation_ms);
        self
    }

    /// Set the detail window length.
    pub fn detail(mut self, minutes: u32) -> Self {
        self.detail_minutes = Some(minutes);
        self
    }

    /// Set the tag filter.
    pub fn tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }
}
