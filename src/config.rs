//! Dashboard configuration.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `WEATHERWATCH__*` environment variables
//! (e.g. `WEATHERWATCH__RECENT__DETAIL_MINUTES=10`).

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use weatherwatch_types::{TagFilter, TimeSpanKey, TimeSpanOptions, MINUTE_MS};

use crate::data::MAX_TICK_COUNT;
use crate::fetch::FreshnessPolicy;
use crate::store::DashboardStore;

/// All dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub station: StationSettings,
    /// Tag filter applied to every fetch and subscription.
    pub tags: TagFilter,
    pub plot: PlotSettings,
    pub packet_table: PacketTableSettings,
    pub recent: RecentSettings,
    pub day: SpanSettings,
    pub week: SpanSettings,
    pub month: SpanSettings,
    pub year: SpanSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    /// Number of ticks on the time axis.
    pub x_ticks: usize,
    /// One chart per observation type, in order.
    pub obs_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketTableSettings {
    pub obs_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentSettings {
    pub measurement: String,
    /// Width of the plotted window.
    pub detail_minutes: u32,
    /// How much live history is kept in memory.
    pub retention_minutes: u32,
    /// How long a fetch stays fresh while no live feed keeps the span
    /// current. Zero always refetches.
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanSettings {
    pub measurement: String,
    /// Bucket size of the fetched series; `None` fetches raw packets.
    pub aggregation_ms: Option<u64>,
    /// How long a fetch stays fresh. Zero always refetches.
    pub max_age_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            station: StationSettings::default(),
            tags: TagFilter::default(),
            plot: PlotSettings::default(),
            packet_table: PacketTableSettings::default(),
            recent: RecentSettings::default(),
            day: SpanSettings::aggregated(5),
            week: SpanSettings::aggregated(60),
            month: SpanSettings::aggregated(180),
            year: SpanSettings::aggregated(24 * 60),
        }
    }
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            title: "Weather station".to_string(),
        }
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            x_ticks: 5,
            obs_types: [
                "wind_speed",
                "out_temperature",
                "in_temperature",
                "radiation_radiation",
                "sealevel_pressure",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Default for PacketTableSettings {
    fn default() -> Self {
        Self {
            obs_types: [
                "out_temperature",
                "dewpoint_temperature",
                "out_humidity",
                "sealevel_pressure",
                "wind_speed",
                "wind_dir",
                "rain_rain",
                "radiation_radiation",
                "in_temperature",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Default for RecentSettings {
    fn default() -> Self {
        Self {
            measurement: "wxpackets".to_string(),
            detail_minutes: 5,
            retention_minutes: 60,
            max_age_secs: 60,
        }
    }
}

impl Default for SpanSettings {
    fn default() -> Self {
        Self::aggregated(5)
    }
}

impl SpanSettings {
    fn aggregated(minutes: u64) -> Self {
        Self {
            measurement: "wxpackets".to_string(),
            aggregation_ms: Some(minutes * MINUTE_MS as u64),
            max_age_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// `plot.x_ticks` is clamped to [`MAX_TICK_COUNT`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let mut settings: Self = builder
            .add_source(
                Environment::with_prefix("WEATHERWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.plot.x_ticks = settings.plot.x_ticks.min(MAX_TICK_COUNT);
        Ok(settings)
    }

    fn span(&self, key: TimeSpanKey) -> Option<&SpanSettings> {
        match key {
            TimeSpanKey::Recent => None,
            TimeSpanKey::Day => Some(&self.day),
            TimeSpanKey::Week => Some(&self.week),
            TimeSpanKey::Month => Some(&self.month),
            TimeSpanKey::Year => Some(&self.year),
        }
    }

    /// Fetch options for `key`, with calendar spans covering the period
    /// that contains `now_ms`.
    pub fn span_options(&self, key: TimeSpanKey, now_ms: i64) -> TimeSpanOptions {
        let options = match self.span(key) {
            None => {
                let start = now_ms - self.recent.retention_minutes as i64 * MINUTE_MS;
                TimeSpanOptions::new(&self.recent.measurement, start).detail(self.recent.detail_minutes)
            }
            Some(span) => {
                let options = TimeSpanOptions::new(&span.measurement, now_ms);
                match span.aggregation_ms {
                    Some(ms) if ms > 0 => options.aggregation(ms),
                    _ => options,
                }
            }
        };
        options.tags(self.tags.clone())
    }

    /// Freshness policy for `key` when no live feed keeps it current.
    pub fn freshness(&self, key: TimeSpanKey) -> FreshnessPolicy {
        let max_age_secs = match self.span(key) {
            None => self.recent.max_age_secs,
            Some(span) => span.max_age_secs,
        };
        match max_age_secs {
            0 => FreshnessPolicy::Never,
            secs => FreshnessPolicy::MaxAge(Duration::from_secs(secs)),
        }
    }

    /// Create the session records for a dashboard started at `now_ms`.
    pub fn build_store(&self, now_ms: i64) -> DashboardStore {
        DashboardStore::new(
            |key| self.span_options(key, now_ms),
            self.recent.retention_minutes,
        )
    }
}
