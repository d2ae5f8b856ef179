//! Plot-ready projection of the selected time span.

use chrono::TimeZone;
use serde::Serialize;
use weatherwatch_types::{Packet, TimeSpanKey, MINUTE_MS};

use super::calendar::period_bounds;
use super::domain::{nice_domain_and_ticks, Axis};
use super::stale::fresh_tail;
use crate::store::TimeSpanRecord;

/// Detail window used when the `recent` options carry none.
pub const DEFAULT_DETAIL_MINUTES: u32 = 5;

/// What the chart area should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStatus {
    /// A fetch is in flight and there is nothing to show yet.
    Loading,
    /// Nothing to plot.
    Empty,
    /// Packets are available; a refresh may still be pending.
    Ready,
}

/// Render-ready data for the selected time span.
#[derive(Debug, Clone, Serialize)]
pub struct PlotProjection<'a> {
    pub key: TimeSpanKey,
    pub header: String,
    #[serde(flatten)]
    pub axis: Axis,
    pub is_fetching: bool,
    pub status: PlotStatus,
    pub packets: &'a [Packet],
}

/// Derive the projection for `key` from its record.
///
/// `recent` is trimmed to its detail window ending at `now_ms` and its axis
/// follows the surviving packets; calendar spans plot everything stored and
/// their axis covers the whole period containing the start marker.
pub fn plot_projection<'a, Tz: TimeZone>(
    key: TimeSpanKey,
    record: &'a TimeSpanRecord,
    now_ms: i64,
    tick_count: usize,
    tz: &Tz,
) -> PlotProjection<'a> {
    let options = &record.options;
    let (packets, header, bounds) = match key.calendar_unit() {
        None => {
            let detail = options.detail_minutes.unwrap_or(DEFAULT_DETAIL_MINUTES);
            let packets = fresh_tail(&record.packets, detail as i64 * MINUTE_MS, now_ms);
            let bounds = packets.first().zip(packets.last()).map(|(a, b)| (a.timestamp, b.timestamp));
            (packets, format!("Last {} minutes", detail), bounds)
        }
        Some(unit) => {
            let mut header = format!("This {}", key);
            if let Some(aggregation) = options.aggregation_ms {
                header.push_str(&format!(
                    " ({} minute aggregation)",
                    aggregation as f64 / MINUTE_MS as f64
                ));
            }
            let bounds = period_bounds(unit, options.start_ms, tz);
            (record.packets.as_slice(), header, bounds)
        }
    };

    let axis = match bounds {
        Some((t_min, t_max)) if !packets.is_empty() => {
            nice_domain_and_ticks(t_min, t_max, tick_count, tz)
        }
        _ => Axis::auto(),
    };

    let is_fetching = record.is_fetching();
    let status = match (packets.is_empty(), is_fetching) {
        (false, _) => PlotStatus::Ready,
        (true, true) => PlotStatus::Loading,
        (true, false) => PlotStatus::Empty,
    };

    PlotProjection {
        key,
        header,
        axis,
        is_fetching,
        status,
        packets,
    }
}
