//! Terminal rendering with ratatui.
//!
//! The content area is split in two columns: current conditions and
//! statistics on the left, one chart per observation type on the right.

pub mod common;
pub mod packet;
pub mod plot;
pub mod stats;
pub mod theme;

pub use theme::Theme;

use chrono::{DateTime, Local, TimeZone};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    Frame,
};

use crate::app::App;

/// Render the left and right content columns.
pub fn render_content(frame: &mut Frame, app: &App, area: Rect, now_ms: i64) {
    let [left, right] =
        Layout::horizontal([Constraint::Length(44), Constraint::Min(30)]).areas(area);
    // Table rows plus borders and the time row
    let packet_height = app.settings.packet_table.obs_types.len() as u16 + 3;
    let [packet_area, stats_area] =
        Layout::vertical([Constraint::Length(packet_height), Constraint::Min(4)]).areas(left);

    packet::render(frame, app, packet_area);
    stats::render(frame, app, stats_area);
    plot::render(frame, app, right, now_ms);
}

/// Local time for an epoch-millisecond timestamp.
pub(crate) fn local_time(ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single()
}
