//! Time-series charts for the selected span.

use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    symbols::Marker,
    text::Line,
    widgets::{Axis as ChartAxis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use weatherwatch_types::{Packet, TimeSpanKey};

use super::local_time;
use crate::app::App;
use crate::data::{units, Axis, Domain, PlotStatus};

/// Points of one observation type, skipping packets that lack it.
pub(crate) fn series(packets: &[Packet], obs_type: &str) -> Vec<(f64, f64)> {
    packets
        .iter()
        .filter_map(|p| p.get(obs_type).map(|v| (p.timestamp as f64, v)))
        .collect()
}

/// Horizontal bounds: the fixed domain, or the data's extent when auto.
pub(crate) fn x_bounds(axis: &Axis, points: &[(f64, f64)]) -> Option<[f64; 2]> {
    match axis.domain {
        Domain::Fixed { lo, hi } => Some([lo as f64, hi as f64]),
        Domain::Auto => {
            let first = points.first()?.0;
            let last = points.last()?.0;
            if first < last {
                Some([first, last])
            } else {
                // A single instant still needs a non-empty range
                Some([first - 30_000.0, first + 30_000.0])
            }
        }
    }
}

/// Vertical bounds with a little headroom.
pub(crate) fn y_bounds(points: &[(f64, f64)]) -> [f64; 2] {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return [0.0, 1.0];
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    [min - pad, max + pad]
}

/// strftime pattern for tick labels of a span.
fn tick_pattern(key: TimeSpanKey) -> &'static str {
    match key {
        TimeSpanKey::Recent | TimeSpanKey::Day => "%H:%M",
        TimeSpanKey::Week => "%a %d",
        TimeSpanKey::Month => "%b %d",
        TimeSpanKey::Year => "%b",
    }
}

fn tick_labels(key: TimeSpanKey, axis: &Axis, bounds: [f64; 2]) -> Vec<String> {
    let pattern = tick_pattern(key);
    let format = |ms: i64| {
        local_time(ms)
            .map(|t| t.format(pattern).to_string())
            .unwrap_or_default()
    };
    if axis.ticks.is_empty() {
        vec![format(bounds[0] as i64), format(bounds[1] as i64)]
    } else {
        axis.ticks.iter().map(|&t| format(t)).collect()
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect, now_ms: i64) {
    let projection =
        app.controller()
            .plot_projection(&app.store, now_ms, app.settings.plot.x_ticks, &Local);

    let mut title = format!(" {} ", projection.header);
    if projection.is_fetching {
        title.push_str("(updating...) ");
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let message = match projection.status {
        PlotStatus::Loading => Some("Loading..."),
        PlotStatus::Empty => Some("Empty."),
        PlotStatus::Ready => None,
    };
    if let Some(message) = message {
        let paragraph = Paragraph::new(Line::from(message))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let obs_types = &app.settings.plot.obs_types;
    if obs_types.is_empty() {
        return;
    }
    let areas = Layout::vertical(obs_types.iter().map(|_| Constraint::Fill(1))).split(inner);
    let style = app.theme.content_style(projection.is_fetching);

    for (i, (obs_type, chart_area)) in obs_types.iter().zip(areas.iter()).enumerate() {
        let points = series(projection.packets, obs_type);
        let Some(x) = x_bounds(&projection.axis, &points) else {
            let empty = Paragraph::new(format!("{}: no data", units::label(obs_type)))
                .style(style);
            frame.render_widget(empty, *chart_area);
            continue;
        };
        let y = y_bounds(&points);

        let dataset = Dataset::default()
            .name(units::label(obs_type))
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.series_color(i)))
            .data(&points);

        let chart = Chart::new(vec![dataset])
            .style(style)
            .x_axis(
                ChartAxis::default()
                    .bounds(x)
                    .labels(tick_labels(projection.key, &projection.axis, x)),
            )
            .y_axis(
                ChartAxis::default()
                    .bounds(y)
                    .labels(vec![
                        units::format_value(obs_type, y[0]),
                        units::format_value(obs_type, y[1]),
                    ]),
            );

        frame.render_widget(chart, *chart_area);
    }
}
