//! Statistics table for the selection's aggregation key.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use weatherwatch_types::{ObsStats, TimeSpanKey};

use super::local_time;
use crate::app::App;
use crate::data::units;

/// Title of the statistics block.
fn title(key: TimeSpanKey) -> String {
    match key {
        TimeSpanKey::Day | TimeSpanKey::Recent => " Today's statistics ".to_string(),
        other => format!(" This {}'s statistics ", other),
    }
}

/// Format an extreme with the time it occurred.
///
/// Day statistics show the time of day; longer spans show the date.
fn format_extreme(key: TimeSpanKey, obs: &str, value: f64, at_ms: i64) -> String {
    let pattern = match key {
        TimeSpanKey::Recent | TimeSpanKey::Day => "%H:%M",
        _ => "%b %d",
    };
    match local_time(at_ms) {
        Some(at) => format!("{} {}", units::format_value(obs, value), at.format(pattern)),
        None => units::format_value(obs, value),
    }
}

fn stats_row<'a>(key: TimeSpanKey, obs: &str, stats: &ObsStats) -> Row<'a> {
    Row::new(vec![
        Cell::from(units::label(obs)),
        Cell::from(format_extreme(key, obs, stats.min, stats.min_time)),
        Cell::from(format_extreme(key, obs, stats.max, stats.max_time)),
        Cell::from(units::format_value(obs, stats.avg)),
    ])
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let key = app.selection().stats_key();
    let record = app.controller().stats(&app.store);

    let block = Block::default()
        .title(title(key))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let Some(stats) = record.stats.as_ref() else {
        let text = if record.fetch.is_fetching() {
            "Loading..."
        } else {
            "No statistics."
        };
        frame.render_widget(Paragraph::new(Line::from(text)).block(block), area);
        return;
    };

    let header = Row::new(vec![
        Cell::from("Observation"),
        Cell::from("Min"),
        Cell::from("Max"),
        Cell::from("Avg"),
    ])
    .style(app.theme.header);

    // Only the observations shown in the packet table, in table order
    let rows: Vec<Row> = app
        .settings
        .packet_table
        .obs_types
        .iter()
        .filter_map(|obs| stats.get(obs).map(|s| stats_row(key, obs, s)))
        .collect();

    let widths = [
        Constraint::Fill(3),
        Constraint::Fill(3),
        Constraint::Fill(3),
        Constraint::Fill(2),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .style(app.theme.content_style(record.fetch.is_fetching()))
        .block(block);

    frame.render_widget(table, area);
}
