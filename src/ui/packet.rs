//! Current conditions table.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use super::local_time;
use crate::app::App;
use crate::data::units;

/// Render the newest `recent` packet, one row per configured observation.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.controller().current_conditions(&app.store);

    let title = match (current.packet, current.is_fetching) {
        (None, true) => " Current conditions (loading...) ".to_string(),
        (None, false) => " Current conditions (no data) ".to_string(),
        (Some(_), _) => " Current conditions ".to_string(),
    };

    let time = current
        .packet
        .and_then(|p| local_time(p.timestamp))
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut rows = vec![Row::new(vec![Cell::from("Time"), Cell::from(time)]).style(app.theme.header)];
    rows.extend(app.settings.packet_table.obs_types.iter().map(|obs| {
        let value = current.packet.and_then(|p| p.get(obs));
        Row::new(vec![
            Cell::from(units::label(obs)),
            Cell::from(units::format_optional(obs, value)),
        ])
    }));

    let widths = [Constraint::Fill(3), Constraint::Fill(2)];
    let table = Table::new(rows, widths)
        .style(app.theme.content_style(current.is_fetching && current.packet.is_none()))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        );

    frame.render_widget(table, area);
}
