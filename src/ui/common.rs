//! Common UI components.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};
use weatherwatch_types::TimeSpanKey;

use crate::app::App;

/// A live packet older than this is shown as stale in the header.
const LIVE_TIMEOUT_SECS: u64 = 60;

/// Render the header bar with the station name and feed state.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let subscribed = !app.controller().subscriptions().is_empty();
    let (icon, icon_style, state) = match app.last_packet {
        Some(at) if subscribed && at.elapsed().as_secs() < LIVE_TIMEOUT_SECS => (
            "●",
            Style::default().fg(app.theme.live),
            format!("live {:.0}s ago", at.elapsed().as_secs_f64()),
        ),
        _ if subscribed => ("○", Style::default().fg(app.theme.live), "waiting".to_string()),
        _ => ("○", Style::default().fg(app.theme.warning), "no live feed".to_string()),
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", icon), icon_style),
        Span::styled(
            format!("{} ", app.settings.station.title.to_uppercase()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
        Span::raw(state),
        Span::raw(" │ "),
        Span::raw(app.source_description().to_string()),
    ];
    let pending = app.controller().pending_fetches();
    if pending > 0 {
        spans.push(Span::styled(
            format!(" │ fetching {}", pending),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Tab title for a time span.
pub fn tab_title(key: TimeSpanKey, detail_minutes: u32) -> String {
    match key {
        TimeSpanKey::Recent => format!("Recent ({} min)", detail_minutes),
        TimeSpanKey::Day => "Today".to_string(),
        other => format!("This {}", other),
    }
}

/// Render the tab bar showing the time spans.
///
/// Highlights the selected span.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let detail = app.detail_minutes();
    let titles: Vec<Line> = TimeSpanKey::ALL
        .iter()
        .enumerate()
        .map(|(i, key)| Line::from(format!(" {}:{} ", i + 1, tab_title(*key, detail))))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.selection().index())
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows the last fetch error of the selected span if any, otherwise the
/// available controls. Temporary status messages take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let record = app.store.span(app.selection());
    let controls = "1-5:span ←→:switch d:detail r:refresh e:export ?:help q:quit";
    let status = match &record.fetch.last_error {
        Some(err) if !record.is_fetching() => format!(" Fetch failed: {} | r:retry q:quit", err),
        _ => format!(" {} | {}", app.selection(), controls),
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Time spans",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  1-5         Select span"),
        Line::from("  ←/→ h/l     Previous/next span"),
        Line::from("  Tab         Next span"),
        Line::from("  d           Cycle recent detail"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  r           Refetch selected span"),
        Line::from("  e           Export to JSON"),
        Line::from("  q Esc       Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 17u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_titles() {
        assert_eq!(tab_title(TimeSpanKey::Recent, 10), "Recent (10 min)");
        assert_eq!(tab_title(TimeSpanKey::Day, 5), "Today");
        assert_eq!(tab_title(TimeSpanKey::Year, 5), "This year");
    }
}
