//! Application state and navigation logic.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use weatherwatch_types::TimeSpanKey;

use crate::config::Settings;
use crate::controller::TimeSpanController;
use crate::store::DashboardStore;
use crate::ui::Theme;

/// Detail windows offered for the `recent` span, in minutes.
pub const DETAIL_CHOICES: [u32; 4] = [5, 10, 30, 60];

/// How long a status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    pub settings: Settings,
    pub store: DashboardStore,
    controller: TimeSpanController,

    /// When the last live packet was applied.
    pub last_packet: Option<Instant>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(
        settings: Settings,
        store: DashboardStore,
        controller: TimeSpanController,
        theme: Theme,
    ) -> Self {
        Self {
            running: true,
            show_help: false,
            settings,
            store,
            controller,
            last_packet: None,
            theme,
            status_message: None,
        }
    }

    /// Start fetching and subscribing. Must run inside a tokio runtime.
    pub fn activate(&mut self) {
        self.controller.activate(&mut self.store);
    }

    pub fn controller(&self) -> &TimeSpanController {
        &self.controller
    }

    /// Returns a description of the live feed.
    pub fn source_description(&self) -> &str {
        self.controller.subscriptions().description()
    }

    pub fn selection(&self) -> TimeSpanKey {
        self.controller.selection()
    }

    /// Detail window of the `recent` span.
    pub fn detail_minutes(&self) -> u32 {
        self.store
            .span(TimeSpanKey::Recent)
            .options
            .detail_minutes
            .unwrap_or(crate::data::DEFAULT_DETAIL_MINUTES)
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_TIMEOUT => Some(msg),
            _ => None,
        }
    }

    /// Apply fetch results and live packets that arrived since the last tick.
    pub fn tick(&mut self) -> bool {
        let summary = self.controller.pump(&mut self.store);
        if summary.packets > 0 {
            self.last_packet = Some(Instant::now());
        }
        if summary.failures > 0 {
            self.set_status_message("Live feed lost, showing fetched data".to_string());
        }
        summary.changed()
    }

    /// Wait for every in-flight fetch and apply the results.
    pub async fn settle(&mut self) {
        self.controller.settle(&mut self.store).await;
    }

    /// Switch to a specific time span.
    pub fn select_span(&mut self, key: TimeSpanKey) {
        self.controller.select(&mut self.store, key);
    }

    /// Switch to the next time span (cycles Recent → Day → ... → Year).
    pub fn next_span(&mut self) {
        self.select_span(self.selection().next());
    }

    /// Switch to the previous time span.
    pub fn prev_span(&mut self) {
        self.select_span(self.selection().prev());
    }

    /// Step the `recent` detail window through [`DETAIL_CHOICES`].
    pub fn cycle_detail(&mut self) {
        let current = self.detail_minutes();
        let next = DETAIL_CHOICES
            .iter()
            .copied()
            .find(|&m| m > current)
            .unwrap_or(DETAIL_CHOICES[0]);
        self.store.set_recent_detail(next);
        self.set_status_message(format!("Showing last {} minutes", next));
    }

    /// Force a refetch of the selected span.
    pub fn refresh(&mut self) {
        self.controller.refresh(&mut self.store);
        self.set_status_message(format!("Refreshing {}", self.selection()));
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Release live subscriptions and stop the main loop.
    pub fn quit(&mut self) {
        self.controller.deactivate();
        self.running = false;
    }

    /// Export the selected span's projection, current conditions and
    /// statistics as JSON.
    pub fn export_json(&self, now_ms: i64) -> serde_json::Value {
        let projection =
            self.controller
                .plot_projection(&self.store, now_ms, self.settings.plot.x_ticks, &Local);
        let current = self.controller.current_conditions(&self.store);
        let stats = self.controller.stats(&self.store);

        serde_json::json!({
            "selection": self.selection(),
            "stats_key": self.selection().stats_key(),
            "projection": projection,
            "current": {
                "packet": current.packet,
                "is_fetching": current.is_fetching,
            },
            "stats": stats.stats,
        })
    }

    /// Write [`App::export_json`] to a file.
    pub fn export_state(&self, path: &Path, now_ms: i64) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.export_json(now_ms))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
