//! Keeps fetched data and live subscriptions in step with the selected span.
//!
//! The controller never blocks. Fetches and subscriptions are dispatched
//! when the selection changes, and their results are folded into the
//! [`DashboardStore`] by [`TimeSpanController::pump`], which the UI loop
//! calls once per tick. Between pumps the store is only read.

use chrono::TimeZone;
use tracing::{debug, warn};
use weatherwatch_types::{Packet, TimeSpanKey};

use crate::data::{plot_projection, PlotProjection};
use crate::fetch::FetchCoordinator;
use crate::source::LiveEvent;
use crate::store::{DashboardStore, StatsRecord};
use crate::subscription::SubscriptionManager;

/// The always-live head packet of the `recent` span.
#[derive(Debug, Clone, Copy)]
pub struct CurrentConditions<'a> {
    pub packet: Option<&'a Packet>,
    pub is_fetching: bool,
}

/// What a call to [`TimeSpanController::pump`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    /// Fetch and stats completions applied.
    pub completions: usize,
    /// Live packets applied to at least one record.
    pub packets: usize,
    /// Subscriptions that failed and were dropped.
    pub failures: usize,
}

impl PumpSummary {
    pub fn changed(&self) -> bool {
        self.completions + self.packets + self.failures > 0
    }
}

/// Orchestrates fetches and live subscriptions for the selected time span.
pub struct TimeSpanController {
    fetch: FetchCoordinator,
    subscriptions: SubscriptionManager,
    selection: TimeSpanKey,
    active: bool,
}

impl TimeSpanController {
    pub fn new(
        fetch: FetchCoordinator,
        subscriptions: SubscriptionManager,
        selection: TimeSpanKey,
    ) -> Self {
        Self {
            fetch,
            subscriptions,
            selection,
            active: false,
        }
    }

    pub fn selection(&self) -> TimeSpanKey {
        self.selection
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Fetches dispatched but not yet applied.
    pub fn pending_fetches(&self) -> usize {
        self.fetch.pending()
    }

    /// Start driving the store.
    ///
    /// `recent` is always fetched and subscribed since the current
    /// conditions come from it. The selection is added if it differs.
    pub fn activate(&mut self, store: &mut DashboardStore) {
        self.active = true;
        self.ensure_span(store, TimeSpanKey::Recent);
        if self.selection != TimeSpanKey::Recent {
            self.ensure_span(store, self.selection);
        }
        self.fetch.ensure_stats(store, self.selection.stats_key());
    }

    /// Change the selected span.
    pub fn select(&mut self, store: &mut DashboardStore, key: TimeSpanKey) {
        let previous = std::mem::replace(&mut self.selection, key);
        if self.active {
            self.on_selection_change(store, previous, key);
        }
    }

    fn on_selection_change(
        &mut self,
        store: &mut DashboardStore,
        previous: TimeSpanKey,
        key: TimeSpanKey,
    ) {
        if previous == key {
            return;
        }
        debug!("Selection changed from {} to {}", previous, key);
        self.ensure_span(store, key);
        self.fetch.ensure_stats(store, key.stats_key());
    }

    /// Release every live subscription.
    ///
    /// In-flight fetches are left to complete. Returns how many
    /// subscriptions were cancelled.
    pub fn deactivate(&mut self) -> usize {
        self.active = false;
        self.subscriptions.cancel_all()
    }

    /// Refetch the selected span and its statistics regardless of freshness.
    pub fn refresh(&mut self, store: &mut DashboardStore) {
        let key = self.selection;
        self.fetch.invalidate(store, key);
        self.fetch.invalidate_stats(store, key.stats_key());
        if self.active {
            self.ensure_span(store, key);
            self.fetch.ensure_stats(store, key.stats_key());
        }
    }

    /// Fetch `key` if needed and subscribe to its measurement.
    ///
    /// A raw span with a live subscription is kept current by the feed, so
    /// it is only fetched once. Without one the configured freshness applies.
    fn ensure_span(&mut self, store: &mut DashboardStore, key: TimeSpanKey) {
        let record = store.span(key);
        let live = record.is_raw() && self.subscriptions.is_subscribed(&record.options.measurement);
        if live {
            self.fetch.ensure_fetched_live(store, key);
        } else {
            self.fetch.ensure_fetched(store, key);
        }

        let options = &store.span(key).options;
        if let Err(e) = self.subscriptions.subscribe(&options.measurement, &options.tags) {
            warn!(
                "Live feed unavailable for {}, showing fetched data only: {}",
                options.measurement, e
            );
        }
    }

    /// Apply every fetch completion and live event that has arrived.
    pub fn pump(&mut self, store: &mut DashboardStore) -> PumpSummary {
        let mut summary = PumpSummary {
            completions: self.fetch.drain(store),
            ..PumpSummary::default()
        };
        while let Some(event) = self.subscriptions.try_next_event() {
            match event {
                LiveEvent::Packet { measurement, packet, .. } => {
                    if store.apply_live(&measurement, &packet) > 0 {
                        summary.packets += 1;
                    }
                }
                LiveEvent::Failed { measurement, .. } => {
                    // Packets missed since the feed dropped are only recovered by a fetch
                    for key in TimeSpanKey::ALL {
                        if store.span(key).accepts_live(&measurement) {
                            self.fetch.invalidate(store, key);
                        }
                    }
                    summary.failures += 1;
                }
            }
        }
        summary
    }

    /// Wait for every in-flight fetch, then pump.
    pub async fn settle(&mut self, store: &mut DashboardStore) -> PumpSummary {
        let mut completions = 0;
        while self.fetch.next_completion(store).await {
            completions += 1;
        }
        let mut summary = self.pump(store);
        summary.completions += completions;
        summary
    }

    /// Plot-ready data for the selected span.
    pub fn plot_projection<'a, Tz: TimeZone>(
        &self,
        store: &'a DashboardStore,
        now_ms: i64,
        tick_count: usize,
        tz: &Tz,
    ) -> PlotProjection<'a> {
        plot_projection(self.selection, store.span(self.selection), now_ms, tick_count, tz)
    }

    /// The newest `recent` packet and whether `recent` is being fetched.
    pub fn current_conditions<'a>(&self, store: &'a DashboardStore) -> CurrentConditions<'a> {
        CurrentConditions {
            packet: store.current_packet(),
            is_fetching: store.span(TimeSpanKey::Recent).is_fetching(),
        }
    }

    /// Statistics for the selection's aggregation key.
    pub fn stats<'a>(&self, store: &'a DashboardStore) -> &'a StatsRecord {
        store.stats(self.selection.stats_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PlotStatus;
    use crate::fetch::FreshnessPolicy;
    use crate::testing::{RecordingStream, ScriptedFetcher};
    use chrono::Utc;
    use std::sync::Arc;
    use weatherwatch_types::{TimeSpanOptions, MINUTE_MS};

    fn store() -> DashboardStore {
        DashboardStore::new(
            |key| match key {
                TimeSpanKey::Recent => TimeSpanOptions::new("wx", 0).detail(5),
                TimeSpanKey::Day => TimeSpanOptions::new("wx_day", 0).aggregation(300_000),
                _ => TimeSpanOptions::new("wx_long", 0).aggregation(3_600_000),
            },
            60,
        )
    }

    fn controller(
        fetcher: &Arc<ScriptedFetcher>,
        stream: &Arc<RecordingStream>,
        selection: TimeSpanKey,
    ) -> TimeSpanController {
        TimeSpanController::new(
            FetchCoordinator::new(fetcher.clone(), fetcher.clone()),
            SubscriptionManager::new(stream.clone()),
            selection,
        )
    }

    #[tokio::test]
    async fn test_activate_on_recent() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 1);
        assert_eq!(fetcher.calls(TimeSpanKey::Day), 0);
        assert_eq!(fetcher.stats_calls(), vec![TimeSpanKey::Day]);
        assert_eq!(stream.subscribed(), vec!["wx"]);
    }

    #[tokio::test]
    async fn test_activate_on_other_span_adds_it() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Week);

        controller.activate(&mut store);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 1);
        assert_eq!(fetcher.calls(TimeSpanKey::Week), 1);
        assert_eq!(fetcher.stats_calls(), vec![TimeSpanKey::Week]);
        assert_eq!(stream.subscribed(), vec!["wx", "wx_long"]);
    }

    #[tokio::test]
    async fn test_reselecting_same_span_is_noop() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        controller.select(&mut store, TimeSpanKey::Recent);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 1);
        assert_eq!(fetcher.stats_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_while_fetching_dispatches_nothing() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let gate = fetcher.gate(TimeSpanKey::Day);
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        controller.select(&mut store, TimeSpanKey::Day);
        assert!(store.span(TimeSpanKey::Day).is_fetching());

        controller.select(&mut store, TimeSpanKey::Recent);
        controller.select(&mut store, TimeSpanKey::Day);

        gate.send(Ok(vec![Packet::new(10)])).unwrap();
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Day), 1);
        assert_eq!(store.span(TimeSpanKey::Day).packets, vec![Packet::new(10)]);
    }

    #[tokio::test]
    async fn test_late_week_fetch_updates_only_week() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let week_gate = fetcher.gate(TimeSpanKey::Week);
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Day);

        controller.activate(&mut store);
        controller.settle(&mut store).await;
        let day_before = store.span(TimeSpanKey::Day).packets.clone();
        stream.push("wx", Packet::new(1));
        controller.pump(&mut store);

        controller.select(&mut store, TimeSpanKey::Week);
        controller.select(&mut store, TimeSpanKey::Day);
        assert_eq!(controller.selection(), TimeSpanKey::Day);

        week_gate.send(Ok(vec![Packet::new(42)])).unwrap();
        controller.settle(&mut store).await;

        assert_eq!(store.span(TimeSpanKey::Week).packets, vec![Packet::new(42)]);
        assert_eq!(store.span(TimeSpanKey::Day).packets, day_before);
        assert_eq!(fetcher.calls(TimeSpanKey::Day), 1);
        assert!(controller.subscriptions().is_subscribed("wx"));
        assert!(stream.cancelled().is_empty());
        assert_eq!(store.span(TimeSpanKey::Recent).packets, vec![Packet::new(1)]);
    }

    #[tokio::test]
    async fn test_deactivate_cancels_each_subscription_once() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Day);

        controller.activate(&mut store);
        assert_eq!(controller.subscriptions().len(), 2);

        assert_eq!(controller.deactivate(), 2);
        assert_eq!(controller.deactivate(), 0);

        let mut cancelled = stream.cancelled();
        cancelled.sort();
        assert_eq!(cancelled, vec!["wx", "wx_day"]);
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_fetch_resolving_after_deactivate_still_applies() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let gate = fetcher.gate(TimeSpanKey::Recent);
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        controller.deactivate();
        gate.send(Ok(vec![Packet::new(5)])).unwrap();
        controller.settle(&mut store).await;

        assert_eq!(store.span(TimeSpanKey::Recent).packets, vec![Packet::new(5)]);
    }

    #[tokio::test]
    async fn test_live_packets_and_current_conditions() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        assert!(controller.current_conditions(&store).is_fetching);
        controller.settle(&mut store).await;

        stream.push("wx", Packet::new(100).with("out_temperature", 12.5));
        stream.push("wx", Packet::new(200).with("out_temperature", 13.0));
        let summary = controller.pump(&mut store);
        assert_eq!(summary.packets, 2);
        assert!(summary.changed());

        let current = controller.current_conditions(&store);
        assert!(!current.is_fetching);
        assert_eq!(current.packet.and_then(|p| p.get("out_temperature")), Some(13.0));
    }

    #[tokio::test]
    async fn test_subscription_failure_degrades_to_fetch_only() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        stream.refuse("wx_day");
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Day);

        controller.activate(&mut store);
        controller.settle(&mut store).await;

        assert!(!controller.subscriptions().is_subscribed("wx_day"));
        assert_eq!(fetcher.calls(TimeSpanKey::Day), 1);
        assert!(!store.span(TimeSpanKey::Day).is_fetching());
    }

    #[tokio::test]
    async fn test_failed_feed_is_resubscribed_on_next_selection() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        stream.fail("wx");
        assert_eq!(controller.pump(&mut store).failures, 1);
        assert!(!controller.subscriptions().is_subscribed("wx"));

        controller.select(&mut store, TimeSpanKey::Day);
        controller.select(&mut store, TimeSpanKey::Recent);
        assert!(controller.subscriptions().is_subscribed("wx"));
        assert_eq!(stream.subscribed(), vec!["wx", "wx_day", "wx"]);
    }

    #[tokio::test]
    async fn test_recent_is_refetched_after_feed_loss() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        controller.settle(&mut store).await;
        stream.fail("wx");
        assert_eq!(controller.pump(&mut store).failures, 1);

        controller.select(&mut store, TimeSpanKey::Day);
        controller.select(&mut store, TimeSpanKey::Recent);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 2);
        assert!(controller.subscriptions().is_subscribed("wx"));
    }

    #[tokio::test]
    async fn test_feed_loss_during_initial_fetch_refetches_recent() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        stream.fail("wx");
        controller.pump(&mut store);

        controller.select(&mut store, TimeSpanKey::Day);
        controller.select(&mut store, TimeSpanKey::Recent);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 2);
        assert!(!store.span(TimeSpanKey::Recent).is_fetching());
    }

    #[tokio::test]
    async fn test_recent_without_live_feed_follows_freshness_policy() {
        let live = RecordingStream::new();
        let offline = RecordingStream::new();
        offline.refuse("wx");

        for (stream, expected) in [(&live, 1), (&offline, 2)] {
            let fetcher = ScriptedFetcher::new();
            let mut store = store();
            let mut controller = TimeSpanController::new(
                FetchCoordinator::new(fetcher.clone(), fetcher.clone())
                    .with_freshness(TimeSpanKey::Recent, FreshnessPolicy::Never),
                SubscriptionManager::new(stream.clone()),
                TimeSpanKey::Recent,
            );

            controller.activate(&mut store);
            controller.settle(&mut store).await;
            controller.select(&mut store, TimeSpanKey::Day);
            controller.select(&mut store, TimeSpanKey::Recent);
            controller.settle(&mut store).await;

            assert_eq!(fetcher.calls(TimeSpanKey::Recent), expected);
        }
    }

    #[tokio::test]
    async fn test_refresh_on_recent_keeps_day_packets() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Day);

        controller.activate(&mut store);
        controller.select(&mut store, TimeSpanKey::Recent);
        controller.settle(&mut store).await;

        controller.refresh(&mut store);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Recent), 2);
        assert_eq!(fetcher.stats_calls(), vec![TimeSpanKey::Day, TimeSpanKey::Day]);
        assert!(store.span(TimeSpanKey::Day).fetch.last_fetched.is_some());

        controller.select(&mut store, TimeSpanKey::Day);
        controller.settle(&mut store).await;
        assert_eq!(fetcher.calls(TimeSpanKey::Day), 1);
    }

    #[tokio::test]
    async fn test_refresh_refetches_selection() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Month);

        controller.activate(&mut store);
        controller.settle(&mut store).await;
        controller.refresh(&mut store);
        controller.settle(&mut store).await;

        assert_eq!(fetcher.calls(TimeSpanKey::Month), 2);
        assert_eq!(fetcher.stats_calls(), vec![TimeSpanKey::Month, TimeSpanKey::Month]);
    }

    #[tokio::test]
    async fn test_projection_follows_selection() {
        let fetcher = ScriptedFetcher::new();
        let stream = RecordingStream::new();
        let now = 1_700_000_000_000;
        let gate = fetcher.gate(TimeSpanKey::Recent);
        let mut store = store();
        let mut controller = controller(&fetcher, &stream, TimeSpanKey::Recent);

        controller.activate(&mut store);
        let projection = controller.plot_projection(&store, now, 5, &Utc);
        assert_eq!(projection.status, PlotStatus::Loading);

        gate.send(Ok(vec![
            Packet::new(now - 20 * MINUTE_MS),
            Packet::new(now - 4 * MINUTE_MS),
            Packet::new(now - 2 * MINUTE_MS),
            Packet::new(now),
        ]))
        .unwrap();
        controller.settle(&mut store).await;

        let projection = controller.plot_projection(&store, now, 5, &Utc);
        assert_eq!(projection.header, "Last 5 minutes");
        assert_eq!(projection.packets.len(), 3);
        assert_eq!(projection.status, PlotStatus::Ready);

        controller.select(&mut store, TimeSpanKey::Day);
        controller.settle(&mut store).await;
        let projection = controller.plot_projection(&store, now, 5, &Utc);
        assert_eq!(projection.header, "This day (5 minute aggregation)");
        assert_eq!(projection.status, PlotStatus::Empty);
    }
}
