//! Session-long time span and statistics records.
//!
//! One record per [`TimeSpanKey`] is created at startup and lives for the
//! whole session. The view layer only reads these records; writes come from
//! fetch completions and live packet delivery, both applied by the
//! controller's `pump`.

use std::time::Instant;

use weatherwatch_types::{Packet, Stats, TimeSpanKey, TimeSpanOptions, MINUTE_MS};

/// Where a record is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Never fetched.
    #[default]
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed; treated like `Idle` by the next request.
    Failed,
}

/// Fetch bookkeeping shared by packet and statistics records.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub phase: FetchPhase,
    /// When the last successful fetch completed.
    pub last_fetched: Option<Instant>,
    /// Message of the last failed fetch, cleared on success.
    pub last_error: Option<String>,
    /// Invalidated while a fetch was in flight; fetch again once it resolves.
    pub(crate) refetch: bool,
}

impl FetchState {
    pub fn is_fetching(&self) -> bool {
        self.phase == FetchPhase::Fetching
    }

    pub(crate) fn begin(&mut self) {
        self.phase = FetchPhase::Fetching;
        self.refetch = false;
    }

    pub(crate) fn succeed(&mut self) {
        self.phase = FetchPhase::Ready;
        self.last_fetched = Some(Instant::now());
        self.last_error = None;
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.phase = FetchPhase::Failed;
        self.last_error = Some(error);
    }

    /// Forget the last success so the next request refetches.
    ///
    /// A fetch already in flight may carry stale data, so it is flagged to
    /// be repeated when it resolves.
    pub(crate) fn invalidate(&mut self) {
        self.last_fetched = None;
        if self.is_fetching() {
            self.refetch = true;
        }
    }
}

/// Packets and fetch state for one time span.
#[derive(Debug, Clone)]
pub struct TimeSpanRecord {
    pub options: TimeSpanOptions,
    /// Ascending by timestamp.
    pub packets: Vec<Packet>,
    pub fetch: FetchState,
}

impl TimeSpanRecord {
    pub fn new(options: TimeSpanOptions) -> Self {
        Self {
            options,
            packets: Vec::new(),
            fetch: FetchState::default(),
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_fetching()
    }

    /// Raw (unaggregated) spans are the ones live packets are appended to.
    pub fn is_raw(&self) -> bool {
        self.options.aggregation_ms.is_none()
    }

    /// Whether live packets for the measurement belong in this record.
    pub fn accepts_live(&self, measurement: &str) -> bool {
        self.is_raw() && self.options.measurement == measurement
    }

    /// Insert a live packet, keeping the sequence ascending.
    fn insert_live(&mut self, packet: Packet) {
        match self.packets.last() {
            Some(last) if packet.timestamp < last.timestamp => {
                let at = self.packets.partition_point(|p| p.timestamp <= packet.timestamp);
                self.packets.insert(at, packet);
            }
            _ => self.packets.push(packet),
        }
    }

    /// Drop packets older than `window_ms` before the newest packet.
    fn retain_window(&mut self, window_ms: i64) {
        let Some(newest) = self.packets.last().map(|p| p.timestamp) else {
            return;
        };
        let cutoff = newest.saturating_sub(window_ms);
        let stale = self.packets.partition_point(|p| p.timestamp < cutoff);
        if stale > 0 {
            self.packets.drain(..stale);
        }
    }
}

/// Statistics and fetch state for one aggregation key.
#[derive(Debug, Clone, Default)]
pub struct StatsRecord {
    pub stats: Option<Stats>,
    pub fetch: FetchState,
}

/// All session records, indexed by key.
#[derive(Debug, Clone)]
pub struct DashboardStore {
    spans: [TimeSpanRecord; 5],
    stats: [StatsRecord; 5],
    /// How much live history the `recent` record keeps.
    recent_retention_ms: i64,
}

impl DashboardStore {
    /// Create the five session records from per-key options.
    pub fn new<F>(mut options_for: F, recent_retention_minutes: u32) -> Self
    where
        F: FnMut(TimeSpanKey) -> TimeSpanOptions,
    {
        Self {
            spans: TimeSpanKey::ALL.map(|key| TimeSpanRecord::new(options_for(key))),
            stats: Default::default(),
            recent_retention_ms: recent_retention_minutes as i64 * MINUTE_MS,
        }
    }

    pub fn span(&self, key: TimeSpanKey) -> &TimeSpanRecord {
        &self.spans[key.index()]
    }

    pub(crate) fn span_mut(&mut self, key: TimeSpanKey) -> &mut TimeSpanRecord {
        &mut self.spans[key.index()]
    }

    pub fn stats(&self, key: TimeSpanKey) -> &StatsRecord {
        &self.stats[key.index()]
    }

    pub(crate) fn stats_mut(&mut self, key: TimeSpanKey) -> &mut StatsRecord {
        &mut self.stats[key.index()]
    }

    /// Change the displayed window of the `recent` span.
    pub fn set_recent_detail(&mut self, minutes: u32) {
        self.span_mut(TimeSpanKey::Recent).options.detail_minutes = Some(minutes);
    }

    /// The newest `recent` packet, if any.
    pub fn current_packet(&self) -> Option<&Packet> {
        self.span(TimeSpanKey::Recent).packets.last()
    }

    /// Replace a span's packets with a completed fetch.
    ///
    /// Raw spans keep live packets newer than the fetched data, since those
    /// may have arrived while the fetch was in flight.
    pub(crate) fn apply_fetched(&mut self, key: TimeSpanKey, mut packets: Vec<Packet>) {
        packets.sort_by_key(|p| p.timestamp);
        let record = self.span_mut(key);
        if record.is_raw() {
            let newest = packets.last().map_or(i64::MIN, |p| p.timestamp);
            packets.extend(record.packets.drain(..).filter(|p| p.timestamp > newest));
        }
        record.packets = packets;
        record.fetch.succeed();
    }

    /// Append a live packet to every raw span reading `measurement`.
    ///
    /// Returns the number of records updated.
    pub(crate) fn apply_live(&mut self, measurement: &str, packet: &Packet) -> usize {
        let retention = self.recent_retention_ms;
        let mut updated = 0;
        for (key, record) in TimeSpanKey::ALL.into_iter().zip(self.spans.iter_mut()) {
            if !record.accepts_live(measurement) {
                continue;
            }
            record.insert_live(packet.clone());
            if key == TimeSpanKey::Recent {
                record.retain_window(retention);
            }
            updated += 1;
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DashboardStore {
        DashboardStore::new(
            |key| match key {
                TimeSpanKey::Recent => TimeSpanOptions::new("wx", 0).detail(5),
                _ => TimeSpanOptions::new("wx", 0).aggregation(300_000),
            },
            60,
        )
    }

    fn timestamps(record: &TimeSpanRecord) -> Vec<i64> {
        record.packets.iter().map(|p| p.timestamp).collect()
    }

    #[test]
    fn test_live_packets_only_reach_raw_spans() {
        let mut store = store();
        assert_eq!(store.apply_live("wx", &Packet::new(10)), 1);
        assert_eq!(store.apply_live("other", &Packet::new(20)), 0);

        assert_eq!(timestamps(store.span(TimeSpanKey::Recent)), vec![10]);
        assert!(store.span(TimeSpanKey::Day).packets.is_empty());
    }

    #[test]
    fn test_out_of_order_live_packet_is_inserted_in_place() {
        let mut store = store();
        for t in [10, 30, 20, 30, 5] {
            store.apply_live("wx", &Packet::new(t));
        }
        assert_eq!(timestamps(store.span(TimeSpanKey::Recent)), vec![5, 10, 20, 30, 30]);
    }

    #[test]
    fn test_recent_retention_trims_old_packets() {
        let mut store = store();
        store.apply_live("wx", &Packet::new(0));
        store.apply_live("wx", &Packet::new(30 * MINUTE_MS));
        store.apply_live("wx", &Packet::new(61 * MINUTE_MS));

        assert_eq!(
            timestamps(store.span(TimeSpanKey::Recent)),
            vec![30 * MINUTE_MS, 61 * MINUTE_MS]
        );
    }

    #[test]
    fn test_apply_fetched_sorts_and_marks_ready() {
        let mut store = store();
        store.span_mut(TimeSpanKey::Week).fetch.begin();
        store.apply_fetched(TimeSpanKey::Week, vec![Packet::new(3), Packet::new(1)]);

        let week = store.span(TimeSpanKey::Week);
        assert_eq!(timestamps(week), vec![1, 3]);
        assert_eq!(week.fetch.phase, FetchPhase::Ready);
        assert!(week.fetch.last_fetched.is_some());
    }

    #[test]
    fn test_invalidate_in_flight_flags_refetch() {
        let mut state = FetchState::default();
        state.succeed();
        state.invalidate();
        assert!(state.last_fetched.is_none());
        assert!(!state.refetch);

        state.begin();
        state.invalidate();
        assert!(state.refetch);
        state.begin();
        assert!(!state.refetch);
    }

    #[test]
    fn test_fetch_keeps_newer_live_packets_on_raw_spans() {
        let mut store = store();
        store.apply_live("wx", &Packet::new(50));
        store.apply_live("wx", &Packet::new(150));
        store.apply_fetched(TimeSpanKey::Recent, vec![Packet::new(40), Packet::new(100)]);

        assert_eq!(timestamps(store.span(TimeSpanKey::Recent)), vec![40, 100, 150]);
    }

    #[test]
    fn test_current_packet_is_newest_recent() {
        let mut store = store();
        assert!(store.current_packet().is_none());
        store.apply_live("wx", &Packet::new(1).with("wind_speed", 2.0));
        store.apply_live("wx", &Packet::new(2).with("wind_speed", 4.0));
        assert_eq!(store.current_packet().and_then(|p| p.get("wind_speed")), Some(4.0));
    }
}
