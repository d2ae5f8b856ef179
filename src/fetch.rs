//! Fetch-if-needed coordination.
//!
//! [`FetchCoordinator`] dispatches historical fetches onto the tokio runtime
//! and hands the results back through a channel. Results are applied to the
//! [`DashboardStore`] by key in [`FetchCoordinator::drain`], so a fetch that
//! resolves after the user switched spans still lands in its own record.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use weatherwatch_types::{Packet, Stats, TimeSpanKey};

use crate::error::FetchError;
use crate::source::{PacketFetcher, StatsFetcher};
use crate::store::{DashboardStore, FetchPhase, FetchState};

/// Default maximum age of a fetched calendar span.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Default maximum age of `recent` while no live feed keeps it current.
pub const DEFAULT_RECENT_MAX_AGE: Duration = Duration::from_secs(60);

/// When a successfully fetched record may be reused without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Always refetch.
    Never,
    /// Fetch once; later updates arrive live.
    OnceLoaded,
    /// Refetch once the last success is older than this.
    MaxAge(Duration),
}

impl FreshnessPolicy {
    /// Default policy for a span.
    pub fn default_for(key: TimeSpanKey) -> Self {
        match key {
            TimeSpanKey::Recent => FreshnessPolicy::MaxAge(DEFAULT_RECENT_MAX_AGE),
            _ => FreshnessPolicy::MaxAge(DEFAULT_MAX_AGE),
        }
    }

    /// Check whether `state` can be reused. Only successful fetches count.
    pub fn is_fresh(&self, state: &FetchState) -> bool {
        if state.phase != FetchPhase::Ready {
            return false;
        }
        match (self, state.last_fetched) {
            (_, None) | (FreshnessPolicy::Never, _) => false,
            (FreshnessPolicy::OnceLoaded, Some(_)) => true,
            (FreshnessPolicy::MaxAge(max), Some(at)) => at.elapsed() < *max,
        }
    }
}

/// Result of a finished fetch, tagged with the key it belongs to.
#[derive(Debug)]
pub enum Completion {
    Packets {
        key: TimeSpanKey,
        result: Result<Vec<Packet>, FetchError>,
    },
    Stats {
        key: TimeSpanKey,
        result: Result<Stats, FetchError>,
    },
}

/// Issues fetches with at most one in flight per key.
pub struct FetchCoordinator {
    packets: Arc<dyn PacketFetcher>,
    stats: Arc<dyn StatsFetcher>,
    freshness: [FreshnessPolicy; 5],
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl FetchCoordinator {
    pub fn new(packets: Arc<dyn PacketFetcher>, stats: Arc<dyn StatsFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            packets,
            stats,
            freshness: TimeSpanKey::ALL.map(FreshnessPolicy::default_for),
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Override the freshness policy of one key.
    pub fn with_freshness(mut self, key: TimeSpanKey, policy: FreshnessPolicy) -> Self {
        self.freshness[key.index()] = policy;
        self
    }

    pub fn freshness(&self, key: TimeSpanKey) -> FreshnessPolicy {
        self.freshness[key.index()]
    }

    /// Number of dispatched fetches whose results have not been applied.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Fetch `key` unless it is already fetching or still fresh.
    ///
    /// Returns `true` if a fetch was dispatched. Must be called from within
    /// a tokio runtime.
    pub fn ensure_fetched(&mut self, store: &mut DashboardStore, key: TimeSpanKey) -> bool {
        let policy = self.freshness[key.index()];
        self.ensure_fetched_with(store, key, policy)
    }

    /// Fetch `key` for a record a live subscription keeps current.
    ///
    /// Once loaded such a record stays fresh whatever its configured policy.
    pub fn ensure_fetched_live(&mut self, store: &mut DashboardStore, key: TimeSpanKey) -> bool {
        self.ensure_fetched_with(store, key, FreshnessPolicy::OnceLoaded)
    }

    fn ensure_fetched_with(
        &mut self,
        store: &mut DashboardStore,
        key: TimeSpanKey,
        policy: FreshnessPolicy,
    ) -> bool {
        let record = store.span(key);
        if record.is_fetching() || policy.is_fresh(&record.fetch) {
            return false;
        }
        self.dispatch_packets(store, key);
        true
    }

    fn dispatch_packets(&mut self, store: &mut DashboardStore, key: TimeSpanKey) {
        let record = store.span_mut(key);
        record.fetch.begin();
        let options = record.options.clone();

        debug!("Fetching {} from {}", key, options.measurement);
        let fetcher = Arc::clone(&self.packets);
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let task = tokio::spawn(async move { fetcher.fetch(key, &options).await });
            let result = task.await.unwrap_or_else(|e| {
                warn!("Fetch task for {} ended abnormally: {}", key, e);
                Err(FetchError::Closed)
            });
            let _ = tx.send(Completion::Packets { key, result });
        });
    }

    /// Fetch statistics for an aggregation key unless already fetching or fresh.
    pub fn ensure_stats(&mut self, store: &mut DashboardStore, key: TimeSpanKey) -> bool {
        let policy = self.freshness[key.index()];
        let record = store.stats(key);
        if record.fetch.is_fetching() || policy.is_fresh(&record.fetch) {
            return false;
        }
        self.dispatch_stats(store, key);
        true
    }

    fn dispatch_stats(&mut self, store: &mut DashboardStore, key: TimeSpanKey) {
        let options = store.span(key).options.clone();
        store.stats_mut(key).fetch.begin();

        debug!("Fetching {} stats", key);
        let fetcher = Arc::clone(&self.stats);
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let task = tokio::spawn(async move { fetcher.fetch_stats(key, &options).await });
            let result = task.await.unwrap_or_else(|e| {
                warn!("Stats task for {} ended abnormally: {}", key, e);
                Err(FetchError::Closed)
            });
            let _ = tx.send(Completion::Stats { key, result });
        });
    }

    /// Mark `key`'s packets stale so the next request refetches.
    ///
    /// A fetch of `key` already in flight is repeated once it resolves.
    pub fn invalidate(&self, store: &mut DashboardStore, key: TimeSpanKey) {
        store.span_mut(key).fetch.invalidate();
    }

    /// Mark the statistics of `key` stale.
    pub fn invalidate_stats(&self, store: &mut DashboardStore, key: TimeSpanKey) {
        store.stats_mut(key).fetch.invalidate();
    }

    /// Apply every completion that has already arrived.
    ///
    /// Returns the number applied.
    pub fn drain(&mut self, store: &mut DashboardStore) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(store, completion);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `false` immediately when nothing is in flight.
    pub async fn next_completion(&mut self, store: &mut DashboardStore) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.apply(store, completion);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, store: &mut DashboardStore, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Packets { key, result } => {
                match result {
                    Ok(packets) => {
                        info!("Fetched {} packets for {}", packets.len(), key);
                        store.apply_fetched(key, packets);
                    }
                    Err(e) => {
                        warn!("Fetch for {} failed: {}", key, e);
                        store.span_mut(key).fetch.fail(e.to_string());
                    }
                }
                if std::mem::take(&mut store.span_mut(key).fetch.refetch) {
                    debug!("{} was invalidated while fetching", key);
                    self.dispatch_packets(store, key);
                }
            }
            Completion::Stats { key, result } => {
                match result {
                    Ok(stats) => {
                        debug!("Fetched {} stats ({} observation types)", key, stats.obs.len());
                        let record = store.stats_mut(key);
                        record.stats = Some(stats);
                        record.fetch.succeed();
                    }
                    Err(e) => {
                        warn!("Stats fetch for {} failed: {}", key, e);
                        store.stats_mut(key).fetch.fail(e.to_string());
                    }
                }
                if std::mem::take(&mut store.stats_mut(key).fetch.refetch) {
                    debug!("{} stats were invalidated while fetching", key);
                    self.dispatch_stats(store, key);
                }
            }
        }
    }
}
