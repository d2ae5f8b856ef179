//! Live subscription bookkeeping.
//!
//! [`SubscriptionManager`] holds at most one live subscription per
//! measurement. Packets pushed by the feed queue up on a channel and are
//! handed out by [`SubscriptionManager::try_next_event`]; events from
//! subscriptions that have since been cancelled are discarded there.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use weatherwatch_types::TagFilter;

use crate::error::SubscribeError;
use crate::source::{LiveEvent, LiveSink, PacketStream, SubscriptionHandle};

/// Owns every live subscription the dashboard holds.
///
/// All handles are cancelled when the manager is dropped.
pub struct SubscriptionManager {
    /// `None` when the dashboard runs without a live feed.
    stream: Option<Arc<dyn PacketStream>>,
    handles: HashMap<String, (u64, SubscriptionHandle)>,
    next_id: u64,
    tx: mpsc::UnboundedSender<LiveEvent>,
    rx: mpsc::UnboundedReceiver<LiveEvent>,
}

impl SubscriptionManager {
    pub fn new(stream: Arc<dyn PacketStream>) -> Self {
        Self::with_stream(Some(stream))
    }

    /// A manager with no live feed. Every span is served by fetches alone.
    pub fn offline() -> Self {
        Self::with_stream(None)
    }

    fn with_stream(stream: Option<Arc<dyn PacketStream>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            stream,
            handles: HashMap::new(),
            next_id: 0,
            tx,
            rx,
        }
    }

    /// Description of the underlying feed.
    pub fn description(&self) -> &str {
        match &self.stream {
            Some(stream) => stream.description(),
            None => "no live feed",
        }
    }

    /// Subscribe to `measurement` unless a subscription already exists.
    ///
    /// Returns `Ok(true)` if a new subscription was created. An offline
    /// manager never subscribes.
    pub fn subscribe(&mut self, measurement: &str, tags: &TagFilter) -> Result<bool, SubscribeError> {
        let Some(stream) = &self.stream else {
            return Ok(false);
        };
        if self.handles.contains_key(measurement) {
            return Ok(false);
        }
        let id = self.next_id;
        self.next_id += 1;

        let sink = LiveSink::new(id, measurement, self.tx.clone());
        let handle = stream.subscribe(measurement, tags, sink)?;
        info!("Subscribed to {} ({})", measurement, stream.description());
        self.handles.insert(measurement.to_string(), (id, handle));
        Ok(true)
    }

    pub fn is_subscribed(&self, measurement: &str) -> bool {
        self.handles.contains_key(measurement)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every subscription exactly once and forget them.
    ///
    /// Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for (measurement, (_, handle)) in self.handles.drain() {
            debug!("Cancelling subscription to {}", measurement);
            handle.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Take the next event from a current subscription, if one is queued.
    ///
    /// A `Failed` event also removes its subscription so the measurement
    /// can be subscribed again.
    pub fn try_next_event(&mut self) -> Option<LiveEvent> {
        loop {
            let event = self.rx.try_recv().ok()?;
            let measurement = match &event {
                LiveEvent::Packet { measurement, .. } | LiveEvent::Failed { measurement, .. } => {
                    measurement
                }
            };
            let current = self.handles.get(measurement.as_str()).map(|(id, _)| *id);
            if current != Some(event.subscription()) {
                continue;
            }
            if let LiveEvent::Failed { measurement, error, .. } = &event {
                warn!("Live feed for {} failed: {}", measurement, error);
                if let Some((_, handle)) = self.handles.remove(measurement.as_str()) {
                    handle.cancel();
                }
            }
            return Some(event);
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
