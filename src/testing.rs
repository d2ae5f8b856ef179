//! Scripted collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use weatherwatch_types::{Packet, Stats, TagFilter, TimeSpanKey, TimeSpanOptions};

use crate::error::{FetchError, SubscribeError};
use crate::source::{LiveSink, PacketFetcher, PacketStream, StatsFetcher, SubscriptionHandle};

type PacketGate = oneshot::Receiver<Result<Vec<Packet>, FetchError>>;

/// Fetcher whose packet fetches block until the test opens their gate.
///
/// Keys without a gate resolve immediately with no packets. Stats fetches
/// always resolve immediately.
#[derive(Default)]
pub struct ScriptedFetcher {
    calls: Mutex<Vec<TimeSpanKey>>,
    stats_calls: Mutex<Vec<TimeSpanKey>>,
    gates: Mutex<HashMap<TimeSpanKey, PacketGate>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold the next fetch of `key` until the returned sender fires.
    pub fn gate(&self, key: TimeSpanKey) -> oneshot::Sender<Result<Vec<Packet>, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(key, rx);
        tx
    }

    pub fn calls(&self, key: TimeSpanKey) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| **k == key).count()
    }

    pub fn stats_calls(&self) -> Vec<TimeSpanKey> {
        self.stats_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PacketFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        key: TimeSpanKey,
        _options: &TimeSpanOptions,
    ) -> Result<Vec<Packet>, FetchError> {
        self.calls.lock().unwrap().push(key);
        let gate = self.gates.lock().unwrap().remove(&key);
        match gate {
            Some(rx) => rx.await.unwrap_or(Err(FetchError::Closed)),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl StatsFetcher for ScriptedFetcher {
    async fn fetch_stats(
        &self,
        key: TimeSpanKey,
        _options: &TimeSpanOptions,
    ) -> Result<Stats, FetchError> {
        self.stats_calls.lock().unwrap().push(key);
        Ok(Stats::default())
    }
}

/// Live feed that records subscribe and cancel calls.
#[derive(Default)]
pub struct RecordingStream {
    subscribed: Mutex<Vec<String>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    sinks: Mutex<HashMap<String, LiveSink>>,
    refuse: Mutex<HashSet<String>>,
}

impl RecordingStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make setup fail for `measurement`.
    pub fn refuse(&self, measurement: &str) {
        self.refuse.lock().unwrap().insert(measurement.to_string());
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Push a packet through the newest subscription for `measurement`.
    pub fn push(&self, measurement: &str, packet: Packet) -> bool {
        match self.sinks.lock().unwrap().get(measurement) {
            Some(sink) => sink.deliver(packet),
            None => false,
        }
    }

    /// Report an asynchronous failure on `measurement`.
    pub fn fail(&self, measurement: &str) {
        if let Some(sink) = self.sinks.lock().unwrap().get(measurement) {
            sink.fail("stream reset");
        }
    }
}

impl PacketStream for RecordingStream {
    fn subscribe(
        &self,
        measurement: &str,
        _tags: &TagFilter,
        sink: LiveSink,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if self.refuse.lock().unwrap().contains(measurement) {
            return Err(SubscribeError::Connect("refused".into()));
        }
        self.subscribed.lock().unwrap().push(measurement.to_string());
        self.sinks.lock().unwrap().insert(measurement.to_string(), sink);

        let cancelled = Arc::clone(&self.cancelled);
        let name = measurement.to_string();
        Ok(SubscriptionHandle::new(move || {
            cancelled.lock().unwrap().push(name);
        }))
    }

    fn description(&self) -> &str {
        "recording"
    }
}
