//! Collaborators that supply packets: historical fetches and live feeds.
//!
//! The dashboard never talks to a transport directly. Historical data comes
//! from a [`PacketFetcher`] / [`StatsFetcher`], live packets from a
//! [`PacketStream`]. Implementations:
//!
//! - [`ArchiveSource`]: JSON packet archives on disk (both fetchers)
//! - [`TcpFeed`]: newline-delimited JSON packets over TCP (live)
//! - [`ChannelFeed`]: in-process broadcast channel (live)

mod archive;
mod channel;
mod message;
mod stream;

pub use archive::ArchiveSource;
pub use channel::ChannelFeed;
pub use message::LiveMessage;
pub use stream::TcpFeed;

use std::fmt::{self, Debug};

use async_trait::async_trait;
use tokio::sync::mpsc;
use weatherwatch_types::{Packet, Stats, TagFilter, TimeSpanKey, TimeSpanOptions};

use crate::error::{FetchError, SubscribeError};

/// Fetches the historical packets of a time span.
#[async_trait]
pub trait PacketFetcher: Send + Sync {
    /// Fetch all packets for `key`, ascending by timestamp.
    async fn fetch(
        &self,
        key: TimeSpanKey,
        options: &TimeSpanOptions,
    ) -> Result<Vec<Packet>, FetchError>;
}

/// Fetches summary statistics for an aggregation key.
#[async_trait]
pub trait StatsFetcher: Send + Sync {
    async fn fetch_stats(
        &self,
        key: TimeSpanKey,
        options: &TimeSpanOptions,
    ) -> Result<Stats, FetchError>;
}

/// A source of live packets, one subscription per measurement.
pub trait PacketStream: Send + Sync {
    /// Start delivering packets for `measurement` into `sink`.
    ///
    /// Setup that fails immediately is returned as an error. Failures after
    /// this call returns are reported through [`LiveSink::fail`].
    fn subscribe(
        &self,
        measurement: &str,
        tags: &TagFilter,
        sink: LiveSink,
    ) -> Result<SubscriptionHandle, SubscribeError>;

    /// Human-readable description for the status bar.
    fn description(&self) -> &str;
}

/// Events pushed by live subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A new packet for a measurement.
    Packet {
        subscription: u64,
        measurement: String,
        packet: Packet,
    },
    /// The subscription stopped delivering and should be recreated.
    Failed {
        subscription: u64,
        measurement: String,
        error: String,
    },
}

impl LiveEvent {
    /// Id of the subscription that produced this event.
    pub fn subscription(&self) -> u64 {
        match self {
            LiveEvent::Packet { subscription, .. } | LiveEvent::Failed { subscription, .. } => {
                *subscription
            }
        }
    }
}

/// Push side handed to a [`PacketStream`] for one subscription.
#[derive(Debug, Clone)]
pub struct LiveSink {
    subscription: u64,
    measurement: String,
    tx: mpsc::UnboundedSender<LiveEvent>,
}

impl LiveSink {
    pub fn new(subscription: u64, measurement: &str, tx: mpsc::UnboundedSender<LiveEvent>) -> Self {
        Self {
            subscription,
            measurement: measurement.to_string(),
            tx,
        }
    }

    /// The measurement this sink receives.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Deliver a packet. Returns `false` once the receiving side is gone.
    pub fn deliver(&self, packet: Packet) -> bool {
        self.tx
            .send(LiveEvent::Packet {
                subscription: self.subscription,
                measurement: self.measurement.clone(),
                packet,
            })
            .is_ok()
    }

    /// Report that the subscription has stopped.
    pub fn fail(&self, error: impl fmt::Display) {
        let _ = self.tx.send(LiveEvent::Failed {
            subscription: self.subscription,
            measurement: self.measurement.clone(),
            error: error.to_string(),
        });
    }

    /// Check whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The cancel capability of one live subscription.
///
/// Cancelling consumes the handle, so a subscription can be cancelled at
/// most once.
pub struct SubscriptionHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// A handle that aborts a background task.
    pub fn from_task(task: tokio::task::JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle").finish_non_exhaustive()
    }
}
