//! Channel-based live feed.
//!
//! Receives live packets via a tokio broadcast channel. This is useful when
//! the dashboard is embedded next to the code that produces the packets,
//! and for driving the dashboard in tests.

use tokio::sync::broadcast;
use tracing::warn;
use weatherwatch_types::TagFilter;

use super::{LiveMessage, LiveSink, PacketStream, SubscriptionHandle};
use crate::error::SubscribeError;

/// Capacity of the broadcast channel created by [`ChannelFeed::create`].
const CHANNEL_CAPACITY: usize = 256;

/// A live feed that receives packets via a channel.
///
/// Every subscription gets its own receiver and sees only the messages
/// whose measurement and tags match it.
///
/// # Example
///
/// ```
/// use weatherwatch::ChannelFeed;
///
/// let (tx, feed) = ChannelFeed::create("in-process");
/// ```
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    sender: broadcast::Sender<LiveMessage>,
    description: String,
}

impl ChannelFeed {
    /// Create a feed around an existing sender.
    pub fn new(sender: broadcast::Sender<LiveMessage>, source_description: &str) -> Self {
        Self {
            sender,
            description: format!("channel: {}", source_description),
        }
    }

    /// Create a channel pair for pushing packets into a ChannelFeed.
    pub fn create(source_description: &str) -> (broadcast::Sender<LiveMessage>, Self) {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        let feed = Self::new(tx.clone(), source_description);
        (tx, feed)
    }
}

impl PacketStream for ChannelFeed {
    fn subscribe(
        &self,
        measurement: &str,
        tags: &TagFilter,
        sink: LiveSink,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if measurement.is_empty() {
            return Err(SubscribeError::Unsupported("empty measurement name".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SubscribeError::Connect(e.to_string()))?;

        let mut receiver = self.sender.subscribe();
        let tags = tags.clone();
        let task = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if message.measurement != sink.measurement()
                            || !tags.matches(message.platform.as_deref(), message.stream.as_deref())
                        {
                            continue;
                        }
                        if !sink.deliver(message.packet) {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Live subscription for {} lagged, skipped {} packets",
                            sink.measurement(),
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        sink.fail("Feed closed");
                        return;
                    }
                }
            }
        });

        Ok(SubscriptionHandle::from_task(task))
    }

    fn description(&self) -> &str {
        &self.description
    }
}
