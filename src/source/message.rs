//! Wire envelope for live packets.

use serde::{Deserialize, Serialize};
use weatherwatch_types::Packet;

/// One live packet as published by a station feed.
///
/// Feeds serving a single measurement may send bare packets instead; those
/// are attributed to the subscribed measurement with no tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    pub measurement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    pub packet: Packet,
}

impl LiveMessage {
    pub fn new(measurement: &str, packet: Packet) -> Self {
        Self {
            measurement: measurement.to_string(),
            platform: None,
            stream: None,
            packet,
        }
    }

    /// Decode a line as an envelope, falling back to a bare packet.
    pub fn parse_line(line: &str, default_measurement: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<LiveMessage>(line) {
            Ok(message) => Ok(message),
            Err(envelope_err) => serde_json::from_str::<Packet>(line)
                .map(|packet| LiveMessage::new(default_measurement, packet))
                .map_err(|_| envelope_err),
        }
    }
}
