//! Packet - a single timestamped observation record.

use alloc::collections::BTreeMap;
use alloc::string::String;

/// A timestamped observation record from a weather station.
///
/// The set of observation fields is open: a station may report any named
/// numeric observation (`out_temperature`, `wind_speed`, `wind_dir`, ...).
/// Fields whose value is missing or non-numeric are dropped on decode.
///
/// # Example
///
/// ```rust
/// use weatherwatch_types::Packet;
///
/// let packet = Packet::new(1_700_000_000_000).with("sealevel_pressure", 1013.2);
/// assert_eq!(packet.get("sealevel_pressure"), Some(1013.2));
/// assert_eq!(packet.get("radiation_radiation"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawPacket"))]
pub struct Packet {
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,

    /// Observation values keyed by observation type.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub fields: BTreeMap<String, f64>,
}

impl Packet {
    /// Create an empty packet at the given timestamp.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Add an observation value (builder style).
    pub fn with(mut self, obs_type: &str, value: f64) -> Self {
        self.fields.insert(obs_type.into(), value);
        self
    }

    /// Get an observation value.
    pub fn get(&self, obs_type: &str) -> Option<f64> {
        self.fields.get(obs_type).copied()
    }

    /// Check if the packet carries no observations.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode shape for [`Packet`]: stations interleave nulls and string tags
/// (`platform`, `stream`) with the numeric observations.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawPacket {
    timestamp: i64,
    #[serde(flatten)]
    fields: BTreeMap<String, RawValue>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Other(serde::de::IgnoredAny),
}

#[cfg(feature = "serde")]
impl From<RawPacket> for Packet {
    fn from(raw: RawPacket) -> Self {
        let fields = raw
            .fields
            .into_iter()
            .filter_map(|(name, value)| match value {
                RawValue::Number(v) => Some((name, v)),
                RawValue::Other(_) => None,
            })
            .collect();
        Self {
            timestamp: raw.timestamp,
            fields,
        }
    }
}
