//! Summary statistics over a time span.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::Packet;

/// Summary of one observation type over a period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObsStats {
    pub min: f64,
    /// Timestamp (ms) at which the minimum occurred.
    pub min_time: i64,
    pub max: f64,
    /// Timestamp (ms) at which the maximum occurred.
    pub max_time: i64,
    pub avg: f64,
    /// Number of samples contributing.
    pub count: u64,
}

/// Per-observation statistics for a time span.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    pub obs: BTreeMap<String, ObsStats>,
}

impl Stats {
    /// Compute statistics over a packet sequence.
    ///
    /// Ties keep the earliest timestamp for both the minimum and the maximum.
    pub fn from_packets<'a, I>(packets: I) -> Self
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let mut sums: BTreeMap<String, (ObsStats, f64)> = BTreeMap::new();

        for packet in packets {
            for (name, &value) in &packet.fields {
                if value.is_nan() {
                    continue;
                }
                match sums.get_mut(name) {
                    Some((s, sum)) => {
                        if value < s.min {
                            s.min = value;
                            s.min_time = packet.timestamp;
                        }
                        if value > s.max {
                            s.max = value;
                            s.max_time = packet.timestamp;
                        }
                        s.count += 1;
                        *sum += value;
                    }
                    None => {
                        let s = ObsStats {
                            min: value,
                            min_time: packet.timestamp,
                            max: value,
                            max_time: packet.timestamp,
                            avg: value,
                            count: 1,
                        };
                        sums.insert(name.clone(), (s, value));
                    }
                }
            }
        }

        let obs = sums
            .into_iter()
            .map(|(name, (mut s, sum))| {
                s.avg = sum / s.count as f64;
                (name, s)
            })
            .collect();
        Self { obs }
    }

    /// Get the statistics for one observation type.
    pub fn get(&self, obs_type: &str) -> Option<&ObsStats> {
        self.obs.get(obs_type)
    }

    /// Check if no observation has statistics.
    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn from_packets_tracks_extremes_and_mean() {
        let packets = vec![
            Packet::new(1).with("out_temperature", 10.0),
            Packet::new(2).with("out_temperature", 14.0).with("wind_speed", 3.0),
            Packet::new(3).with("out_temperature", 6.0),
        ];

        let stats = Stats::from_packets(&packets);
        let temp = stats.get("out_temperature").unwrap();
        assert_eq!(temp.min, 6.0);
        assert_eq!(temp.min_time, 3);
        assert_eq!(temp.max, 14.0);
        assert_eq!(temp.max_time, 2);
        assert_eq!(temp.avg, 10.0);
        assert_eq!(temp.count, 3);

        assert_eq!(stats.get("wind_speed").unwrap().count, 1);
    }

    #[test]
    fn from_empty_is_empty() {
        assert!(Stats::from_packets(&Vec::<Packet>::new()).is_empty());
    }
}
