//! File-based packet archive.
//!
//! Reads packets from `<dir>/<measurement>.json`. A file may hold a JSON
//! array of packets or one packet per line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::TimeZone;
use tracing::debug;
use weatherwatch_types::{Packet, Stats, TimeSpanKey, TimeSpanOptions};

use super::{PacketFetcher, StatsFetcher};
use crate::data::calendar::period_bounds;
use crate::error::FetchError;

/// A historical data source backed by JSON files on disk.
///
/// Calendar spans are cut to the day/week/month/year containing their
/// start marker, evaluated in the archive's time zone; `recent` returns
/// everything from its start marker on.
///
/// # Example
///
/// ```
/// use weatherwatch::ArchiveSource;
///
/// let archive = ArchiveSource::new("/var/lib/weather", chrono::Utc);
/// assert_eq!(archive.description(), "archive: /var/lib/weather");
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveSource<Tz> {
    dir: PathBuf,
    description: String,
    tz: Tz,
}

impl<Tz: TimeZone> ArchiveSource<Tz> {
    /// Create an archive source rooted at `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, tz: Tz) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let description = format!("archive: {}", dir.display());
        Self {
            dir,
            description,
            tz,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn path_for(&self, measurement: &str) -> PathBuf {
        self.dir.join(format!("{}.json", measurement))
    }

    /// Read every packet archived for a measurement, ascending.
    async fn read_all(&self, measurement: &str) -> Result<Vec<Packet>, FetchError> {
        let path = self.path_for(measurement);
        let content = tokio::fs::read_to_string(&path).await?;
        let mut packets = parse_packets(&content).map_err(|message| FetchError::Parse {
            what: path.display().to_string(),
            message,
        })?;
        packets.sort_by_key(|p| p.timestamp);
        debug!("Read {} packets from {}", packets.len(), path.display());
        Ok(packets)
    }

    /// The inclusive time range a span covers.
    fn range(&self, key: TimeSpanKey, options: &TimeSpanOptions) -> (i64, i64) {
        key.calendar_unit()
            .and_then(|unit| period_bounds(unit, options.start_ms, &self.tz))
            .unwrap_or((options.start_ms, i64::MAX))
    }
}

#[async_trait]
impl<Tz> PacketFetcher for ArchiveSource<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    async fn fetch(
        &self,
        key: TimeSpanKey,
        options: &TimeSpanOptions,
    ) -> Result<Vec<Packet>, FetchError> {
        let packets = self.read_all(&options.measurement).await?;
        let (lo, hi) = self.range(key, options);
        let in_range = packets.into_iter().filter(|p| p.timestamp >= lo && p.timestamp <= hi);

        Ok(match options.aggregation_ms {
            Some(bucket) if bucket > 0 => aggregate(in_range, bucket as i64),
            _ => in_range.collect(),
        })
    }
}

#[async_trait]
impl<Tz> StatsFetcher for ArchiveSource<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    async fn fetch_stats(
        &self,
        key: TimeSpanKey,
        options: &TimeSpanOptions,
    ) -> Result<Stats, FetchError> {
        let packets = self.read_all(&options.measurement).await?;
        let (lo, hi) = self.range(key.stats_key(), options);
        Ok(Stats::from_packets(
            packets.iter().filter(|p| p.timestamp >= lo && p.timestamp <= hi),
        ))
    }
}

/// Parse a JSON array of packets or newline-delimited packets.
fn parse_packets(content: &str) -> Result<Vec<Packet>, String> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).map_err(|e| e.to_string());
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line.trim()).map_err(|e| format!("line {}: {}", n + 1, e))
        })
        .collect()
}

/// Average ascending packets into fixed buckets stamped with the bucket start.
fn aggregate(packets: impl IntoIterator<Item = Packet>, bucket_ms: i64) -> Vec<Packet> {
    let mut out = Vec::new();
    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    let mut current: Option<i64> = None;

    for packet in packets {
        let start = packet.timestamp.div_euclid(bucket_ms) * bucket_ms;
        match current {
            Some(open) if open != start => out.push(close_bucket(open, &mut sums)),
            _ => {}
        }
        current = Some(start);
        for (name, value) in packet.fields {
            let entry = sums.entry(name).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    if let Some(open) = current {
        out.push(close_bucket(open, &mut sums));
    }
    out
}

fn close_bucket(start: i64, sums: &mut BTreeMap<String, (f64, u32)>) -> Packet {
    let mut packet = Packet::new(start);
    for (name, (sum, n)) in std::mem::take(sums) {
        packet.fields.insert(name, sum / n as f64);
    }
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::TempDir;

    fn utc_ms(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().timestamp_millis()
    }

    fn archive_with(lines: &[String]) -> (TempDir, ArchiveSource<Utc>) {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("wx.json")).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let source = ArchiveSource::new(dir.path(), Utc);
        (dir, source)
    }

    fn line(t: i64, temp: f64) -> String {
        format!(r#"{{"timestamp":{},"out_temperature":{}}}"#, t, temp)
    }

    #[tokio::test]
    async fn test_fetch_day_filters_to_period() {
        let (_dir, source) = archive_with(&[
            line(utc_ms(2024, 3, 12, 23, 0), 1.0),
            line(utc_ms(2024, 3, 13, 9, 0), 2.0),
            line(utc_ms(2024, 3, 13, 18, 0), 3.0),
            line(utc_ms(2024, 3, 14, 0, 0), 4.0),
        ]);
        let options = TimeSpanOptions::new("wx", utc_ms(2024, 3, 13, 12, 0));

        let packets = source.fetch(TimeSpanKey::Day, &options).await.unwrap();
        let temps: Vec<f64> = packets.iter().filter_map(|p| p.get("out_temperature")).collect();
        assert_eq!(temps, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_fetch_aggregates_into_buckets() {
        let base = utc_ms(2024, 3, 13, 10, 0);
        let (_dir, source) = archive_with(&[
            line(base, 10.0),
            line(base + 60_000, 20.0),
            line(base + 300_000, 5.0),
        ]);
        let options = TimeSpanOptions::new("wx", base).aggregation(300_000);

        let packets = source.fetch(TimeSpanKey::Day, &options).await.unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].timestamp, base);
        assert_eq!(packets[0].get("out_temperature"), Some(15.0));
        assert_eq!(packets[1].timestamp, base + 300_000);
    }

    #[tokio::test]
    async fn test_fetch_recent_from_start_marker() {
        let (_dir, source) = archive_with(&[line(100, 1.0), line(200, 2.0), line(300, 3.0)]);
        let options = TimeSpanOptions::new("wx", 200).detail(5);

        let packets = source.fetch(TimeSpanKey::Recent, &options).await.unwrap();
        assert_eq!(packets.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_json_array() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wx.json"),
            r#"[{"timestamp":300,"wind_speed":1},{"timestamp":100,"wind_speed":2}]"#,
        )
        .unwrap();
        let source = ArchiveSource::new(dir.path(), Utc);

        let packets = source
            .fetch(TimeSpanKey::Recent, &TimeSpanOptions::new("wx", 0))
            .await
            .unwrap();
        assert_eq!(packets[0].timestamp, 100);
        assert_eq!(packets[1].timestamp, 300);
    }

    #[tokio::test]
    async fn test_missing_measurement_is_io_error() {
        let (_dir, source) = archive_with(&[]);
        let result = source.fetch(TimeSpanKey::Day, &TimeSpanOptions::new("nope", 0)).await;
        assert!(matches!(result, Err(FetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_bad_line_is_parse_error() {
        let (_dir, source) = archive_with(&[line(1, 1.0), "garbage".to_string()]);
        let result = source.fetch(TimeSpanKey::Recent, &TimeSpanOptions::new("wx", 0)).await;
        match result {
            Err(FetchError::Parse { message, .. }) => assert!(message.contains("line 2")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_cover_the_stats_period() {
        let (_dir, source) = archive_with(&[
            line(utc_ms(2024, 3, 12, 23, 0), -5.0),
            line(utc_ms(2024, 3, 13, 9, 0), 2.0),
            line(utc_ms(2024, 3, 13, 18, 0), 8.0),
        ]);
        let options = TimeSpanOptions::new("wx", utc_ms(2024, 3, 13, 12, 0));

        let stats = source.fetch_stats(TimeSpanKey::Day, &options).await.unwrap();
        let temp = stats.get("out_temperature").unwrap();
        assert_eq!(temp.min, 2.0);
        assert_eq!(temp.max, 8.0);
        assert_eq!(temp.count, 2);
    }
}
