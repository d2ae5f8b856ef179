//! Trimming of the rolling `recent` window.

use weatherwatch_types::Packet;

/// Find the index of the first packet still inside the freshness window.
///
/// `packets` must be ascending by timestamp. Returns the index of the first
/// packet with `timestamp >= now_ms - window_ms`, `packets.len()` when every
/// packet is stale, and `0` for an empty slice.
pub fn first_fresh_index(packets: &[Packet], window_ms: i64, now_ms: i64) -> usize {
    let cutoff = now_ms.saturating_sub(window_ms);
    packets.partition_point(|p| p.timestamp < cutoff)
}

/// The fresh tail of `packets`.
pub fn fresh_tail(packets: &[Packet], window_ms: i64, now_ms: i64) -> &[Packet] {
    &packets[first_fresh_index(packets, window_ms, now_ms)..]
}
